//! Interactive input loop

use anyhow::{bail, Context, Result};
use parley_core::panel::ExchangeOutcome;
use parley_core::{ChatPanel, PanelRequest};
use std::future::Future;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::debug;

const HELP: &str = "\
Commands:
  /status   check the backend connection
  /new      start a new conversation
  /cancel   stop the reply being streamed
  /quit     exit
Anything else is sent as a message. Ctrl-C cancels a streaming reply.";

/// What a line of input asks for
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Request(PanelRequest),
    Help,
    Quit,
    Unknown(String),
    Empty,
}

impl Command {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }

        let Some(name) = line.strip_prefix('/') else {
            return Command::Request(PanelRequest::SendMessage {
                text: line.to_string(),
            });
        };

        match name {
            "quit" | "exit" | "q" => Command::Quit,
            "help" | "?" => Command::Help,
            "status" => Command::Request(PanelRequest::CheckBackendStatus),
            "new" => Command::Request(PanelRequest::NewConversation),
            "cancel" => Command::Request(PanelRequest::CancelStream),
            other => Command::Unknown(other.to_string()),
        }
    }
}

/// Read lines from stdin until `/quit`, end of input, or Ctrl-C while idle
pub async fn run(panel: &ChatPanel, show_help: bool) -> Result<()> {
    if show_help {
        eprintln!("{}", HELP);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    // Latest exchange; earlier ones are superseded or refused by the panel
    let mut active: Option<JoinHandle<ExchangeOutcome>> = None;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read input")? else {
                    debug!("End of input");
                    break;
                };
                match Command::parse(&line) {
                    Command::Request(PanelRequest::CheckBackendStatus) => {
                        tokio::select! {
                            _ = panel.check_backend_status() => {}
                            signal = tokio::signal::ctrl_c() => {
                                signal.context("Failed to listen for Ctrl-C")?;
                                eprintln!("Status check interrupted");
                            }
                        }
                    }
                    Command::Request(request) => {
                        if let Some(handle) = panel.handle(request).await {
                            active = Some(handle);
                        }
                    }
                    Command::Help => eprintln!("{}", HELP),
                    Command::Quit => {
                        panel.cancel_stream();
                        break;
                    }
                    Command::Unknown(name) => eprintln!("Unknown command /{} (try /help)", name),
                    Command::Empty => {}
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                if !panel.cancel_stream() {
                    break;
                }
            }
        }
    }

    // A reply still streaming at end of input runs to completion unless interrupted
    if let Some(handle) = active {
        let outcome = settle(handle, tokio::signal::ctrl_c(), || panel.cancel_stream()).await?;
        debug!("Last exchange ended: {:?}", outcome);
    }
    Ok(())
}

/// Send a single message and wait for its reply
pub async fn send_once(panel: &ChatPanel, text: &str) -> Result<()> {
    let Some(handle) = panel.send_message(text) else {
        bail!("Message was not sent");
    };

    match settle(handle, tokio::signal::ctrl_c(), || panel.cancel_stream()).await? {
        ExchangeOutcome::Completed | ExchangeOutcome::Truncated => Ok(()),
        ExchangeOutcome::Cancelled => bail!("Reply was cancelled"),
        ExchangeOutcome::Failed => bail!("Backend request failed"),
    }
}

/// Wait for an exchange; if `interrupt` fires first, cancel and wait for it to wind down
async fn settle<I>(
    mut handle: JoinHandle<ExchangeOutcome>,
    interrupt: I,
    cancel: impl FnOnce() -> bool,
) -> Result<ExchangeOutcome>
where
    I: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        outcome = &mut handle => outcome.context("Exchange task failed"),
        signal = interrupt => {
            signal.context("Failed to listen for Ctrl-C")?;
            cancel();
            handle.await.context("Exchange task failed")
        }
    }
}
