//! Terminal rendering of panel messages
//!
//! Streams assistant text as it arrives, with a block cursor while the
//! reply is open when the output is a terminal.

use std::io::{self, Write};

use crossterm::cursor::MoveLeft;
use crossterm::queue;
use crossterm::style::{Print, Stylize};
use crossterm::terminal::{Clear, ClearType};
use parley_core::panel::{ChatMessage, ConnectionStatus, PanelMessage, Sender};
use tokio::sync::mpsc::UnboundedReceiver;

const STREAM_CURSOR: &str = "▌";

/// Draw messages until the panel closes its channel
pub async fn run<W: Write>(
    mut renderer: Renderer<W>,
    mut rx: UnboundedReceiver<PanelMessage>,
) -> io::Result<()> {
    while let Some(message) = rx.recv().await {
        renderer.render(&message)?;
    }
    renderer.finish()
}

pub struct Renderer<W: Write> {
    out: W,
    json: bool,
    ansi: bool,
    /// Reply currently being streamed
    streaming: Option<String>,
    /// Whether the streamed line is still on screen
    line_open: bool,
    cursor_shown: bool,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W, json: bool, ansi: bool) -> Self {
        Self {
            out,
            json,
            ansi,
            streaming: None,
            line_open: false,
            cursor_shown: false,
        }
    }

    pub fn render(&mut self, message: &PanelMessage) -> io::Result<()> {
        if self.json {
            let line = serde_json::to_string(message).map_err(io::Error::other)?;
            writeln!(self.out, "{}", line)?;
            return self.out.flush();
        }

        match message {
            PanelMessage::AddMessage { message } => {
                self.break_line()?;
                self.write_message(message)?;
            }
            PanelMessage::InitStreamingMessage {
                message_id,
                timestamp,
            } => {
                self.break_line()?;
                self.streaming = Some(message_id.clone());
                self.write_label(Sender::Assistant, timestamp)?;
                self.line_open = true;
                self.show_cursor()?;
            }
            PanelMessage::AppendToStreamingMessage {
                message_id,
                content,
            } => {
                if self.streaming.as_deref() != Some(message_id.as_str()) {
                    return Ok(());
                }
                if !self.line_open {
                    // Something else was printed mid-reply; pick the reply back up
                    self.write_label(Sender::Assistant, "...")?;
                    self.line_open = true;
                }
                self.hide_cursor()?;
                queue!(self.out, Print(content))?;
                self.show_cursor()?;
            }
            PanelMessage::CompleteStreamingMessage { message_id } => {
                if self.streaming.as_deref() == Some(message_id.as_str()) {
                    self.break_line()?;
                    self.streaming = None;
                }
            }
            PanelMessage::BackendStatus { status, error, .. } => {
                self.break_line()?;
                self.write_status(*status, error.as_deref())?;
            }
        }

        self.out.flush()
    }

    /// Close any open line before exiting
    pub fn finish(&mut self) -> io::Result<()> {
        self.break_line()?;
        self.out.flush()
    }

    fn write_message(&mut self, message: &ChatMessage) -> io::Result<()> {
        self.write_label(message.sender, &message.timestamp)?;
        if self.ansi && message.sender == Sender::System {
            queue!(self.out, Print(message.text.as_str().yellow()))?;
        } else {
            queue!(self.out, Print(&message.text))?;
        }
        queue!(self.out, Print("\n"))
    }

    fn write_label(&mut self, sender: Sender, timestamp: &str) -> io::Result<()> {
        let label = match sender {
            Sender::User => "You",
            Sender::Assistant => "Assistant",
            Sender::System => "System",
        };
        if self.ansi {
            let styled = match sender {
                Sender::User => label.cyan().bold(),
                Sender::Assistant => label.green().bold(),
                Sender::System => label.yellow().bold(),
            };
            queue!(
                self.out,
                Print(format!("[{}] ", timestamp).dark_grey()),
                Print(styled),
                Print(": ")
            )
        } else {
            queue!(self.out, Print(format!("[{}] {}: ", timestamp, label)))
        }
    }

    fn write_status(&mut self, status: ConnectionStatus, error: Option<&str>) -> io::Result<()> {
        let text = match (status, error) {
            (ConnectionStatus::Connected, _) => "Connected".to_string(),
            (ConnectionStatus::Connecting, _) => "Connecting...".to_string(),
            (ConnectionStatus::Disconnected, Some(error)) => format!("Disconnected ({})", error),
            (ConnectionStatus::Disconnected, None) => "Disconnected".to_string(),
        };
        if self.ansi {
            let dot = match status {
                ConnectionStatus::Connected => "●".green(),
                ConnectionStatus::Connecting => "●".yellow(),
                ConnectionStatus::Disconnected => "●".red(),
            };
            queue!(self.out, Print(dot), Print(" "), Print(text), Print("\n"))
        } else {
            queue!(self.out, Print(format!("* {}\n", text)))
        }
    }

    fn show_cursor(&mut self) -> io::Result<()> {
        if self.ansi && !self.cursor_shown {
            queue!(self.out, Print(STREAM_CURSOR))?;
            self.cursor_shown = true;
        }
        Ok(())
    }

    fn hide_cursor(&mut self) -> io::Result<()> {
        if self.cursor_shown {
            queue!(self.out, MoveLeft(1), Clear(ClearType::UntilNewLine))?;
            self.cursor_shown = false;
        }
        Ok(())
    }

    fn break_line(&mut self) -> io::Result<()> {
        if self.line_open {
            self.hide_cursor()?;
            queue!(self.out, Print("\n"))?;
            self.line_open = false;
        }
        Ok(())
    }
}
