//! Parley - terminal chat for a local code-agent backend

mod render;
mod repl;

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use parley_core::{ChatPanel, ConcurrencyPolicy, ParleyConfig, TailPolicy};
use tracing::info;
use tracing_subscriber::EnvFilter;

use render::Renderer;

#[derive(Parser, Debug)]
#[command(name = "parley", version, about = "Chat with a local code-agent backend")]
struct Args {
    /// Backend base URL (overrides the config file and PARLEY_BACKEND_URL)
    #[arg(short = 'u', long)]
    backend_url: Option<String>,

    /// Config file (default: ~/.config/parley/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Send one message, print the reply, and exit
    #[arg(short, long)]
    message: Option<String>,

    /// Print panel messages as JSON lines
    #[arg(long)]
    json: bool,

    /// Keep a final record that arrives without a trailing newline
    #[arg(long)]
    keep_tail: bool,

    /// Refuse new messages while a reply is streaming instead of cancelling it
    #[arg(long)]
    reject_concurrent: bool,

    /// Send messages even if the backend health check fails
    #[arg(long)]
    skip_health_check: bool,

    /// Debug logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut ParleyConfig) {
        if let Some(url) = &self.backend_url {
            config.backend_url = url.clone();
        }
        if self.keep_tail {
            config.tail_policy = TailPolicy::Process;
        }
        if self.reject_concurrent {
            config.concurrency = ConcurrencyPolicy::Reject;
        }
        if self.skip_health_check {
            config.require_connection = false;
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "parley=debug,parley_core=debug"
    } else {
        "parley=warn,parley_core=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // stdout is the chat surface; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = ParleyConfig::load(args.config.as_deref()).context("Failed to load config")?;
    args.apply(&mut config);
    info!("Using backend {}", config.backend_url);

    let (panel, rx) = ChatPanel::from_config(&config).context("Failed to create backend client")?;

    let stdout = std::io::stdout();
    let ansi = !args.json && stdout.is_terminal();
    let renderer = Renderer::new(stdout, args.json, ansi);
    let render_task = tokio::spawn(render::run(renderer, rx));

    if !args.skip_health_check {
        panel.check_backend_status().await;
    }

    let result = match &args.message {
        Some(text) => repl::send_once(&panel, text).await,
        None => repl::run(&panel, !args.json).await,
    };

    // Dropping the panel cancels anything in flight and closes the surface channel
    drop(panel);
    render_task.await.context("Renderer task failed")??;
    result
}
