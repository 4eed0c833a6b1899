//! One request/response exchange, driven from its own task

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::messages::{ChatMessage, ConnectionStatus, PanelMessage};
use super::sink::PanelSink;
use crate::client::BackendClient;
use crate::error::BackendError;
use crate::models::ChatRequest;
use crate::session::{Exchange, SharedSession};
use crate::stream::{DecodeEvent, ERROR_STATUS};

/// How an exchange ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// `[DONE]` was received
    Completed,
    /// The body ended without `[DONE]`
    Truncated,
    /// Cancelled by the user or superseded by a newer message
    Cancelled,
    /// Transport failure
    Failed,
}

pub(crate) struct ExchangeContext {
    pub client: BackendClient,
    pub session: SharedSession,
    pub sink: PanelSink,
    pub status: Arc<Mutex<ConnectionStatus>>,
    pub exchange: Exchange,
    pub request: ChatRequest,
    pub message_id: String,
}

pub(crate) async fn run_exchange(ctx: ExchangeContext) -> ExchangeOutcome {
    let started = Instant::now();
    let outcome = drive(&ctx).await;
    ctx.session.lock().end_exchange(&ctx.exchange);
    info!(
        "Exchange #{} finished: {:?} after {:?}",
        ctx.exchange.generation(),
        outcome,
        started.elapsed()
    );
    outcome
}

async fn drive(ctx: &ExchangeContext) -> ExchangeOutcome {
    let token = ctx.exchange.token().clone();

    let opened = tokio::select! {
        biased;
        _ = token.cancelled() => None,
        result = ctx.client.open_chat_stream(&ctx.request) => Some(result),
    };
    let mut stream = match opened {
        None => return cancelled(ctx),
        Some(Err(e)) => return failed(ctx, e),
        Some(Ok(stream)) => stream,
    };

    loop {
        let batch = tokio::select! {
            biased;
            _ = token.cancelled() => return cancelled(ctx),
            batch = stream.next_batch() => batch,
        };

        match batch {
            Ok(Some(events)) => {
                for event in events {
                    forward(ctx, event);
                }
            }
            Ok(None) => break,
            Err(e) => return failed(ctx, e),
        }
    }

    if stream.terminated() {
        return ExchangeOutcome::Completed;
    }

    warn!(
        "Chat stream ended without [DONE] after {} bytes",
        stream.stats().bytes_received
    );
    complete(ctx);
    ExchangeOutcome::Truncated
}

fn forward(ctx: &ExchangeContext, event: DecodeEvent) {
    ctx.session.lock().observe(&ctx.exchange, &event);

    match event {
        DecodeEvent::Delta {
            content: Some(content),
            status: Some(status),
            ..
        } if status == ERROR_STATUS => {
            ctx.sink.send(PanelMessage::AddMessage {
                message: ChatMessage::system(content),
            });
        }
        DecodeEvent::Delta {
            content: Some(content),
            ..
        } => {
            ctx.sink.send(PanelMessage::AppendToStreamingMessage {
                message_id: ctx.message_id.clone(),
                content,
            });
        }
        DecodeEvent::Delta { content: None, .. } => {}
        DecodeEvent::Done => complete(ctx),
        DecodeEvent::Malformed { raw, .. } => {
            debug!("Not forwarding malformed record ({} chars)", raw.len());
        }
    }
}

fn complete(ctx: &ExchangeContext) {
    ctx.sink.send(PanelMessage::CompleteStreamingMessage {
        message_id: ctx.message_id.clone(),
    });
}

fn cancelled(ctx: &ExchangeContext) -> ExchangeOutcome {
    info!("Exchange #{} cancelled", ctx.exchange.generation());
    complete(ctx);
    ExchangeOutcome::Cancelled
}

fn failed(ctx: &ExchangeContext, error: BackendError) -> ExchangeOutcome {
    warn!("Exchange #{} failed: {}", ctx.exchange.generation(), error);
    complete(ctx);

    let text = if error.is_connect() {
        *ctx.status.lock() = ConnectionStatus::Disconnected;
        ctx.sink.send(PanelMessage::BackendStatus {
            status: ConnectionStatus::Disconnected,
            details: None,
            error: Some(error.to_string()),
        });
        format!(
            "Sorry, I encountered an error connecting to the backend service. Please make sure the backend is running on {}",
            ctx.client.base_url()
        )
    } else {
        format!("Sorry, the backend request failed: {}", error)
    };

    ctx.sink.send(PanelMessage::AddMessage {
        message: ChatMessage::system(text),
    });
    ExchangeOutcome::Failed
}
