//! Per-conversation session state
//!
//! Holds the retained conversation id and the cancellation handle of the
//! one exchange allowed to stream at a time.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::ChatRequest;
use crate::stream::DecodeEvent;

/// What happens when a message is sent while a response is still streaming
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyPolicy {
    /// Cancel the in-flight exchange and start the new one
    #[default]
    CancelPrevious,
    /// Refuse the new message until the current response completes
    Reject,
}

#[derive(Debug, thiserror::Error)]
#[error("A response is still streaming")]
pub struct SessionBusy;

/// Handle for one request/response exchange
#[derive(Debug, Clone)]
pub struct Exchange {
    generation: u64,
    token: CancellationToken,
}

impl Exchange {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Session shared between the panel and its exchange tasks
pub type SharedSession = Arc<Mutex<ChatSession>>;

pub struct ChatSession {
    id: Uuid,
    conversation_id: Option<String>,
    generation: u64,
    active: Option<Exchange>,
    /// Parent of every exchange token
    root: CancellationToken,
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id: None,
            generation: 0,
            active: None,
            root: CancellationToken::new(),
        }
    }

    pub fn shared() -> SharedSession {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    /// Whether an exchange is in flight
    pub fn is_streaming(&self) -> bool {
        self.active.as_ref().is_some_and(|e| !e.is_cancelled())
    }

    /// Build the next request, carrying the retained conversation id
    pub fn request(&self, message: impl Into<String>) -> ChatRequest {
        ChatRequest {
            message: message.into(),
            conversation_id: self.conversation_id.clone(),
        }
    }

    /// Start a new exchange, applying `policy` to one already in flight
    pub fn begin_exchange(&mut self, policy: ConcurrencyPolicy) -> Result<Exchange, SessionBusy> {
        if self.is_streaming() {
            match policy {
                ConcurrencyPolicy::Reject => {
                    debug!("Session {}: rejecting exchange, one is in flight", self.id);
                    return Err(SessionBusy);
                }
                ConcurrencyPolicy::CancelPrevious => {
                    self.cancel_active();
                }
            }
        }

        self.generation += 1;
        let exchange = Exchange {
            generation: self.generation,
            token: self.root.child_token(),
        };
        self.active = Some(exchange.clone());
        debug!("Session {}: exchange #{} started", self.id, self.generation);
        Ok(exchange)
    }

    /// Release `exchange` if it is still the active one
    pub fn end_exchange(&mut self, exchange: &Exchange) {
        if self
            .active
            .as_ref()
            .is_some_and(|a| a.generation == exchange.generation)
        {
            self.active = None;
            debug!("Session {}: exchange #{} ended", self.id, exchange.generation);
        }
    }

    /// Cancel the in-flight exchange; returns whether there was one
    pub fn cancel_active(&mut self) -> bool {
        match self.active.take() {
            Some(exchange) if !exchange.is_cancelled() => {
                exchange.cancel();
                info!(
                    "Session {}: cancelled exchange #{}",
                    self.id, exchange.generation
                );
                true
            }
            _ => false,
        }
    }

    /// Record what a decoded event says about the conversation.
    ///
    /// Last non-empty id wins. Events from a superseded or cancelled
    /// exchange are ignored. Returns whether the retained id changed.
    pub fn observe(&mut self, exchange: &Exchange, event: &DecodeEvent) -> bool {
        if exchange.generation != self.generation || exchange.is_cancelled() {
            return false;
        }

        let DecodeEvent::Delta {
            conversation_id: Some(id),
            ..
        } = event
        else {
            return false;
        };

        if self.conversation_id.as_deref() == Some(id.as_str()) {
            return false;
        }
        debug!("Session {}: conversation id is now {}", self.id, id);
        self.conversation_id = Some(id.clone());
        true
    }

    /// Forget the conversation and stop anything in flight
    pub fn reset_conversation(&mut self) {
        self.cancel_active();
        self.conversation_id = None;
        info!("Session {}: conversation reset", self.id);
    }

    /// Cancel every exchange ever started by this session
    pub fn close(&mut self) {
        self.root.cancel();
        self.active = None;
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}
