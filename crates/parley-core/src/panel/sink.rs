//! Outbound channel to the chat surface
//!
//! Sending never blocks the network read loop. Messages queue without
//! bound while the surface is alive; once its receiver is dropped they are
//! discarded and the first discard is logged.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

use super::messages::PanelMessage;

#[derive(Clone)]
pub struct PanelSink {
    tx: mpsc::UnboundedSender<PanelMessage>,
    dropping: Arc<AtomicBool>,
}

impl PanelSink {
    /// Create a sink and the receiver the surface reads from
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PanelMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Self {
            tx,
            dropping: Arc::new(AtomicBool::new(false)),
        };
        (sink, rx)
    }

    /// Queue a message; returns false if the surface is gone
    pub fn send(&self, message: PanelMessage) -> bool {
        if self.tx.send(message).is_ok() {
            return true;
        }
        if !self.dropping.swap(true, Ordering::Relaxed) {
            warn!("Chat surface is closed, dropping outbound messages");
        }
        false
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
