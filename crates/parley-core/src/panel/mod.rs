//! Chat panel controller
//!
//! Receives [`PanelRequest`]s from a chat surface, runs exchanges against
//! the backend, and reports progress as ordered [`PanelMessage`]s.

mod exchange;
mod messages;
mod sink;

pub use exchange::ExchangeOutcome;
pub use messages::{
    timestamp, ChatMessage, ConnectionStatus, PanelMessage, PanelRequest, Sender,
};
pub use sink::PanelSink;

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::client::BackendClient;
use crate::config::ParleyConfig;
use crate::error::Result;
use crate::session::{ChatSession, ConcurrencyPolicy, SharedSession};
use exchange::{run_exchange, ExchangeContext};

/// Controller behaviour taken from the config
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelSettings {
    pub concurrency: ConcurrencyPolicy,
    pub require_connection: bool,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self::from(&ParleyConfig::default())
    }
}

impl From<&ParleyConfig> for PanelSettings {
    fn from(config: &ParleyConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            require_connection: config.require_connection,
        }
    }
}

pub struct ChatPanel {
    client: BackendClient,
    session: SharedSession,
    sink: PanelSink,
    settings: PanelSettings,
    status: Arc<Mutex<ConnectionStatus>>,
}

impl ChatPanel {
    pub fn new(client: BackendClient, settings: PanelSettings, sink: PanelSink) -> Self {
        Self {
            client,
            session: ChatSession::shared(),
            sink,
            settings,
            status: Arc::new(Mutex::new(ConnectionStatus::Connecting)),
        }
    }

    /// Build a panel from config, returning the receiver for its surface
    pub fn from_config(
        config: &ParleyConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<PanelMessage>)> {
        let client = BackendClient::new(config)?;
        let (sink, rx) = PanelSink::channel();
        Ok((Self::new(client, PanelSettings::from(config), sink), rx))
    }

    pub fn client(&self) -> &BackendClient {
        &self.client
    }

    pub fn session(&self) -> SharedSession {
        Arc::clone(&self.session)
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        *self.status.lock()
    }

    pub fn is_streaming(&self) -> bool {
        self.session.lock().is_streaming()
    }

    /// Dispatch one request from the surface.
    ///
    /// Returns the exchange task when a message was sent.
    pub async fn handle(&self, request: PanelRequest) -> Option<JoinHandle<ExchangeOutcome>> {
        match request {
            PanelRequest::SendMessage { text } => self.send_message(&text),
            PanelRequest::CheckBackendStatus => {
                self.check_backend_status().await;
                None
            }
            PanelRequest::CancelStream => {
                self.cancel_stream();
                None
            }
            PanelRequest::NewConversation => {
                self.new_conversation();
                None
            }
        }
    }

    /// Start streaming a reply to `text`. Must be called inside a Tokio runtime.
    pub fn send_message(&self, text: &str) -> Option<JoinHandle<ExchangeOutcome>> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        if self.settings.require_connection && self.connection_status() != ConnectionStatus::Connected {
            self.system_message(format!(
                "Warning: Backend is not connected. Please make sure the backend server is running on {}",
                self.client.base_url()
            ));
            return None;
        }

        let (exchange, request) = {
            let mut session = self.session.lock();
            match session.begin_exchange(self.settings.concurrency) {
                Ok(exchange) => (exchange, session.request(text)),
                Err(e) => {
                    drop(session);
                    self.system_message(format!("{}. Cancel it or wait for it to finish.", e));
                    return None;
                }
            }
        };

        self.sink.send(PanelMessage::AddMessage {
            message: ChatMessage::user(text),
        });

        let message_id = Uuid::new_v4().to_string();
        self.sink.send(PanelMessage::InitStreamingMessage {
            message_id: message_id.clone(),
            timestamp: timestamp(),
        });

        info!(
            "Sending message as exchange #{} (conversation: {:?})",
            exchange.generation(),
            request.conversation_id
        );
        let ctx = ExchangeContext {
            client: self.client.clone(),
            session: Arc::clone(&self.session),
            sink: self.sink.clone(),
            status: Arc::clone(&self.status),
            exchange,
            request,
            message_id,
        };
        Some(tokio::spawn(run_exchange(ctx)))
    }

    /// Query `/health` and report the result to the surface
    pub async fn check_backend_status(&self) -> ConnectionStatus {
        let status = match self.client.health().await {
            Ok(report) => {
                if !report.is_healthy() {
                    warn!("Backend reachable but reports status '{}'", report.status);
                }
                self.sink.send(PanelMessage::BackendStatus {
                    status: ConnectionStatus::Connected,
                    details: Some(report),
                    error: None,
                });
                ConnectionStatus::Connected
            }
            Err(e) => {
                warn!("Backend health check failed: {}", e);
                self.sink.send(PanelMessage::BackendStatus {
                    status: ConnectionStatus::Disconnected,
                    details: None,
                    error: Some(e.to_string()),
                });
                self.system_message(format!(
                    "Backend connection failed. Please start the backend server on {} and check again.",
                    self.client.base_url()
                ));
                ConnectionStatus::Disconnected
            }
        };

        *self.status.lock() = status;
        status
    }

    /// Cancel the response in flight; returns whether there was one
    pub fn cancel_stream(&self) -> bool {
        self.session.lock().cancel_active()
    }

    /// Stop streaming and forget the conversation id
    pub fn new_conversation(&self) {
        self.session.lock().reset_conversation();
        self.system_message("Started a new conversation.");
    }

    fn system_message(&self, text: impl Into<String>) {
        self.sink.send(PanelMessage::AddMessage {
            message: ChatMessage::system(text),
        });
    }
}

impl Drop for ChatPanel {
    fn drop(&mut self) {
        self.session.lock().close();
    }
}
