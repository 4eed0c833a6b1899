//! Messages crossing between the panel controller and its surface
//!
//! Both directions are tagged with `type` in camelCase, which is the shape
//! a webview surface posts and receives.

use serde::{Deserialize, Serialize};

use crate::models::HealthReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
    System,
}

/// A complete message shown in the chat surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
    pub sender: Sender,
    pub timestamp: String,
}

impl ChatMessage {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender,
            timestamp: timestamp(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Sender::User, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Sender::System, text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

/// Requests from the surface to the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PanelRequest {
    SendMessage { text: String },
    CheckBackendStatus,
    CancelStream,
    NewConversation,
}

/// Updates from the controller to the surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PanelMessage {
    AddMessage { message: ChatMessage },

    #[serde(rename_all = "camelCase")]
    InitStreamingMessage {
        message_id: String,
        timestamp: String,
    },

    #[serde(rename_all = "camelCase")]
    AppendToStreamingMessage { message_id: String, content: String },

    #[serde(rename_all = "camelCase")]
    CompleteStreamingMessage { message_id: String },

    BackendStatus {
        status: ConnectionStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<HealthReport>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

/// Local wall-clock time as shown next to messages
pub fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_wire_shape() {
        let message = PanelMessage::AppendToStreamingMessage {
            message_id: "m1".to_string(),
            content: "hi".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            serde_json::json!({
                "type": "appendToStreamingMessage",
                "messageId": "m1",
                "content": "hi"
            })
        );

        let status = PanelMessage::BackendStatus {
            status: ConnectionStatus::Disconnected,
            details: None,
            error: Some("refused".to_string()),
        };
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            serde_json::json!({
                "type": "backendStatus",
                "status": "disconnected",
                "error": "refused"
            })
        );
    }

    #[test]
    fn test_inbound_wire_shape() {
        let request: PanelRequest =
            serde_json::from_str(r#"{"type":"sendMessage","text":"hello"}"#).unwrap();
        assert_eq!(
            request,
            PanelRequest::SendMessage {
                text: "hello".to_string()
            }
        );

        let request: PanelRequest =
            serde_json::from_str(r#"{"type":"checkBackendStatus"}"#).unwrap();
        assert_eq!(request, PanelRequest::CheckBackendStatus);

        assert!(serde_json::from_str::<PanelRequest>(r#"{"type":"reboot"}"#).is_err());
    }

    #[test]
    fn test_chat_message_sender() {
        let message = ChatMessage::system("careful");
        assert_eq!(message.sender, Sender::System);
        assert_eq!(message.timestamp.len(), 8);
        assert_eq!(
            serde_json::to_value(message.sender).unwrap(),
            serde_json::json!("system")
        );
    }
}
