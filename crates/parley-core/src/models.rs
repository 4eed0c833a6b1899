//! Request and response bodies exchanged with the chat backend

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Body of `POST /chat` and `POST /chat/stream`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Always serialized, as `null` for a fresh conversation
    pub conversation_id: Option<String>,
}

/// Body returned by the non-streaming `POST /chat`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default)]
    pub status: String,
}

/// `GET /health`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthReport {
    pub status: String,
    pub openai_key_configured: bool,
    pub graph_initialized: bool,
    pub dependencies: HashMap<String, String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// `GET /conversations/{id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationHistory {
    pub conversation_id: String,
    pub messages: Vec<serde_json::Value>,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_null_conversation() {
        let request = ChatRequest {
            message: "hello".to_string(),
            conversation_id: None,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"message": "hello", "conversation_id": null})
        );
    }

    #[test]
    fn test_health_report_tolerates_missing_fields() {
        let report: HealthReport = serde_json::from_str(r#"{"status":"unhealthy"}"#).unwrap();
        assert!(!report.is_healthy());
        assert!(report.dependencies.is_empty());

        let report: HealthReport = serde_json::from_value(serde_json::json!({
            "status": "healthy",
            "openai_key_configured": true,
            "graph_initialized": true,
            "dependencies": {"openai": "ok", "langgraph": "ok"}
        }))
        .unwrap();
        assert!(report.is_healthy());
        assert_eq!(report.dependencies.len(), 2);
    }
}
