//! Non-streaming backend calls

use tracing::{debug, info};

use super::core::BackendClient;
use crate::error::Result;
use crate::models::{ChatRequest, ChatResponse, ConversationHistory, HealthReport};

/// Shown when the backend answers with an empty response
pub const EMPTY_RESPONSE_TEXT: &str = "Sorry, I received an empty response.";

impl BackendClient {
    /// Single round trip through `POST /chat`
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = self.endpoint(&["chat"])?;
        let builder = self.post(url).timeout(self.request_timeout()).json(request);
        let response = self.send(builder).await?;
        let response = self.handle_error_response(response).await?;

        let text = response.text().await?;
        let mut chat: ChatResponse = serde_json::from_str(&text)?;
        if chat.response.trim().is_empty() {
            chat.response = EMPTY_RESPONSE_TEXT.to_string();
        }

        info!(
            "Chat response: {} chars for conversation {}",
            chat.response.len(),
            chat.conversation_id
        );
        Ok(chat)
    }

    /// `GET /health`
    pub async fn health(&self) -> Result<HealthReport> {
        let response = self.send(self.get(self.endpoint(&["health"])?)).await?;
        let response = self.handle_error_response(response).await?;

        let text = response.text().await?;
        let report: HealthReport = serde_json::from_str(&text)?;
        debug!("Backend health: {}", report.status);
        Ok(report)
    }

    /// `GET /conversations/{id}`
    pub async fn conversation(&self, conversation_id: &str) -> Result<ConversationHistory> {
        let url = self.endpoint(&["conversations", conversation_id])?;
        let response = self.send(self.get(url)).await?;
        let response = self.handle_error_response(response).await?;

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}
