//! Streaming chat calls
//!
//! `POST /chat/stream` answers with `data: <json>` lines terminated by
//! `data: [DONE]`. [`ChatStream`] pulls the body one chunk at a time and
//! runs it through a [`StreamDecoder`].

use reqwest::Response;
use tracing::{debug, info, warn};

use super::core::BackendClient;
use crate::error::{BackendError, Result};
use crate::models::ChatRequest;
use crate::stream::{DecodeEvent, DecoderStats, StreamDecoder};

impl BackendClient {
    /// Open a streaming chat response.
    ///
    /// Fails with [`BackendError::Status`] before any streaming if the
    /// backend does not answer with a success status.
    pub async fn open_chat_stream(&self, request: &ChatRequest) -> Result<ChatStream> {
        info!(
            "Opening chat stream ({} chars, conversation: {:?})",
            request.message.len(),
            request.conversation_id
        );
        let url = self.endpoint(&["chat", "stream"])?;
        let response = self.send(self.post(url).json(request)).await?;
        let response = self.handle_error_response(response).await?;
        Ok(ChatStream::new(
            response,
            StreamDecoder::with_tail_policy(self.tail_policy()),
        ))
    }
}

/// An open response body and the decoder consuming it.
///
/// Dropping the stream drops the response, which releases the connection.
pub struct ChatStream {
    response: Response,
    decoder: StreamDecoder,
    terminated: bool,
    finished: bool,
    chunks: usize,
}

impl ChatStream {
    fn new(response: Response, decoder: StreamDecoder) -> Self {
        Self {
            response,
            decoder,
            terminated: false,
            finished: false,
            chunks: 0,
        }
    }

    /// Read one transport chunk and decode it.
    ///
    /// Returns `Ok(None)` once `[DONE]` has been seen or the body has ended
    /// and the decoder has been finished. A read error ends the stream.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<DecodeEvent>>> {
        if self.finished {
            return Ok(None);
        }
        if self.decoder.is_closed() {
            self.finished = true;
            return Ok(None);
        }

        let chunk = match self.response.chunk().await {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!("Chat stream read failed after {} chunks: {}", self.chunks, e);
                self.finished = true;
                return Err(BackendError::Read(e));
            }
        };

        let events = match chunk {
            Some(bytes) => {
                self.chunks += 1;
                self.decoder.feed(&bytes)
            }
            None => {
                debug!("Chat stream body ended after {} chunks", self.chunks);
                self.finished = true;
                self.decoder.finish()
            }
        };

        if events.iter().any(|e| matches!(e, DecodeEvent::Done)) {
            self.terminated = true;
        }
        Ok(Some(events))
    }

    /// Drain the stream into a single list of events
    pub async fn collect(mut self) -> Result<Vec<DecodeEvent>> {
        let mut events = Vec::new();
        while let Some(batch) = self.next_batch().await? {
            events.extend(batch);
        }
        Ok(events)
    }

    /// Whether `[DONE]` was received
    pub fn terminated(&self) -> bool {
        self.terminated
    }

    pub fn stats(&self) -> DecoderStats {
        self.decoder.stats()
    }
}
