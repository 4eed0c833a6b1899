//! Backend client construction and shared request handling

use reqwest::{RequestBuilder, Response, Url};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ParleyConfig;
use crate::error::{BackendError, Result};
use crate::stream::TailPolicy;

/// HTTP client for the chat backend
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    base: Url,
    tail_policy: TailPolicy,
    /// Applied per request to the non-streaming calls
    request_timeout: Duration,
}

impl BackendClient {
    pub fn new(config: &ParleyConfig) -> Result<Self> {
        let base_url = config.backend_url.trim().trim_end_matches('/').to_string();
        let base = Url::parse(&base_url).map_err(|e| BackendError::InvalidUrl {
            url: base_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(BackendError::InvalidUrl {
                url: base_url,
                reason: format!("unsupported scheme '{}'", base.scheme()),
            });
        }

        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.stream_idle_timeout())
            .build()?;

        debug!("Backend client for {}", base_url);
        Ok(Self {
            http,
            base_url,
            base,
            tail_policy: config.tail_policy,
            request_timeout: config.request_timeout(),
        })
    }

    /// Client for `base_url` with every other setting at its default
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let config = ParleyConfig {
            backend_url: base_url.into(),
            ..ParleyConfig::default()
        };
        Self::new(&config)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tail_policy(&self) -> TailPolicy {
        self.tail_policy
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Base URL extended by `segments`, each percent-encoded as one segment
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::InvalidUrl {
                url: self.base_url.clone(),
                reason: "cannot be a base URL".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET bounded by the whole-request timeout
    pub(crate) fn get(&self, url: Url) -> RequestBuilder {
        self.http.get(url).timeout(self.request_timeout)
    }

    /// POST without an overall deadline, only the client's idle read timeout
    pub(crate) fn post(&self, url: Url) -> RequestBuilder {
        self.http
            .post(url)
            .header("Content-Type", "application/json")
    }

    /// Send a request, separating unreachable backends from other failures
    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<Response> {
        match request.send().await {
            Ok(response) => Ok(response),
            Err(e) if e.is_connect() || e.is_timeout() => Err(BackendError::Connect {
                url: self.base_url.clone(),
                source: e,
            }),
            Err(e) => Err(BackendError::Request(e)),
        }
    }

    /// Turn a non-success status into [`BackendError::Status`]
    pub(crate) async fn handle_error_response(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!("Backend returned {}: {}", status, body);
        Err(BackendError::Status { status, body })
    }
}
