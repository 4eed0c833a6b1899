//! Error types for backend and configuration operations

use reqwest::StatusCode;
use std::path::PathBuf;

/// Errors talking to the chat backend
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Could not connect to the backend at {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success status, raised before any streaming begins
    #[error("Backend returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Stream read failed: {0}")]
    Read(#[source] reqwest::Error),

    #[error("Invalid backend response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid backend URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl BackendError {
    /// Status code, if the backend answered at all
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            BackendError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The backend could not be reached
    pub fn is_connect(&self) -> bool {
        matches!(self, BackendError::Connect { .. })
    }
}

/// Errors loading the configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Result type for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;
