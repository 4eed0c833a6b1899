//! Configuration loading
//!
//! Settings come from `~/.config/parley/config.toml` (or an explicit path),
//! then the `PARLEY_BACKEND_URL` environment variable, then CLI flags.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::session::ConcurrencyPolicy;
use crate::stream::TailPolicy;

/// Local backend address
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Environment variable overriding `backend_url`
pub const BACKEND_URL_ENV: &str = "PARLEY_BACKEND_URL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParleyConfig {
    pub backend_url: String,
    pub connect_timeout_secs: u64,
    /// Whole-request limit for `/chat`, `/health` and `/conversations`
    pub request_timeout_secs: u64,
    /// Longest silence tolerated between chunks of a streamed reply
    pub stream_idle_timeout_secs: u64,
    pub tail_policy: TailPolicy,
    pub concurrency: ConcurrencyPolicy,
    /// Refuse to send until a health check has succeeded
    pub require_connection: bool,
}

impl Default for ParleyConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            connect_timeout_secs: 5,
            request_timeout_secs: 300,
            stream_idle_timeout_secs: 120,
            tail_policy: TailPolicy::default(),
            concurrency: ConcurrencyPolicy::default(),
            require_connection: true,
        }
    }
}

impl ParleyConfig {
    /// `~/.config/parley/config.toml` on Linux, platform equivalent elsewhere
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("parley").join("config.toml"))
    }

    /// Load from `path`, or the default location if it exists, then apply
    /// the environment override
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|p| p.exists()),
        };

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };

        config.apply_backend_override(std::env::var(BACKEND_URL_ENV).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    fn apply_backend_override(&mut self, value: Option<String>) {
        if let Some(url) = value.filter(|v| !v.trim().is_empty()) {
            debug!("{} overrides backend_url: {}", BACKEND_URL_ENV, url);
            self.backend_url = url.trim().to_string();
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_idle_timeout_secs)
    }
}
