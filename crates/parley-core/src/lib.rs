//! Parley Core Library
//!
//! Streaming chat client for a local code-agent backend:
//! - `stream`: incremental decoder for `data: <json>` response bodies
//! - `session`: conversation id and cancellation per chat session
//! - `client`: HTTP calls to the backend
//! - `panel`: controller turning surface requests into ordered UI updates
//! - `config`: file and environment configuration

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod panel;
pub mod session;
pub mod stream;

pub use client::{BackendClient, ChatStream};
pub use config::ParleyConfig;
pub use error::{BackendError, ConfigError, Result};
pub use panel::{ChatPanel, PanelMessage, PanelRequest};
pub use session::{ChatSession, ConcurrencyPolicy};
pub use stream::{DecodeEvent, StreamDecoder, TailPolicy};
