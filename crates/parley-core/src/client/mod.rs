//! HTTP client for the chat backend

mod core;
mod simple;
mod streaming;

pub use self::core::BackendClient;
pub use simple::EMPTY_RESPONSE_TEXT;
pub use streaming::ChatStream;
