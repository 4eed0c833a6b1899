//! Response stream decoding
//!
//! Parses the `data: <json>` line protocol spoken by the chat backend.

mod decoder;
mod utf8;

pub use decoder::{
    DecodeEvent, DecoderState, DecoderStats, StreamDecoder, TailPolicy, DATA_PREFIX,
    DONE_SENTINEL, ERROR_STATUS,
};
pub use utf8::Utf8Carry;
