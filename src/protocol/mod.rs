//! Protocol module - wire format, request descriptors, and reply quirks.
//!
//! This module implements the parts of the request wire format that the
//! output path needs:
//! - 4-byte request header with short/long length forms
//! - Padding to 4-byte boundaries from a shared zero buffer
//! - Request descriptors and the built-in sync / BIG-REQUESTS requests
//! - Quirk table tagging requests whose replies need compensation

mod quirks;
mod request;
mod wire_format;

pub use quirks::{QuirkPredicate, QuirkRule, QuirkTable, Workaround};
pub use request::{
    big_requests_enable, get_input_focus, parse_enable_reply, ExtensionId, ExtensionInfo,
    RequestDescriptor, BIG_REQUESTS, BIG_REQUESTS_ENABLE_OPCODE, GET_INPUT_FOCUS_OPCODE,
};
pub use wire_format::{
    pad, padding_for, word_len, ByteOrder, RequestHeader, HEADER_SIZE,
    LENGTH_OFFSET, LONG_LENGTH_SIZE, SHORT_LENGTH_MAX,
};
