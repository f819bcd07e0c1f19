//! Request descriptors and the handful of requests the output path sends itself.
//!
//! # Example
//!
//! ```
//! use xwire_client::protocol::{ExtensionId, RequestDescriptor};
//!
//! static RENDER: ExtensionId = ExtensionId::new("RENDER");
//!
//! let fill = RequestDescriptor::void(26).with_extension(&RENDER);
//! assert!(!fill.expects_reply);
//! assert_eq!(fill.extension.unwrap().name(), "RENDER");
//! ```

use bytes::Bytes;

use super::wire_format::{ByteOrder, RequestHeader};
use crate::error::{Result, XwireError};

/// Core opcode of GetInputFocus, the cheapest request that has a reply.
pub const GET_INPUT_FOCUS_OPCODE: u8 = 43;

/// Minor opcode of BIG-REQUESTS Enable.
pub const BIG_REQUESTS_ENABLE_OPCODE: u8 = 0;

/// Offset of `maximum_request_length` in the BIG-REQUESTS Enable reply.
const ENABLE_REPLY_MAX_LENGTH_OFFSET: usize = 8;

/// The length-extension capability.
pub static BIG_REQUESTS: ExtensionId = ExtensionId::new("BIG-REQUESTS");

/// Identifies an extension by its protocol name.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ExtensionId {
    name: &'static str,
}

impl ExtensionId {
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// What extension discovery learned about an extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionInfo {
    /// Whether the peer implements the extension at all.
    pub present: bool,
    /// Major opcode assigned to the extension.
    pub major_opcode: u8,
}

impl ExtensionInfo {
    /// Info for a present extension with the given major opcode.
    pub fn present(major_opcode: u8) -> Self {
        Self {
            present: true,
            major_opcode,
        }
    }

    /// Info for an extension the peer does not implement.
    pub fn absent() -> Self {
        Self {
            present: false,
            major_opcode: 0,
        }
    }
}

/// Static description of a request: opcode, extension, reply expectation.
#[derive(Debug, Clone, Copy)]
pub struct RequestDescriptor {
    /// Core opcode, or minor opcode if `extension` is set.
    pub opcode: u8,
    /// Extension the request belongs to.
    pub extension: Option<&'static ExtensionId>,
    /// Whether the peer sends a reply.
    pub expects_reply: bool,
}

impl RequestDescriptor {
    /// A request without a reply.
    pub const fn void(opcode: u8) -> Self {
        Self {
            opcode,
            extension: None,
            expects_reply: false,
        }
    }

    /// A request the peer answers with a reply.
    pub const fn with_reply(opcode: u8) -> Self {
        Self {
            opcode,
            extension: None,
            expects_reply: true,
        }
    }

    /// Qualify the request with an extension.
    pub const fn with_extension(mut self, extension: &'static ExtensionId) -> Self {
        self.extension = Some(extension);
        self
    }
}

/// Fragments and descriptor for GetInputFocus.
///
/// Used as the no-op round trip that resynchronizes sequence numbers.
pub fn get_input_focus() -> (Vec<Bytes>, RequestDescriptor) {
    let header = RequestHeader::new(GET_INPUT_FOCUS_OPCODE, 0, 1);
    (
        vec![Bytes::copy_from_slice(&header.encode(ByteOrder::native()))],
        RequestDescriptor::with_reply(GET_INPUT_FOCUS_OPCODE),
    )
}

/// Fragments and descriptor for BIG-REQUESTS Enable.
///
/// The opcode and length bytes are placeholders; the encoder stamps them.
pub fn big_requests_enable() -> (Vec<Bytes>, RequestDescriptor) {
    (
        vec![Bytes::from_static(&[0, 0, 0, 0])],
        RequestDescriptor::with_reply(BIG_REQUESTS_ENABLE_OPCODE).with_extension(&BIG_REQUESTS),
    )
}

/// Extract `maximum_request_length` from a BIG-REQUESTS Enable reply.
pub fn parse_enable_reply(reply: &[u8], order: ByteOrder) -> Result<u32> {
    order
        .word_at(reply, ENABLE_REPLY_MAX_LENGTH_OFFSET / 4)
        .ok_or_else(|| {
            XwireError::Protocol(format!(
                "BIG-REQUESTS Enable reply too short: {} bytes",
                reply.len()
            ))
        })
}
