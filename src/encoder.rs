//! Request encoding: opcode stamping, length selection, padding.
//!
//! The encoder turns the caller's fragments into the exact fragment list that
//! goes on the wire:
//!
//! ```text
//! caller:  [hdr+body 10B] [data 5B] [empty]
//! short:   [hdr 4B] [body 6B] [pad 2B] [data 5B] [pad 3B]
//! long:    [hdr 4B + len32 4B] [body 6B] [pad 2B] [data 5B] [pad 3B]
//! ```
//!
//! The first four bytes of the first fragment are copied and stamped; every
//! other byte is passed through as a zero-copy `Bytes` slice. Padding comes
//! from one shared static buffer.

use bytes::{Bytes, BytesMut};

use crate::error::{Result, XwireError};
use crate::protocol::{
    padding_for, word_len, ByteOrder, ExtensionInfo, QuirkTable, RequestDescriptor,
    RequestHeader, Workaround, HEADER_SIZE, LONG_LENGTH_SIZE, SHORT_LENGTH_MAX,
};

/// A request ready for transmission.
#[derive(Debug, Clone)]
pub struct EncodedRequest {
    /// Fragments in wire order, padding included.
    pub fragments: Vec<Bytes>,
    /// Reply workaround to register with the reply tracker.
    pub workaround: Workaround,
    /// Total length in 4-byte units, long-length word included.
    pub words: u32,
    /// Whether the long (32-bit) length form was used.
    pub long_form: bool,
}

/// Stamps and frames requests for one connection.
#[derive(Debug, Clone, Copy)]
pub struct RequestEncoder<'a> {
    order: ByteOrder,
    setup_max: u32,
    quirks: &'a QuirkTable,
}

impl<'a> RequestEncoder<'a> {
    /// Create an encoder.
    ///
    /// `setup_max` is the maximum request length advertised at connection
    /// setup, in 4-byte units.
    pub fn new(order: ByteOrder, setup_max: u32, quirks: &'a QuirkTable) -> Self {
        Self {
            order,
            setup_max,
            quirks,
        }
    }

    /// Encode one request.
    ///
    /// `extension` is the discovery result for `req.extension` (ignored for
    /// core requests). `max_length` is only invoked when the request does not
    /// fit the short form; it returns the negotiated maximum.
    pub fn encode<F>(
        &self,
        fragments: Vec<Bytes>,
        req: &RequestDescriptor,
        extension: Option<&ExtensionInfo>,
        max_length: F,
    ) -> Result<EncodedRequest>
    where
        F: FnOnce() -> Result<u32>,
    {
        let mut parts = fragments.into_iter();
        let first = parts
            .next()
            .ok_or_else(|| XwireError::Protocol("request has no fragments".to_string()))?;
        if first.len() < HEADER_SIZE {
            return Err(XwireError::Protocol(format!(
                "request header fragment is {} bytes, need {}",
                first.len(),
                HEADER_SIZE
            )));
        }
        let rest: Vec<Bytes> = parts.collect();

        let (major, minor, workaround) = match (req.extension, extension) {
            (Some(id), Some(info)) if info.present => (
                info.major_opcode,
                req.opcode,
                self.quirks.lookup(id.name(), req.opcode, &first, self.order),
            ),
            (Some(id), _) => return Err(XwireError::ExtensionMissing(id.name())),
            (None, _) => (req.opcode, first[1], Workaround::None),
        };

        let total: u64 = word_len(first.len()) + rest.iter().map(|f| word_len(f.len())).sum::<u64>();

        let long_words = if total <= u64::from(SHORT_LENGTH_MAX) && total <= u64::from(self.setup_max)
        {
            None
        } else {
            let max = max_length()?;
            let words = u32::try_from(total)
                .ok()
                .filter(|&words| words <= max)
                .and_then(|words| words.checked_add(1))
                .ok_or(XwireError::TooLong {
                    words: u32::try_from(total).unwrap_or(u32::MAX),
                    max,
                })?;
            Some(words)
        };

        let short_words = match long_words {
            Some(_) => 0,
            None => total as u16,
        };
        let header = RequestHeader::new(major, minor, short_words);

        let mut stamped = BytesMut::with_capacity(HEADER_SIZE + LONG_LENGTH_SIZE);
        stamped.extend_from_slice(&header.encode(self.order));
        if let Some(words) = long_words {
            stamped.extend_from_slice(&self.order.u32_bytes(words));
        }

        let mut out = Vec::with_capacity(2 * (rest.len() + 2));
        out.push(stamped.freeze());
        push_padded(&mut out, first.slice(HEADER_SIZE..));
        for fragment in rest {
            push_padded(&mut out, fragment);
        }

        Ok(EncodedRequest {
            fragments: out,
            workaround,
            words: long_words.unwrap_or(total as u32),
            long_form: long_words.is_some(),
        })
    }
}

/// Append a fragment and its padding, dropping empty fragments.
fn push_padded(out: &mut Vec<Bytes>, fragment: Bytes) {
    if fragment.is_empty() {
        return;
    }
    let len = fragment.len();
    out.push(fragment);
    if let Some(pad) = padding_for(len) {
        out.push(pad);
    }
}
