//! Wire format encoding for request headers.
//!
//! Every request starts with a 4-byte header:
//! ```text
//! ┌────────┬────────┬─────────────┐
//! │ Major  │ Minor  │ Length      │
//! │ 1 byte │ 1 byte │ 2 bytes     │
//! │ opcode │ / data │ uint16 words│
//! └────────┴────────┴─────────────┘
//! ```
//!
//! A zero length field means the long form follows: one extra uint32 word
//! carrying the total length in 4-byte units, counting itself.
//!
//! Multi-byte integers use the byte order announced at connection setup.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Request header size in bytes.
pub const HEADER_SIZE: usize = 4;

/// Size of the extra length word that follows a long-form header.
pub const LONG_LENGTH_SIZE: usize = 4;

/// Offset of the 16-bit length field inside the header.
pub const LENGTH_OFFSET: usize = 2;

/// Largest length the 16-bit field can carry, in 4-byte units.
pub const SHORT_LENGTH_MAX: u32 = u16::MAX as u32;

/// Shared zero padding. Never written to.
static PAD: [u8; 3] = [0; 3];

/// Padding needed to bring `len` to a multiple of 4.
#[inline]
pub fn pad(len: usize) -> usize {
    (4 - (len % 4)) % 4
}

/// Number of 4-byte units needed to carry `len` bytes.
#[inline]
pub fn word_len(len: usize) -> u64 {
    (len as u64 + 3) >> 2
}

/// Zero padding fragment for a run of `len` bytes, or `None` if aligned.
///
/// The returned fragment borrows the shared static buffer; no allocation.
#[inline]
pub fn padding_for(len: usize) -> Option<Bytes> {
    match pad(len) {
        0 => None,
        n => Some(Bytes::from_static(&PAD[..n])),
    }
}

/// Byte order of multi-byte fields, fixed at connection setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    /// Least significant byte first (setup byte `l`).
    LittleEndian,
    /// Most significant byte first (setup byte `B`).
    BigEndian,
}

impl ByteOrder {
    /// Byte order of the host.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        }
    }

    #[inline]
    pub fn u16_bytes(self, value: u16) -> [u8; 2] {
        match self {
            ByteOrder::LittleEndian => value.to_le_bytes(),
            ByteOrder::BigEndian => value.to_be_bytes(),
        }
    }

    #[inline]
    pub fn u32_bytes(self, value: u32) -> [u8; 4] {
        match self {
            ByteOrder::LittleEndian => value.to_le_bytes(),
            ByteOrder::BigEndian => value.to_be_bytes(),
        }
    }

    #[inline]
    pub fn read_u32(self, buf: [u8; 4]) -> u32 {
        match self {
            ByteOrder::LittleEndian => u32::from_le_bytes(buf),
            ByteOrder::BigEndian => u32::from_be_bytes(buf),
        }
    }

    /// Read the 32-bit word at word index `index`, if `buf` is long enough.
    pub fn word_at(self, buf: &[u8], index: usize) -> Option<u32> {
        let start = index.checked_mul(4)?;
        let word = buf.get(start..start + 4)?;
        Some(self.read_u32([word[0], word[1], word[2], word[3]]))
    }
}

impl Default for ByteOrder {
    fn default() -> Self {
        Self::native()
    }
}

/// Request header fields before encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    /// Major opcode (core opcode, or the extension's major opcode).
    pub major: u8,
    /// Minor opcode for extension requests, request data otherwise.
    pub minor: u8,
    /// Length in 4-byte units; 0 announces the long form.
    pub length: u16,
}

impl RequestHeader {
    /// Create a new header.
    pub fn new(major: u8, minor: u8, length: u16) -> Self {
        Self {
            major,
            minor,
            length,
        }
    }

    /// Encode header to bytes.
    pub fn encode(&self, order: ByteOrder) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf, order);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `HEADER_SIZE` (4 bytes).
    pub fn encode_into(&self, buf: &mut [u8], order: ByteOrder) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        buf[0] = self.major;
        buf[1] = self.minor;
        buf[LENGTH_OFFSET..HEADER_SIZE].copy_from_slice(&order.u16_bytes(self.length));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_values() {
        assert_eq!(pad(0), 0);
        assert_eq!(pad(1), 3);
        assert_eq!(pad(2), 2);
        assert_eq!(pad(3), 1);
        assert_eq!(pad(4), 0);
        assert_eq!(pad(10), 2);
    }

    #[test]
    fn test_word_len_rounds_up() {
        assert_eq!(word_len(0), 0);
        assert_eq!(word_len(1), 1);
        assert_eq!(word_len(4), 1);
        assert_eq!(word_len(5), 2);
        assert_eq!(word_len(16), 4);
    }

    #[test]
    fn test_padding_shares_static_buffer() {
        assert!(padding_for(8).is_none());

        let a = padding_for(1).unwrap();
        let b = padding_for(5).unwrap();
        assert_eq!(&a[..], &[0, 0, 0]);
        assert_eq!(a.as_ptr(), b.as_ptr());

        let two = padding_for(6).unwrap();
        assert_eq!(two.len(), 2);
        assert_eq!(two.as_ptr(), a.as_ptr());
    }

    #[test]
    fn test_header_byte_order() {
        let header = RequestHeader::new(0x80, 0x02, 0x0104);

        let le = header.encode(ByteOrder::LittleEndian);
        assert_eq!(le, [0x80, 0x02, 0x04, 0x01]);

        let be = header.encode(ByteOrder::BigEndian);
        assert_eq!(be, [0x80, 0x02, 0x01, 0x04]);
    }

    #[test]
    fn test_word_at() {
        let buf = [1, 0, 0, 0, 4, 0, 1, 0];
        assert_eq!(ByteOrder::LittleEndian.word_at(&buf, 0), Some(1));
        assert_eq!(ByteOrder::LittleEndian.word_at(&buf, 1), Some(0x10004));
        assert_eq!(ByteOrder::LittleEndian.word_at(&buf, 2), None);
    }
}
