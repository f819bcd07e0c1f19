//! # xwire-client
//!
//! Outbound request path for an X11-style binary wire protocol.
//!
//! This crate turns typed requests into wire bytes and gets them onto a
//! stream socket: it stamps opcodes and lengths, pads every fragment to a
//! 4-byte boundary, hands out sequence numbers, coalesces small requests
//! and writes large ones with non-blocking vectored writes.
//!
//! ## Architecture
//!
//! - **Encoding** ([`encoder`], [`protocol`]): short and long length forms,
//!   zero padding, reply quirks, BIG-REQUESTS negotiation
//! - **Sequencing** ([`sequence`]): 32-bit counters with a forced sync
//!   round trip before the 16-bit wire sequence could wrap
//! - **Output** ([`queue`], [`writer`], [`connection`]): one coalescing
//!   queue, one active writer at a time, flush and written-mark waits
//!
//! The inbound half (reply reading, extension discovery) is supplied by the
//! caller through [`ReplyTracker`] and [`PeerServices`].
//!
//! ## Example
//!
//! ```
//! use bytes::Bytes;
//! use xwire_client::protocol::{ByteOrder, ExtensionId, ExtensionInfo, RequestDescriptor, Workaround};
//! use xwire_client::transport::MemoryTransport;
//! use xwire_client::{Connection, PeerServices, ReplyTracker, Result, SetupInfo};
//!
//! struct Replies;
//!
//! impl ReplyTracker for Replies {
//!     fn last_read_sequence(&self) -> u32 {
//!         0
//!     }
//!     fn expect_reply(&mut self, _sequence: u32, _workaround: Workaround) {}
//! }
//!
//! struct NoExtensions;
//!
//! impl PeerServices for NoExtensions {
//!     fn extension(&self, _id: &ExtensionId) -> Option<ExtensionInfo> {
//!         None
//!     }
//!     fn wait_for_reply(&self, _sequence: u32) -> Result<Bytes> {
//!         Ok(Bytes::from_static(&[0; 32]))
//!     }
//! }
//!
//! let sink = MemoryTransport::new();
//! let conn = Connection::builder()
//!     .build(
//!         sink.clone(),
//!         SetupInfo::new(65535, ByteOrder::LittleEndian),
//!         Replies,
//!         NoExtensions,
//!     )
//!     .unwrap();
//!
//! // MapWindow: opcode 8, one window id.
//! let request = Bytes::from_static(&[8, 0, 0, 0, 0x01, 0x00, 0x20, 0x00]);
//! let seq = conn.send_request(vec![request], &RequestDescriptor::void(8)).unwrap();
//! conn.flush().unwrap();
//!
//! assert_eq!(seq, 1);
//! assert_eq!(sink.written(), [8, 0, 2, 0, 0x01, 0x00, 0x20, 0x00]);
//! ```

pub mod config;
pub mod connection;
pub mod encoder;
pub mod error;
pub mod max_length;
pub mod protocol;
pub mod queue;
pub mod sequence;
pub mod services;
pub mod transport;
pub mod writer;

pub use config::OutputConfig;
pub use connection::{Connection, ConnectionBuilder};
pub use error::{Result, XwireError};
pub use services::{PeerServices, ReplyTracker, SetupInfo};
