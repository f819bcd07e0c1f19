//! Seams to the rest of the client library.
//!
//! The output path depends on three collaborators it does not implement:
//! the connection setup result, the inbound reply path, and extension
//! discovery. [`ReplyTracker`] lives inside the connection lock so that
//! taking a sequence number and registering its reply are one atomic step;
//! [`PeerServices`] is called with the lock released because it may block on
//! the network.

use bytes::Bytes;

use crate::error::Result;
use crate::protocol::{ByteOrder, ExtensionId, ExtensionInfo, Workaround};

/// Values fixed by the connection setup exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupInfo {
    /// Maximum request length without BIG-REQUESTS, in 4-byte units.
    pub maximum_request_length: u16,
    /// Byte order the client announced.
    pub byte_order: ByteOrder,
}

impl SetupInfo {
    pub fn new(maximum_request_length: u16, byte_order: ByteOrder) -> Self {
        Self {
            maximum_request_length,
            byte_order,
        }
    }
}

/// Reply bookkeeping of the inbound path, guarded by the connection lock.
pub trait ReplyTracker: Send {
    /// Last sequence number for which a reply, event or error was read.
    fn last_read_sequence(&self) -> u32;

    /// Record that `sequence` will be answered by a reply.
    fn expect_reply(&mut self, sequence: u32, workaround: Workaround);
}

/// Blocking services of the inbound path and extension discovery.
pub trait PeerServices: Send + Sync {
    /// Discovery result for an extension, or `None` if it cannot be queried.
    fn extension(&self, id: &ExtensionId) -> Option<ExtensionInfo>;

    /// Block until the reply to `sequence` has been read and return it.
    ///
    /// The request has already been flushed when this is called.
    fn wait_for_reply(&self, sequence: u32) -> Result<Bytes>;
}

impl<S: PeerServices + ?Sized> PeerServices for std::sync::Arc<S> {
    fn extension(&self, id: &ExtensionId) -> Option<ExtensionInfo> {
        (**self).extension(id)
    }

    fn wait_for_reply(&self, sequence: u32) -> Result<Bytes> {
        (**self).wait_for_reply(sequence)
    }
}
