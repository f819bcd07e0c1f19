//! Vectored writes with partial-write resumption.
//!
//! A [`PendingWrite`] owns the fragments of one transmission. Each
//! [`write_once`](PendingWrite::write_once) call hands as many fragments as
//! allowed to a single `writev`-style call and advances the per-fragment
//! cursors by however many bytes the transport accepted:
//!
//! ```text
//! before:  [queue 20B] [hdr 4B] [body 100B] [pad 3B]
//! n = 30:                       [body 94B]  [pad 3B]
//! ```
//!
//! Fully written fragments are dropped from the front; acknowledged bytes are
//! never sent twice.

use std::collections::VecDeque;
use std::io::{self, IoSlice};

use bytes::{Buf, Bytes};

use crate::error::{Result, XwireError};
use crate::transport::Transport;

/// Result of one write attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// Every byte has been accepted.
    Done,
    /// Bytes remain; try again right away.
    More,
    /// The transport is not ready; wait for writability, then try again.
    WouldBlock,
}

/// Fragments currently being transmitted.
#[derive(Debug)]
pub struct PendingWrite {
    fragments: VecDeque<Bytes>,
    max_iovecs: usize,
}

impl PendingWrite {
    /// Take ownership of the fragments to transmit. Empty fragments are dropped.
    pub fn new<I>(fragments: I, max_iovecs: usize) -> Self
    where
        I: IntoIterator<Item = Bytes>,
    {
        Self {
            fragments: fragments.into_iter().filter(|f| !f.is_empty()).collect(),
            max_iovecs: max_iovecs.max(1),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Number of fragments not yet fully written.
    #[inline]
    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    /// Bytes not yet written.
    pub fn remaining(&self) -> usize {
        self.fragments.iter().map(Bytes::len).sum()
    }

    /// Perform one vectored write attempt.
    ///
    /// Returns `ConnectionBroken` if the transport accepted zero bytes or
    /// failed with anything other than `WouldBlock` / `Interrupted`.
    pub fn write_once<T>(&mut self, transport: &mut T) -> Result<WriteStatus>
    where
        T: Transport + ?Sized,
    {
        if self.fragments.is_empty() {
            return Ok(WriteStatus::Done);
        }

        let result = {
            let slices: Vec<IoSlice<'_>> = self
                .fragments
                .iter()
                .take(self.max_iovecs)
                .map(|f| IoSlice::new(f))
                .collect();
            transport.write_vectored(&slices)
        };

        match result {
            Ok(0) => Err(XwireError::ConnectionBroken(io::ErrorKind::WriteZero)),
            Ok(n) => {
                self.advance(n);
                if self.fragments.is_empty() {
                    Ok(WriteStatus::Done)
                } else {
                    tracing::trace!(
                        written = n,
                        remaining = self.remaining(),
                        "partial write"
                    );
                    Ok(WriteStatus::More)
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(WriteStatus::WouldBlock),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(WriteStatus::More),
            Err(e) => Err(XwireError::ConnectionBroken(e.kind())),
        }
    }

    /// Write until every byte is accepted, waiting for writability as needed.
    pub fn write_all<T>(&mut self, transport: &mut T) -> Result<()>
    where
        T: Transport + ?Sized,
    {
        loop {
            match self.write_once(transport)? {
                WriteStatus::Done => return Ok(()),
                WriteStatus::More => {}
                WriteStatus::WouldBlock => transport
                    .wait_writable()
                    .map_err(|e| XwireError::ConnectionBroken(e.kind()))?,
            }
        }
    }

    /// Drop `n` written bytes from the front.
    fn advance(&mut self, mut n: usize) {
        while n > 0 {
            let Some(front) = self.fragments.front_mut() else {
                debug_assert!(false, "transport reported more bytes than offered");
                return;
            };
            let step = n.min(front.len());
            front.advance(step);
            n -= step;
            if front.is_empty() {
                self.fragments.pop_front();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MemoryTransport, WriteStep};

    fn fragments() -> Vec<Bytes> {
        vec![
            Bytes::from_static(b"0123"),
            Bytes::from_static(b"4567"),
            Bytes::from_static(b"89ab"),
        ]
    }

    #[test]
    fn test_single_write_completes() {
        let mut sink = MemoryTransport::new();
        let mut pending = PendingWrite::new(fragments(), 1024);

        assert_eq!(pending.write_once(&mut sink).unwrap(), WriteStatus::Done);
        assert!(pending.is_empty());
        assert_eq!(sink.writes(), vec![b"0123456789ab".to_vec()]);
    }

    #[test]
    fn test_partial_write_resumes_mid_fragment() {
        let mut sink = MemoryTransport::new();
        sink.push_step(WriteStep::Accept(6));
        let mut pending = PendingWrite::new(fragments(), 1024);

        assert_eq!(pending.write_once(&mut sink).unwrap(), WriteStatus::More);
        assert_eq!(pending.remaining(), 6);
        assert_eq!(pending.fragment_count(), 2);

        assert_eq!(pending.write_once(&mut sink).unwrap(), WriteStatus::Done);
        assert_eq!(sink.writes(), vec![b"012345".to_vec(), b"6789ab".to_vec()]);
    }

    #[test]
    fn test_partial_write_on_fragment_boundary() {
        let mut sink = MemoryTransport::new();
        sink.push_step(WriteStep::Accept(4));
        let mut pending = PendingWrite::new(fragments(), 1024);

        pending.write_once(&mut sink).unwrap();
        assert_eq!(pending.fragment_count(), 2);
        assert_eq!(pending.remaining(), 8);
    }

    #[test]
    fn test_would_block_keeps_progress() {
        let mut sink = MemoryTransport::new();
        sink.push_step(WriteStep::Accept(5));
        sink.push_step(WriteStep::WouldBlock);
        sink.push_step(WriteStep::WouldBlock);
        let mut pending = PendingWrite::new(fragments(), 1024);

        pending.write_all(&mut sink).unwrap();

        assert_eq!(sink.written(), b"0123456789ab");
        assert_eq!(sink.wait_calls(), 2);
        assert_eq!(sink.attempts(), 4);
    }

    #[test]
    fn test_interrupted_retries_without_waiting() {
        let mut sink = MemoryTransport::new();
        sink.push_step(WriteStep::Fail(io::ErrorKind::Interrupted));
        let mut pending = PendingWrite::new(fragments(), 1024);

        pending.write_all(&mut sink).unwrap();
        assert_eq!(sink.wait_calls(), 0);
        assert_eq!(sink.written(), b"0123456789ab");
    }

    #[test]
    fn test_zero_write_is_fatal() {
        let mut sink = MemoryTransport::new();
        sink.push_step(WriteStep::Zero);
        let mut pending = PendingWrite::new(fragments(), 1024);

        let err = pending.write_all(&mut sink).unwrap_err();
        assert!(matches!(
            err,
            XwireError::ConnectionBroken(io::ErrorKind::WriteZero)
        ));
    }

    #[test]
    fn test_hard_error_is_fatal() {
        let mut sink = MemoryTransport::new();
        sink.push_step(WriteStep::Fail(io::ErrorKind::ConnectionReset));
        let mut pending = PendingWrite::new(fragments(), 1024);

        let err = pending.write_once(&mut sink).unwrap_err();
        assert!(matches!(
            err,
            XwireError::ConnectionBroken(io::ErrorKind::ConnectionReset)
        ));
    }

    #[test]
    fn test_iovec_cap_splits_calls() {
        let mut sink = MemoryTransport::new();
        let mut pending = PendingWrite::new(fragments(), 2);

        assert_eq!(pending.write_once(&mut sink).unwrap(), WriteStatus::More);
        assert_eq!(pending.write_once(&mut sink).unwrap(), WriteStatus::Done);
        assert_eq!(sink.writes(), vec![b"01234567".to_vec(), b"89ab".to_vec()]);
    }

    #[test]
    fn test_empty_fragments_dropped() {
        let pending = PendingWrite::new(vec![Bytes::new(), Bytes::from_static(b"ab")], 8);
        assert_eq!(pending.fragment_count(), 1);

        let mut sink = MemoryTransport::new();
        let mut empty = PendingWrite::new(Vec::new(), 8);
        assert_eq!(empty.write_once(&mut sink).unwrap(), WriteStatus::Done);
        assert_eq!(sink.attempts(), 0);
    }
}
