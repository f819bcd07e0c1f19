//! In-process transport with scripted write outcomes.
//!
//! Every accepted write is recorded separately, which makes it possible to
//! observe coalescing and partial-write resumption from the outside.
//!
//! # Example
//!
//! ```
//! use std::io::IoSlice;
//! use xwire_client::transport::{MemoryTransport, Transport, WriteStep};
//!
//! let sink = MemoryTransport::new();
//! sink.push_step(WriteStep::Accept(3));
//!
//! let mut writer = sink.clone();
//! let n = writer.write_vectored(&[IoSlice::new(b"hello")]).unwrap();
//! assert_eq!(n, 3);
//! assert_eq!(sink.written(), b"hel");
//! ```

use std::collections::VecDeque;
use std::io::{self, IoSlice};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::Transport;

/// Outcome of one scripted write attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStep {
    /// Accept at most this many bytes.
    Accept(usize),
    /// Report `WouldBlock`.
    WouldBlock,
    /// Accept nothing and report success (a closed peer).
    Zero,
    /// Fail with the given error kind.
    Fail(io::ErrorKind),
}

#[derive(Debug, Default)]
struct MemoryState {
    script: VecDeque<WriteStep>,
    writes: Vec<Vec<u8>>,
    attempts: usize,
    waits: usize,
    closed: bool,
}

/// Shared in-memory sink. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    /// Create a sink that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue the outcome of a future write attempt.
    ///
    /// Attempts beyond the script accept everything.
    pub fn push_step(&self, step: WriteStep) {
        self.state().script.push_back(step);
    }

    /// Make every later write fail with `BrokenPipe`.
    pub fn close(&self) {
        self.state().closed = true;
    }

    /// Bytes accepted by each successful write, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state().writes.clone()
    }

    /// All accepted bytes, concatenated.
    pub fn written(&self) -> Vec<u8> {
        self.state().writes.concat()
    }

    /// Number of writes that accepted at least one byte.
    pub fn write_calls(&self) -> usize {
        self.state().writes.len()
    }

    /// Number of write attempts, including refused ones.
    pub fn attempts(&self) -> usize {
        self.state().attempts
    }

    /// Number of times the writer waited for writability.
    pub fn wait_calls(&self) -> usize {
        self.state().waits
    }
}

impl Transport for MemoryTransport {
    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        let mut state = self.state();
        state.attempts += 1;
        if state.closed {
            return Err(io::ErrorKind::BrokenPipe.into());
        }

        let limit = match state.script.pop_front().unwrap_or(WriteStep::Accept(usize::MAX)) {
            WriteStep::Accept(limit) => limit,
            WriteStep::WouldBlock => return Err(io::ErrorKind::WouldBlock.into()),
            WriteStep::Zero => return Ok(0),
            WriteStep::Fail(kind) => return Err(kind.into()),
        };

        let mut accepted = Vec::new();
        for buf in bufs {
            let room = limit - accepted.len();
            if room == 0 {
                break;
            }
            accepted.extend_from_slice(&buf[..buf.len().min(room)]);
        }

        let n = accepted.len();
        if n > 0 {
            state.writes.push(accepted);
        }
        Ok(n)
    }

    fn wait_writable(&mut self) -> io::Result<()> {
        self.state().waits += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_everything_by_default() {
        let mut sink = MemoryTransport::new();
        let n = sink
            .write_vectored(&[IoSlice::new(b"ab"), IoSlice::new(b"cd")])
            .unwrap();
        assert_eq!(n, 4);
        assert_eq!(sink.writes(), vec![b"abcd".to_vec()]);
    }

    #[test]
    fn test_partial_accept_spans_slices() {
        let mut sink = MemoryTransport::new();
        sink.push_step(WriteStep::Accept(3));

        let n = sink
            .write_vectored(&[IoSlice::new(b"ab"), IoSlice::new(b"cd")])
            .unwrap();
        assert_eq!(n, 3);
        assert_eq!(sink.written(), b"abc");
    }

    #[test]
    fn test_scripted_failures() {
        let mut sink = MemoryTransport::new();
        sink.push_step(WriteStep::WouldBlock);
        sink.push_step(WriteStep::Zero);
        sink.push_step(WriteStep::Fail(io::ErrorKind::ConnectionReset));

        let data = [IoSlice::new(b"x")];
        assert_eq!(
            sink.write_vectored(&data).unwrap_err().kind(),
            io::ErrorKind::WouldBlock
        );
        assert_eq!(sink.write_vectored(&data).unwrap(), 0);
        assert_eq!(
            sink.write_vectored(&data).unwrap_err().kind(),
            io::ErrorKind::ConnectionReset
        );
        assert_eq!(sink.attempts(), 3);
        assert_eq!(sink.write_calls(), 0);
    }

    #[test]
    fn test_close_breaks_writes() {
        let mut sink = MemoryTransport::new();
        sink.close();
        let err = sink.write_vectored(&[IoSlice::new(b"x")]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_clones_share_state() {
        let sink = MemoryTransport::new();
        let mut writer = sink.clone();
        writer.write_vectored(&[IoSlice::new(b"shared")]).unwrap();
        writer.wait_writable().unwrap();
        assert_eq!(sink.written(), b"shared");
        assert_eq!(sink.wait_calls(), 1);
    }
}
