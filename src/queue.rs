//! Fixed-capacity coalescing buffer.
//!
//! Small requests are copied here instead of being written one by one; the
//! buffered bytes go out as a single leading fragment of the next real write.

use bytes::{Bytes, BytesMut};

/// Output queue. Guarded by the connection lock.
#[derive(Debug)]
pub struct OutputQueue {
    buf: BytesMut,
    capacity: usize,
}

impl OutputQueue {
    /// Create an empty queue holding fewer than `capacity` bytes at any time.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy leading fragments into the queue.
    ///
    /// Stops at the first fragment that would bring the queue to capacity.
    /// Returns how many fragments were absorbed.
    pub fn absorb(&mut self, fragments: &[Bytes]) -> usize {
        let mut absorbed = 0;
        for fragment in fragments {
            if self.buf.len() + fragment.len() >= self.capacity {
                break;
            }
            self.buf.extend_from_slice(fragment);
            absorbed += 1;
        }
        absorbed
    }

    /// Take the buffered bytes as one fragment, leaving the queue empty.
    pub fn take(&mut self) -> Option<Bytes> {
        if self.buf.is_empty() {
            return None;
        }
        let queued = self.buf.split().freeze();
        self.buf.reserve(self.capacity);
        Some(queued)
    }
}
