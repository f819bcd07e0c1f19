//! Sequence number bookkeeping.
//!
//! Sequence numbers are 32-bit client-side counters; the peer only echoes the
//! low 16 bits in replies, events and errors. Requests without replies never
//! produce anything the reply path could use to widen those 16 bits again, so
//! too many of them in a row would let the low bits wrap unnoticed. The
//! allocator reports when a sync round trip is needed before issuing more.

/// Default distance between issued and read sequence numbers that forces a
/// sync round trip before the next reply-less request.
pub const DEFAULT_WRAP_THRESHOLD: u32 = 65530;

/// Per-connection request counters. Guarded by the connection lock.
#[derive(Debug, Clone)]
pub struct SequenceAllocator {
    /// Last sequence number issued.
    request: u32,
    /// Last sequence number confirmed written to the transport.
    request_written: u32,
    wrap_threshold: u32,
}

impl SequenceAllocator {
    /// Create an allocator; the first issued sequence number is 1.
    pub fn new(wrap_threshold: u32) -> Self {
        Self {
            request: 0,
            request_written: 0,
            wrap_threshold,
        }
    }

    /// Last sequence number issued.
    #[inline]
    pub fn request(&self) -> u32 {
        self.request
    }

    /// Last sequence number known to have left the process.
    #[inline]
    pub fn request_written(&self) -> u32 {
        self.request_written
    }

    /// Whether a reply-less request needs a sync round trip first.
    ///
    /// `last_read` is the last sequence number the reply path has seen.
    #[inline]
    pub fn needs_sync(&self, last_read: u32) -> bool {
        self.request.wrapping_sub(last_read) > self.wrap_threshold
    }

    /// Issue the next sequence number.
    #[inline]
    pub fn issue(&mut self) -> u32 {
        self.request = self.request.wrapping_add(1);
        self.request
    }

    /// Record that everything up to `sequence` has been written.
    ///
    /// Never moves the written mark backwards.
    pub fn mark_written(&mut self, sequence: u32) {
        if is_after(sequence, self.request_written) {
            self.request_written = sequence;
        }
    }

    /// Whether `sequence` has been written.
    #[inline]
    pub fn is_written(&self, sequence: u32) -> bool {
        !is_after(sequence, self.request_written)
    }

    /// Whether `sequence` has been issued.
    #[inline]
    pub fn is_issued(&self, sequence: u32) -> bool {
        !is_after(sequence, self.request)
    }
}

impl Default for SequenceAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_WRAP_THRESHOLD)
    }
}

/// Wrapping comparison: `a` comes strictly after `b`.
#[inline]
fn is_after(a: u32, b: u32) -> bool {
    let diff = a.wrapping_sub(b);
    diff != 0 && diff < 1 << 31
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_is_monotonic() {
        let mut seq = SequenceAllocator::default();
        assert_eq!(seq.request(), 0);
        assert_eq!(seq.issue(), 1);
        assert_eq!(seq.issue(), 2);
        assert_eq!(seq.issue(), 3);
        assert_eq!(seq.request(), 3);
    }

    #[test]
    fn test_needs_sync_threshold() {
        let mut seq = SequenceAllocator::default();
        for _ in 0..DEFAULT_WRAP_THRESHOLD {
            seq.issue();
        }
        assert!(!seq.needs_sync(0));

        seq.issue();
        assert!(seq.needs_sync(0));
        assert!(!seq.needs_sync(1));
    }

    #[test]
    fn test_needs_sync_across_u32_wrap() {
        let mut seq = SequenceAllocator::new(10);
        seq.request = u32::MAX - 2;
        for _ in 0..5 {
            seq.issue();
        }
        assert_eq!(seq.request(), 2);
        assert!(!seq.needs_sync(u32::MAX - 5));
        assert!(seq.needs_sync(u32::MAX - 9));
    }

    #[test]
    fn test_mark_written_never_regresses() {
        let mut seq = SequenceAllocator::default();
        seq.issue();
        seq.issue();
        seq.mark_written(2);
        assert_eq!(seq.request_written(), 2);

        seq.mark_written(1);
        assert_eq!(seq.request_written(), 2);
        assert!(seq.is_written(1));
        assert!(seq.is_written(2));
        assert!(!seq.is_written(3));
        assert!(seq.is_issued(2));
        assert!(!seq.is_issued(3));
    }

    #[test]
    fn test_written_mark_across_wrap() {
        let mut seq = SequenceAllocator::default();
        seq.request_written = u32::MAX;
        seq.mark_written(1);
        assert_eq!(seq.request_written(), 1);
        assert!(seq.is_written(u32::MAX));
    }
}
