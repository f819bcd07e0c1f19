//! Transport module - the byte sink the writer drives.
//!
//! Provides:
//! - The [`Transport`] trait: one non-blocking vectored write, plus a wait
//!   for writability
//! - Implementations for Unix domain sockets and TCP streams (Unix only)
//! - [`MemoryTransport`], an in-process sink with scripted partial writes

mod memory;
#[cfg(unix)]
mod socket;

use std::io::{self, IoSlice};

pub use memory::{MemoryTransport, WriteStep};

/// A non-blocking, vectored byte sink.
///
/// The writer calls [`write_vectored`](Transport::write_vectored) once per
/// attempt. `ErrorKind::WouldBlock` means "try again after
/// [`wait_writable`](Transport::wait_writable)"; `ErrorKind::Interrupted` is
/// retried right away. `Ok(0)` and every other error mean the transport is
/// broken.
pub trait Transport: Send {
    /// Attempt one vectored write. Returns the number of bytes accepted.
    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize>;

    /// Block until the transport can accept more bytes.
    fn wait_writable(&mut self) -> io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        (**self).write_vectored(bufs)
    }

    fn wait_writable(&mut self) -> io::Result<()> {
        (**self).wait_writable()
    }
}
