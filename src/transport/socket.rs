//! Unix domain socket and TCP transports.
//!
//! The stream should be switched to non-blocking mode
//! (`set_nonblocking(true)`) before it is handed to a connection; a blocking
//! stream also works, it simply never reports `WouldBlock`.

use std::io::{self, IoSlice, Write};
use std::net::TcpStream;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;

use libc::{poll, pollfd, POLLERR, POLLHUP, POLLNVAL, POLLOUT};

use super::Transport;

/// Block until `fd` is writable.
///
/// Retries on `EINTR`. A hang-up or error without `POLLOUT` is reported as
/// `BrokenPipe`.
pub(crate) fn wait_fd_writable(fd: RawFd) -> io::Result<()> {
    let mut pfd = pollfd {
        fd,
        events: POLLOUT,
        revents: 0,
    };

    loop {
        let rc = unsafe { poll(&mut pfd, 1, -1) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }

        if pfd.revents & POLLOUT != 0 {
            return Ok(());
        }
        if pfd.revents & (POLLERR | POLLHUP | POLLNVAL) != 0 {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "socket hung up while waiting to write",
            ));
        }
    }
}

impl Transport for UnixStream {
    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        Write::write_vectored(self, bufs)
    }

    fn wait_writable(&mut self) -> io::Result<()> {
        wait_fd_writable(self.as_raw_fd())
    }
}

impl Transport for TcpStream {
    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        Write::write_vectored(self, bufs)
    }

    fn wait_writable(&mut self) -> io::Result<()> {
        wait_fd_writable(self.as_raw_fd())
    }
}
