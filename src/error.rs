//! Error types for xwire-client.

use std::io;

use thiserror::Error;

/// Main error type for all request output operations.
#[derive(Debug, Error)]
pub enum XwireError {
    /// I/O error outside the writer loop (socket setup, readiness polling).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Request is longer than the peer accepts, even after negotiation.
    ///
    /// Nothing was transmitted and no sequence number was consumed; the
    /// caller may split the request and retry.
    #[error("Request of {words} words exceeds maximum request length {max}")]
    TooLong {
        /// Encoded request length in 4-byte units.
        words: u32,
        /// Maximum request length in 4-byte units.
        max: u32,
    },

    /// The forced round trip that guards the sequence space failed.
    #[error("Sequence wrap synchronization failed: {0}")]
    SequenceWrapFailed(#[source] Box<XwireError>),

    /// The transport is broken; latched for the lifetime of the connection.
    #[error("Connection broken: {0}")]
    ConnectionBroken(io::ErrorKind),

    /// The request targets an extension the peer does not provide.
    #[error("Extension {0} is not present")]
    ExtensionMissing(&'static str),

    /// Malformed request or reply.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl XwireError {
    /// Whether this error leaves the connection unusable.
    pub fn is_fatal(&self) -> bool {
        match self {
            XwireError::ConnectionBroken(_) | XwireError::Io(_) => true,
            XwireError::SequenceWrapFailed(_) => true,
            XwireError::TooLong { .. }
            | XwireError::ExtensionMissing(_)
            | XwireError::Protocol(_)
            | XwireError::Config(_) => false,
        }
    }
}

/// Result type alias using XwireError.
pub type Result<T> = std::result::Result<T, XwireError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(XwireError::ConnectionBroken(io::ErrorKind::BrokenPipe).is_fatal());
        assert!(XwireError::SequenceWrapFailed(Box::new(XwireError::Protocol(
            "short reply".to_string()
        )))
        .is_fatal());
        assert!(!XwireError::TooLong { words: 70000, max: 65535 }.is_fatal());
        assert!(!XwireError::ExtensionMissing("GLX").is_fatal());
    }

    #[test]
    fn test_display_messages() {
        let err = XwireError::TooLong { words: 10, max: 4 };
        assert_eq!(
            err.to_string(),
            "Request of 10 words exceeds maximum request length 4"
        );

        let err = XwireError::ExtensionMissing("BIG-REQUESTS");
        assert!(err.to_string().contains("BIG-REQUESTS"));
    }

    #[test]
    fn test_wrap_failure_keeps_source() {
        use std::error::Error as _;

        let inner = XwireError::ConnectionBroken(io::ErrorKind::ConnectionReset);
        let err = XwireError::SequenceWrapFailed(Box::new(inner));
        let source = err.source().unwrap();
        assert!(source.to_string().contains("Connection broken"));
    }
}
