//! Lazy discovery of the maximum request length.
//!
//! The negotiator has its own lock, separate from the connection lock: the
//! negotiation sends a request and waits for its reply, which takes the
//! connection lock itself.

use std::sync::{Mutex, PoisonError};

use crate::error::Result;

/// Caches the negotiated maximum request length, in 4-byte units.
#[derive(Debug, Default)]
pub struct MaxRequestLengthNegotiator {
    cached: Mutex<Option<u32>>,
}

impl MaxRequestLengthNegotiator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached value, if negotiation already happened.
    pub fn cached(&self) -> Option<u32> {
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the maximum, negotiating it on first use.
    ///
    /// `negotiate` returns `Ok(Some(max))` when the length extension was
    /// enabled and `Ok(None)` when the peer lacks it. Non-fatal failures fall
    /// back to `advertised`; fatal ones propagate and leave nothing cached.
    /// Concurrent callers block until the first negotiation finishes.
    pub fn get_or_negotiate<F>(&self, advertised: u32, negotiate: F) -> Result<u32>
    where
        F: FnOnce() -> Result<Option<u32>>,
    {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(max) = *cached {
            return Ok(max);
        }

        let max = match negotiate() {
            Ok(Some(extended)) => {
                tracing::debug!(advertised, extended, "extended maximum request length");
                extended
            }
            Ok(None) => advertised,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    advertised,
                    "length extension negotiation failed, using advertised maximum"
                );
                advertised
            }
        };

        *cached = Some(max);
        Ok(max)
    }
}
