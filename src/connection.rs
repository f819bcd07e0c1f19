//! Connection output path.
//!
//! A [`Connection`] owns the sequence counters, the coalescing queue and the
//! transport of one client connection and may be shared between threads.
//!
//! ```text
//! send_request ──► encode (no lock)
//!                   │
//!                   ▼
//!              lock ─► wait until no writer ─► [wrap sync] ─► issue seq
//!                   │
//!                   ▼
//!              absorb into queue ──(all absorbed)──► return seq
//!                   │
//!                   ▼ (overflow)
//!              writing = true, unlock ─► vectored writes ─► lock,
//!              writing = false, mark written, notify all
//! ```
//!
//! Producers wait for the active writer before taking a sequence number, so
//! requests reach the transport in the order their numbers were issued. The
//! transport itself sits behind its own mutex that only the active writer
//! touches; the main lock is released while bytes are being written.

use std::io;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

use crate::config::OutputConfig;
use crate::encoder::RequestEncoder;
use crate::error::{Result, XwireError};
use crate::max_length::MaxRequestLengthNegotiator;
use crate::protocol::{
    big_requests_enable, get_input_focus, parse_enable_reply, QuirkRule, QuirkTable,
    RequestDescriptor, BIG_REQUESTS,
};
use crate::queue::OutputQueue;
use crate::sequence::SequenceAllocator;
use crate::services::{PeerServices, ReplyTracker, SetupInfo};
use crate::transport::Transport;
use crate::writer::PendingWrite;

/// State guarded by the connection lock.
struct IoState<R> {
    queue: OutputQueue,
    sequence: SequenceAllocator,
    /// A writer owns the transport and the fragments it is writing.
    writing: bool,
    /// Latched once the transport fails or the output is shut down.
    broken: Option<io::ErrorKind>,
    tracker: R,
}

type StateGuard<'a, R> = MutexGuard<'a, IoState<R>>;

fn poisoned<G>(_: G) -> XwireError {
    XwireError::ConnectionBroken(io::ErrorKind::Other)
}

/// Error kind to latch for a connection-fatal error.
fn broken_kind(err: &XwireError) -> io::ErrorKind {
    match err {
        XwireError::ConnectionBroken(kind) => *kind,
        XwireError::SequenceWrapFailed(inner) => broken_kind(inner),
        _ => io::ErrorKind::Other,
    }
}

/// Builder for a [`Connection`].
#[derive(Debug, Clone, Default)]
pub struct ConnectionBuilder {
    config: OutputConfig,
    quirks: QuirkTable,
}

impl ConnectionBuilder {
    /// Create a builder with the default configuration and quirk table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole output configuration.
    pub fn config(mut self, config: OutputConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the coalescing queue capacity in bytes.
    ///
    /// Default: 16384
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Set the issued-minus-read distance that forces a sync round trip.
    ///
    /// Default: 65530
    pub fn wrap_threshold(mut self, threshold: u32) -> Self {
        self.config.wrap_threshold = threshold;
        self
    }

    /// Set the maximum number of fragments per vectored write.
    ///
    /// Default: 1024
    pub fn max_iovecs(mut self, limit: usize) -> Self {
        self.config.max_iovecs = limit;
        self
    }

    /// Replace the quirk table.
    pub fn quirks(mut self, quirks: QuirkTable) -> Self {
        self.quirks = quirks;
        self
    }

    /// Add one quirk rule to the table.
    pub fn quirk(mut self, rule: QuirkRule) -> Self {
        self.quirks.push(rule);
        self
    }

    /// Validate the configuration and create the connection.
    pub fn build<T, R, S>(
        self,
        transport: T,
        setup: SetupInfo,
        tracker: R,
        services: S,
    ) -> Result<Connection<T, R, S>>
    where
        T: Transport,
        R: ReplyTracker,
        S: PeerServices,
    {
        self.config.validate()?;
        if setup.maximum_request_length == 0 {
            return Err(XwireError::Protocol(
                "setup advertised a zero maximum request length".to_string(),
            ));
        }

        tracing::debug!(
            queue_capacity = self.config.queue_capacity,
            wrap_threshold = self.config.wrap_threshold,
            setup_max = setup.maximum_request_length,
            "connection output path ready"
        );

        Ok(Connection {
            state: Mutex::new(IoState {
                queue: OutputQueue::new(self.config.queue_capacity),
                sequence: SequenceAllocator::new(self.config.wrap_threshold),
                writing: false,
                broken: None,
                tracker,
            }),
            cond: Condvar::new(),
            transport: Mutex::new(transport),
            services,
            max_length: MaxRequestLengthNegotiator::new(),
            setup,
            quirks: self.quirks,
            config: self.config,
        })
    }
}

/// Request output path of one connection.
pub struct Connection<T, R, S> {
    state: Mutex<IoState<R>>,
    cond: Condvar,
    transport: Mutex<T>,
    services: S,
    max_length: MaxRequestLengthNegotiator,
    setup: SetupInfo,
    quirks: QuirkTable,
    config: OutputConfig,
}

impl Connection<(), (), ()> {
    /// Create a new connection builder.
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }
}

impl<T, R, S> Connection<T, R, S>
where
    T: Transport,
    R: ReplyTracker,
    S: PeerServices,
{
    /// Encode and submit one request, returning its sequence number.
    ///
    /// The first fragment carries the 4-byte header; its opcode and length
    /// bytes are overwritten. Small requests are buffered; call
    /// [`flush`](Self::flush) to force them out.
    pub fn send_request(&self, fragments: Vec<Bytes>, req: &RequestDescriptor) -> Result<u32> {
        let extension = req.extension.and_then(|id| self.services.extension(id));
        let encoder = RequestEncoder::new(
            self.setup.byte_order,
            u32::from(self.setup.maximum_request_length),
            &self.quirks,
        );
        let encoded = encoder.encode(fragments, req, extension.as_ref(), || {
            self.get_max_request_length()
        })?;

        let mut state = self.wait_idle(self.lock()?)?;

        if !req.expects_reply {
            let last_read = state.tracker.last_read_sequence();
            if state.sequence.needs_sync(last_read) {
                tracing::debug!(
                    request = state.sequence.request(),
                    last_read,
                    "sequence space near wrap, forcing sync"
                );
                drop(state);
                if let Err(e) = self.sync() {
                    tracing::error!(error = %e, "wrap sync failed, connection broken");
                    self.latch_broken(broken_kind(&e));
                    return Err(XwireError::SequenceWrapFailed(Box::new(e)));
                }
                state = self.wait_idle(self.lock()?)?;
            }
        }

        let sequence = state.sequence.issue();
        if req.expects_reply {
            state.tracker.expect_reply(sequence, encoded.workaround);
        }

        self.write_block(state, encoded.fragments)?;
        Ok(sequence)
    }

    /// Write out everything buffered and wait for the active writer.
    pub fn flush(&self) -> Result<()> {
        let state = self.wait_idle(self.lock()?)?;
        self.flush_idle(state)
    }

    /// Block until `sequence` has been written to the transport.
    ///
    /// Flushes if the request is still buffered.
    pub fn wait_for_written(&self, sequence: u32) -> Result<()> {
        let state = self.lock()?;
        if !state.sequence.is_issued(sequence) {
            return Err(XwireError::Protocol(format!(
                "sequence {} has not been issued",
                sequence
            )));
        }

        let state = self
            .cond
            .wait_while(state, |s| {
                s.writing && s.broken.is_none() && !s.sequence.is_written(sequence)
            })
            .map_err(poisoned)?;

        if state.sequence.is_written(sequence) {
            return Ok(());
        }
        if let Some(kind) = state.broken {
            return Err(XwireError::ConnectionBroken(kind));
        }
        self.flush_idle(state)
    }

    /// Maximum request length in 4-byte units, negotiating BIG-REQUESTS on
    /// first use.
    pub fn get_max_request_length(&self) -> Result<u32> {
        let advertised = u32::from(self.setup.maximum_request_length);
        self.max_length
            .get_or_negotiate(advertised, || self.enable_big_requests())
    }

    /// Round trip with the peer: send GetInputFocus and wait for its reply.
    pub fn sync(&self) -> Result<()> {
        let (fragments, req) = get_input_focus();
        let sequence = self.send_request(fragments, &req)?;
        self.wait_for_written(sequence)?;
        self.services.wait_for_reply(sequence).map(drop)
    }

    /// Flush, then close the output. Later calls fail with `ConnectionBroken`.
    pub fn shutdown(&self) -> Result<()> {
        let result = self.flush();

        let mut state = self.lock()?;
        state.broken.get_or_insert(io::ErrorKind::NotConnected);
        tracing::debug!(
            request = state.sequence.request(),
            written = state.sequence.request_written(),
            "output shut down"
        );
        drop(state);
        self.cond.notify_all();

        result
    }

    /// Last sequence number issued.
    pub fn request_counter(&self) -> u32 {
        self.state_unchecked().sequence.request()
    }

    /// Last sequence number written to the transport.
    pub fn request_written_counter(&self) -> u32 {
        self.state_unchecked().sequence.request_written()
    }

    /// Bytes waiting in the coalescing queue.
    pub fn queued_bytes(&self) -> usize {
        self.state_unchecked().queue.len()
    }

    /// Whether the output has been latched closed.
    pub fn is_broken(&self) -> bool {
        self.state_unchecked().broken.is_some()
    }

    /// Run `f` on the reply tracker under the connection lock.
    pub fn with_reply_tracker<F, U>(&self, f: F) -> Result<U>
    where
        F: FnOnce(&mut R) -> U,
    {
        let mut state = self.lock()?;
        Ok(f(&mut state.tracker))
    }

    /// Setup values the connection was built with.
    pub fn setup(&self) -> &SetupInfo {
        &self.setup
    }

    /// Output configuration in effect.
    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    /// Inbound-path services the connection was built with.
    pub fn services(&self) -> &S {
        &self.services
    }

    /// Mark the output broken and wake every waiter.
    fn latch_broken(&self, kind: io::ErrorKind) {
        let mut state = self.state_unchecked();
        state.broken.get_or_insert(kind);
        drop(state);
        self.cond.notify_all();
    }

    fn lock(&self) -> Result<StateGuard<'_, R>> {
        self.state.lock().map_err(poisoned)
    }

    /// Lock for read-only accessors; counters stay consistent across a panic.
    fn state_unchecked(&self) -> StateGuard<'_, R> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait until no writer is active. Fails if the output is broken.
    fn wait_idle<'a>(&'a self, state: StateGuard<'a, R>) -> Result<StateGuard<'a, R>> {
        let state = self
            .cond
            .wait_while(state, |s| s.writing && s.broken.is_none())
            .map_err(poisoned)?;
        match state.broken {
            Some(kind) => Err(XwireError::ConnectionBroken(kind)),
            None => Ok(state),
        }
    }

    /// Queue or write the fragments of one request. `state` must be idle.
    fn write_block<'a>(
        &'a self,
        mut state: StateGuard<'a, R>,
        mut fragments: Vec<Bytes>,
    ) -> Result<()> {
        let absorbed = state.queue.absorb(&fragments);
        if absorbed == fragments.len() {
            return Ok(());
        }

        let rest = fragments.split_off(absorbed);
        let pending = PendingWrite::new(
            state.queue.take().into_iter().chain(rest),
            self.config.max_iovecs,
        );
        self.transmit(state, pending)
    }

    /// Write out the queue. `state` must be idle.
    fn flush_idle<'a>(&'a self, mut state: StateGuard<'a, R>) -> Result<()> {
        match state.queue.take() {
            Some(queued) => {
                let pending = PendingWrite::new([queued], self.config.max_iovecs);
                self.transmit(state, pending)
            }
            None => {
                let request = state.sequence.request();
                state.sequence.mark_written(request);
                Ok(())
            }
        }
    }

    /// Become the writer, write `pending` without holding the lock, then
    /// publish the result.
    fn transmit<'a>(
        &'a self,
        mut state: StateGuard<'a, R>,
        mut pending: PendingWrite,
    ) -> Result<()> {
        let target = state.sequence.request();
        state.writing = true;
        drop(state);

        tracing::trace!(
            bytes = pending.remaining(),
            fragments = pending.fragment_count(),
            target,
            "writing requests"
        );
        let result = match self.transport.lock() {
            Ok(mut transport) => pending.write_all(&mut *transport),
            Err(e) => Err(poisoned(e)),
        };

        // The flag must be cleared even on a poisoned lock, or waiters never wake.
        let (mut state, result) = match self.state.lock() {
            Ok(state) => (state, result),
            Err(e) => (e.into_inner(), result.and(Err(poisoned(())))),
        };
        state.writing = false;
        match &result {
            Ok(()) => state.sequence.mark_written(target),
            Err(e) => {
                tracing::error!(error = %e, target, "transport failed, connection broken");
                state.broken.get_or_insert(broken_kind(e));
            }
        }
        drop(state);
        self.cond.notify_all();

        result
    }

    /// Send BIG-REQUESTS Enable and read the extended maximum.
    ///
    /// `Ok(None)` if the peer does not provide the extension.
    fn enable_big_requests(&self) -> Result<Option<u32>> {
        match self.services.extension(&BIG_REQUESTS) {
            Some(info) if info.present => {}
            _ => return Ok(None),
        }

        let (fragments, req) = big_requests_enable();
        let sequence = self.send_request(fragments, &req)?;
        self.wait_for_written(sequence)?;
        let reply = self.services.wait_for_reply(sequence)?;
        parse_enable_reply(&reply, self.setup.byte_order).map(Some)
    }
}
