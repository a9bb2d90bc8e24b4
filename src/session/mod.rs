//! Sessions and their lifecycle boundary.
//!
//! A session is the per-connection context created by the accept loop and
//! handed to a [`SessionProcessor`]. The processor owns I/O from then on;
//! this core only tracks identity, the admission permit, idle accounting,
//! and the destroyed event.

mod idle;
mod processor;
mod registry;

pub use idle::IdleChecker;
pub use processor::{ProcessorError, QueueProcessor, SessionProcessor};
pub use registry::{ManagedSessions, SessionRegistry};

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::sync::OwnedSemaphorePermit;
use tracing::debug;

use crate::config::SessionConfig;
use crate::future::CompletionFuture;

/// Unique session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session_{}", self.0)
    }
}

/// Why a session was destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Orderly close.
    Closed,
    /// Idle timeout exceeded.
    Idle,
    /// Destroyed on an error path.
    Error,
}

/// A single connected endpoint's lifecycle context.
pub struct Session {
    id: SessionId,
    peer: SocketAddr,
    local: SocketAddr,
    config: SessionConfig,

    /// The transport, until the processor takes it over.
    stream: Mutex<Option<TcpStream>>,

    /// Admission permit, held until destruction. `None` when admission
    /// control is disabled.
    permit: Mutex<Option<OwnedSemaphorePermit>>,

    created_at: Instant,
    /// Milliseconds since `created_at` of the last recorded activity.
    last_activity_ms: AtomicU64,

    /// Fires exactly once when the session is destroyed.
    closed: CompletionFuture<DisconnectReason>,
}

impl Session {
    /// Build a session around an accepted stream.
    pub fn new(
        config: SessionConfig,
        stream: TcpStream,
        permit: Option<OwnedSemaphorePermit>,
    ) -> io::Result<Arc<Self>> {
        let peer = stream.peer_addr()?;
        let local = stream.local_addr()?;
        Ok(Arc::new(Self {
            id: SessionId::new(),
            peer,
            local,
            config,
            stream: Mutex::new(Some(stream)),
            permit: Mutex::new(permit),
            created_at: Instant::now(),
            last_activity_ms: AtomicU64::new(0),
            closed: CompletionFuture::new(),
        }))
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The session-destroyed event. Completes exactly once.
    pub fn close_future(&self) -> &CompletionFuture<DisconnectReason> {
        &self.closed
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_done()
    }

    /// Take the transport out of the session. Returns `None` if already
    /// taken or the session was destroyed first.
    pub fn take_stream(&self) -> Option<TcpStream> {
        self.stream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Record I/O activity for idle accounting.
    pub fn touch(&self) {
        let elapsed = self.created_at.elapsed().as_millis() as u64;
        self.last_activity_ms.store(elapsed, Ordering::Relaxed);
    }

    /// Time since the last recorded activity.
    pub fn idle_for(&self) -> Duration {
        let last = Duration::from_millis(self.last_activity_ms.load(Ordering::Relaxed));
        self.created_at.elapsed().saturating_sub(last)
    }

    /// Destroy the session: drop the transport, return the admission permit,
    /// then fire the destroyed event. Idempotent; only the first call
    /// observes `true`.
    pub fn destroy(&self, reason: DisconnectReason) -> bool {
        if self.is_closed() {
            return false;
        }

        // Release resources before listeners observe the destruction, so the
        // admission slot is free by the time anyone reacts to the event.
        drop(self.take_stream());
        drop(
            self.permit
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );

        let destroyed = self.closed.complete(reason);
        if destroyed {
            debug!(session = %self.id, ?reason, "session destroyed");
        }
        destroyed
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("closed", &self.is_closed())
            .finish()
    }
}
