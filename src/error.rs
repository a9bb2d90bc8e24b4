//! Errors surfaced to callers of synchronous acceptor operations.
//!
//! Asynchronous failures (accept errors, listener callbacks, session setup)
//! never appear here; they are routed to the [`ErrorMonitor`](crate::monitor).

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Acceptor error types.
#[derive(Debug, Error)]
pub enum AcceptorError {
    /// A bind endpoint failed. Listeners opened earlier in the same call
    /// have already been closed.
    #[error("failed to bind {endpoint}: {source}")]
    Bind {
        endpoint: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The acceptor was disposed.
    #[error("acceptor disposed")]
    Disposed,

    /// Other I/O failure from a synchronous acceptor operation.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
