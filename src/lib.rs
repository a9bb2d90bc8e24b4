//! portico — session-oriented TCP acceptor framework.
//!
//! The crate provides the concurrency core of a reactor-style network
//! framework: a one-shot [`CompletionFuture`] for asynchronous operation
//! outcomes, and a [`TcpAcceptor`] that binds endpoints, throttles
//! concurrently live sessions through an admission gate, and hands accepted
//! sessions to a [`SessionProcessor`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use portico::{AcceptorConfig, QueueProcessor, TcpAcceptor};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (processor, mut sessions) = QueueProcessor::new(64);
//!     let config = AcceptorConfig {
//!         max_connections: 1024,
//!         ..AcceptorConfig::default()
//!     };
//!     let acceptor = TcpAcceptor::new(config, processor);
//!     let bound = acceptor.bind(&["0.0.0.0:7700".parse()?]).await?;
//!     println!("listening on {bound:?}");
//!
//!     while let Some(session) = sessions.recv().await {
//!         let stream = session.take_stream();
//!         // drive I/O, then: session.destroy(portico::DisconnectReason::Closed);
//!         drop(stream);
//!     }
//!     Ok(())
//! }
//! ```

pub mod acceptor;
pub mod config;
pub mod error;
pub mod future;
pub mod monitor;
pub mod session;

pub use acceptor::{AdmissionGate, GateClosed, ListenerTag, SessionFactory, TcpAcceptor, TcpSessionFactory};
pub use config::{AcceptorConfig, SessionConfig};
pub use error::AcceptorError;
pub use future::{CompletionFuture, CompletionListener};
pub use monitor::{BoxError, ErrorMonitor, LogMonitor};
pub use session::{
    DisconnectReason, IdleChecker, ManagedSessions, ProcessorError, QueueProcessor, Session,
    SessionId, SessionProcessor, SessionRegistry,
};
