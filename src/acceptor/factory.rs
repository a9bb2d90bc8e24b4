//! Transport hooks: how accepts are driven and sessions are built.
//!
//! Injected as a capability object so embeddings can substitute either half
//! without subclassing anything.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::OwnedSemaphorePermit;

use crate::config::SessionConfig;
use crate::monitor::BoxError;
use crate::session::Session;

use super::bindings::ListenerTag;

/// Drives the platform accept primitive and builds sessions from accepted
/// streams.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Accept the next connection on `listener`.
    async fn accept(&self, listener: &TcpListener) -> io::Result<(TcpStream, SocketAddr)>;

    /// Build a session around an accepted stream. The permit, when present,
    /// must ride in the session so its destruction frees the admission slot.
    fn new_session(
        &self,
        config: &SessionConfig,
        stream: TcpStream,
        permit: Option<OwnedSemaphorePermit>,
        tag: Option<&ListenerTag>,
    ) -> Result<Arc<Session>, BoxError>;
}

/// Default TCP factory.
pub struct TcpSessionFactory;

#[async_trait]
impl SessionFactory for TcpSessionFactory {
    async fn accept(&self, listener: &TcpListener) -> io::Result<(TcpStream, SocketAddr)> {
        let (stream, peer) = listener.accept().await?;
        stream.set_nodelay(true)?;
        Ok((stream, peer))
    }

    fn new_session(
        &self,
        config: &SessionConfig,
        stream: TcpStream,
        permit: Option<OwnedSemaphorePermit>,
        _tag: Option<&ListenerTag>,
    ) -> Result<Arc<Session>, BoxError> {
        let session = Session::new(config.clone(), stream, permit)?;
        session.touch();
        Ok(session)
    }
}
