//! Session processor boundary.
//!
//! The acceptor hands every accepted session to a processor and never
//! touches its I/O again. A session rejected by [`SessionProcessor::add`]
//! is destroyed by the acceptor, which closes the socket and returns the
//! admission permit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use crate::monitor::BoxError;

use super::Session;

/// Consumer of newly accepted sessions.
pub trait SessionProcessor: Send + Sync {
    /// Enqueue a session for processing. Must not block; a failure here is
    /// reported by the caller and the session is destroyed.
    fn add(&self, session: Arc<Session>) -> Result<(), BoxError>;

    /// Release processor resources. Idempotent.
    fn dispose(&self);
}

/// Errors from the queue-backed processor.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("session queue full")]
    QueueFull,
    #[error("processor disposed")]
    Disposed,
}

/// Minimal processor: hands sessions to an mpsc consumer.
///
/// Suitable for tests and embeddings that drive session I/O from a single
/// consumer task.
pub struct QueueProcessor {
    queue: Mutex<Option<mpsc::Sender<Arc<Session>>>>,
    disposed: AtomicBool,
}

impl QueueProcessor {
    /// Create a processor and the receiving end of its session queue.
    pub fn new(capacity: usize) -> (Arc<Self>, mpsc::Receiver<Arc<Session>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Arc::new(Self {
                queue: Mutex::new(Some(tx)),
                disposed: AtomicBool::new(false),
            }),
            rx,
        )
    }
}

impl SessionProcessor for QueueProcessor {
    fn add(&self, session: Arc<Session>) -> Result<(), BoxError> {
        let queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = queue.as_ref() else {
            return Err(Box::new(ProcessorError::Disposed));
        };
        match tx.try_send(session) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(Box::new(ProcessorError::QueueFull)),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(Box::new(ProcessorError::Disposed)),
        }
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        debug!("session processor disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use tokio::net::{TcpListener, TcpStream};

    async fn test_session() -> (Arc<Session>, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (
            Session::new(SessionConfig::default(), server, None).unwrap(),
            client,
        )
    }

    #[tokio::test]
    async fn add_delivers_to_consumer() {
        let (processor, mut rx) = QueueProcessor::new(4);
        let (session, _client) = test_session().await;
        let id = session.id();

        processor.add(session).unwrap();
        assert_eq!(rx.recv().await.unwrap().id(), id);
    }

    #[tokio::test]
    async fn full_queue_rejects_without_blocking() {
        let (processor, _rx) = QueueProcessor::new(1);
        let (first, _c1) = test_session().await;
        let (second, _c2) = test_session().await;

        processor.add(first).unwrap();
        let error = processor.add(second).unwrap_err();
        assert!(error.to_string().contains("queue full"));
    }

    #[tokio::test]
    async fn dispose_is_idempotent() {
        let (processor, mut rx) = QueueProcessor::new(4);
        processor.dispose();
        processor.dispose();
        assert!(rx.recv().await.is_none());

        let (session, _client) = test_session().await;
        assert!(processor.add(session).is_err());
    }
}
