//! Periodic idle scan over live sessions.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::{DisconnectReason, ManagedSessions};

/// Destroys sessions that have been idle longer than their configured
/// `idle_timeout`. Started on the acceptor's first bind, stopped when the
/// last listener is unbound and on dispose.
pub struct IdleChecker {
    sessions: Arc<dyn ManagedSessions>,
    interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl IdleChecker {
    pub fn new(sessions: Arc<dyn ManagedSessions>, interval: Duration) -> Self {
        Self {
            sessions,
            interval,
            task: Mutex::new(None),
        }
    }

    /// Start scanning. A second call while running is a no-op.
    pub fn start(&self) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.is_some() {
            return;
        }

        let sessions = Arc::clone(&self.sessions);
        let interval = self.interval;
        *task = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                scan(sessions.as_ref());
            }
        }));
        debug!(interval = ?self.interval, "idle checker started");
    }

    /// Stop scanning. Idempotent.
    pub fn stop(&self) {
        let handle = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            debug!("idle checker stopped");
        }
    }
}

impl Drop for IdleChecker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn scan(sessions: &dyn ManagedSessions) {
    for session in sessions.snapshot() {
        let timeout = session.config().idle_timeout;
        if timeout.is_zero() {
            continue;
        }
        let idle = session.idle_for();
        if idle >= timeout {
            trace!(session = %session.id(), ?idle, "idle timeout exceeded");
            session.destroy(DisconnectReason::Idle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::session::{Session, SessionRegistry};
    use tokio::net::{TcpListener, TcpStream};

    async fn idle_session(registry: &SessionRegistry, timeout: Duration) -> TcpStream {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        let config = SessionConfig {
            idle_timeout: timeout,
            ..SessionConfig::default()
        };
        registry.insert(Session::new(config, server, None).unwrap());
        client
    }

    #[tokio::test]
    async fn idle_sessions_are_destroyed() {
        let registry = SessionRegistry::new();
        let _client = idle_session(&registry, Duration::from_millis(30)).await;
        let session = registry.snapshot().pop().unwrap();

        let checker = IdleChecker::new(registry.clone(), Duration::from_millis(10));
        checker.start();
        checker.start();

        session.close_future().wait().await;
        assert_eq!(
            session.close_future().value(),
            Some(DisconnectReason::Idle)
        );
        checker.stop();
        checker.stop();
    }

    #[tokio::test]
    async fn zero_timeout_disables_idle_destruction() {
        let registry = SessionRegistry::new();
        let _client = idle_session(&registry, Duration::ZERO).await;
        let session = registry.snapshot().pop().unwrap();

        let checker = IdleChecker::new(registry.clone(), Duration::from_millis(10));
        checker.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!session.is_closed());
        checker.stop();
    }
}
