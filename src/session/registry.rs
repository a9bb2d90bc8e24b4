//! Registry of live sessions.
//!
//! The acceptor inserts sessions as they are created and removes them when
//! their destroyed event fires. Readers (the idle checker, embedding code)
//! only ever see point-in-time snapshots, so iteration never races with
//! mutation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use super::{Session, SessionId};

/// Read-only view over the set of live sessions.
pub trait ManagedSessions: Send + Sync {
    /// Point-in-time snapshot of every live session.
    fn snapshot(&self) -> Vec<Arc<Session>>;

    /// Number of live sessions.
    fn count(&self) -> usize;
}

/// Live-session map keyed by session id.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
        })
    }

    pub fn insert(&self, session: Arc<Session>) {
        let id = session.id();
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.insert(id, session);
        debug!(session = %id, "session registered");
    }

    pub fn remove(&self, id: SessionId) -> Option<Arc<Session>> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let removed = sessions.remove(&id);
        if removed.is_some() {
            debug!(session = %id, "session unregistered");
        }
        removed
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }
}

impl ManagedSessions for SessionRegistry {
    fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    fn count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
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
    async fn insert_snapshot_remove() {
        let registry = SessionRegistry::new();
        let (session, _client) = test_session().await;
        let id = session.id();

        registry.insert(session);
        assert!(registry.contains(id));
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.snapshot().len(), 1);

        assert!(registry.remove(id).is_some());
        assert!(registry.remove(id).is_none());
        assert_eq!(registry.count(), 0);
    }
}
