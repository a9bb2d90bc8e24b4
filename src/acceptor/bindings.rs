//! Bound-listener bookkeeping.
//!
//! Mutated only by bind/unbind on the caller's task; accept loops each own
//! an `Arc` of their listener and never iterate this map.

use std::any::Any;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Opaque user data attached to a bound endpoint and carried along its
/// accept loop.
pub type ListenerTag = Arc<dyn Any + Send + Sync>;

pub(crate) struct BoundListener {
    pub endpoint: SocketAddr,
    /// Keeps the listening socket open until the entry is removed.
    #[allow(dead_code)]
    pub listener: Arc<TcpListener>,
    /// User data pinned for the entry's lifetime.
    #[allow(dead_code)]
    pub tag: Option<ListenerTag>,
    /// The endpoint's accept loop; aborted on unbind.
    pub task: JoinHandle<()>,
}

#[derive(Default)]
pub(crate) struct ListenerSet {
    entries: RwLock<HashMap<SocketAddr, BoundListener>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, entry: BoundListener) {
        let mut entries = self.entries.write().await;
        entries.insert(entry.endpoint, entry);
    }

    pub async fn remove(&self, endpoint: &SocketAddr) -> Option<BoundListener> {
        let mut entries = self.entries.write().await;
        entries.remove(endpoint)
    }

    pub async fn endpoints(&self) -> Vec<SocketAddr> {
        let entries = self.entries.read().await;
        entries.keys().copied().collect()
    }

    pub async fn is_empty(&self) -> bool {
        let entries = self.entries.read().await;
        entries.is_empty()
    }
}
