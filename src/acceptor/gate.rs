//! Admission gate bounding concurrently live sessions.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// The gate was closed while acquiring.
#[derive(Debug, Error)]
#[error("admission gate closed")]
pub struct GateClosed;

/// Counting semaphore sized to the acceptor's connection budget.
///
/// A permit is acquired before each accept and moved into the session it
/// admits; dropping the permit — at session destruction, or on any error
/// path that never produced a session — is the sole release path.
pub struct AdmissionGate {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl AdmissionGate {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    /// Suspend until a permit frees up or the gate closes.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, GateClosed> {
        Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| GateClosed)
    }

    /// Permanently disable acquisition and wake blocked acquirers.
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    /// Permits not currently held by a session or an in-flight accept.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn permits_return_on_drop() {
        let gate = AdmissionGate::new(2);
        let first = gate.acquire().await.unwrap();
        let _second = gate.acquire().await.unwrap();
        assert_eq!(gate.available(), 0);

        drop(first);
        assert_eq!(gate.available(), 1);
        assert_eq!(gate.capacity(), 2);
    }

    #[tokio::test]
    async fn close_wakes_blocked_acquirers() {
        let gate = AdmissionGate::new(1);
        let held = gate.acquire().await.unwrap();

        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.acquire().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        gate.close();
        assert!(waiter.await.unwrap().is_err());
        assert!(gate.is_closed());
        drop(held);
    }
}
