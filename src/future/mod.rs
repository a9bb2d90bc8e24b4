//! One-shot completion latch for asynchronous I/O operations.
//!
//! A [`CompletionFuture`] is created pending by whoever initiates an
//! operation and flipped ready exactly once by the operation's producer.
//! Consumers either await it or attach listeners that fire exactly once on
//! completion, no matter how registration races with the ready transition.
//!
//! The flag/value flip is serialized by a mutex; listener dispatch runs
//! outside it so a listener may re-enter `add_listener` without deadlock.
//! The listener list itself is a copy-on-write snapshot mutated by a
//! compare-and-swap loop, so concurrent adds and removes never lose
//! registrations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::Notify;

use crate::monitor::{self, BoxError, ErrorMonitor};

/// Callback invoked exactly once when a [`CompletionFuture`] completes.
///
/// Errors returned here are routed to the future's [`ErrorMonitor`] and do
/// not interrupt other listeners or the completing caller.
pub trait CompletionListener<V>: Send + Sync {
    fn on_complete(&self, future: &CompletionFuture<V>) -> Result<(), BoxError>;
}

impl<V, F> CompletionListener<V> for F
where
    F: Fn(&CompletionFuture<V>) -> Result<(), BoxError> + Send + Sync,
{
    fn on_complete(&self, future: &CompletionFuture<V>) -> Result<(), BoxError> {
        self(future)
    }
}

type ListenerList<V> = Vec<Arc<dyn CompletionListener<V>>>;

struct Shared<V> {
    /// Value slot. `None` is the pending sentinel.
    slot: Mutex<Option<V>>,
    /// Monotone false -> true, published with Release after the slot is set.
    ready: AtomicBool,
    /// Copy-on-write listener snapshot. The producer claims the whole list
    /// atomically at the ready transition.
    listeners: ArcSwap<ListenerList<V>>,
    notify: Notify,
    monitor: Arc<dyn ErrorMonitor>,
}

/// One-shot placeholder for the outcome of an asynchronous operation.
///
/// Cheaply cloneable; all clones observe the same latch.
pub struct CompletionFuture<V> {
    shared: Arc<Shared<V>>,
}

impl<V> Clone for CompletionFuture<V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<V> Default for CompletionFuture<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> CompletionFuture<V> {
    /// Create a pending future reporting listener errors to the process-wide
    /// monitor.
    pub fn new() -> Self {
        Self::with_monitor(monitor::global())
    }

    /// Create a pending future with an injected listener-error monitor.
    pub fn with_monitor(monitor: Arc<dyn ErrorMonitor>) -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(None),
                ready: AtomicBool::new(false),
                listeners: ArcSwap::from_pointee(Vec::new()),
                notify: Notify::new(),
                monitor,
            }),
        }
    }

    /// Whether the future has completed.
    pub fn is_done(&self) -> bool {
        self.shared.ready.load(Ordering::Acquire)
    }

    /// Transition to ready with `value`. The first call wins; later calls
    /// return `false` without touching the value slot.
    ///
    /// Wakes every blocked awaiter, then invokes the registered listeners in
    /// registration order, outside any lock.
    pub fn complete(&self, value: V) -> bool {
        {
            let mut slot = self.shared.slot.lock().unwrap_or_else(PoisonError::into_inner);
            if self.shared.ready.load(Ordering::Acquire) {
                return false;
            }
            *slot = Some(value);
            self.shared.ready.store(true, Ordering::Release);
        }

        self.shared.notify.notify_waiters();

        // Claim the whole listener list atomically. A concurrent
        // `add_listener` that appended after this swap finds its entry still
        // present and fires it itself; entries claimed here are ours alone.
        let claimed = self.shared.listeners.swap(Arc::new(Vec::new()));
        for listener in claimed.iter() {
            self.invoke(listener.as_ref());
        }
        true
    }

    /// Current value; `None` while pending.
    pub fn value(&self) -> Option<V>
    where
        V: Clone,
    {
        self.shared
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Suspend until the future completes. Returns `self` for chaining.
    pub async fn wait(&self) -> &Self {
        while !self.is_done() {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            // Register with the notifier before the re-check; a completion
            // landing in between would otherwise be missed.
            notified.as_mut().enable();
            if self.is_done() {
                break;
            }
            notified.await;
        }
        self
    }

    /// Suspend up to `timeout`; returns whether the future was ready at
    /// return. For an unbounded wait use [`wait`](Self::wait).
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_done() {
            return true;
        }
        tokio::time::timeout(timeout, self.wait()).await.is_ok()
    }

    /// Register a completion listener.
    ///
    /// If the future is already complete the listener is invoked
    /// synchronously on the calling thread before this returns. Otherwise it
    /// fires exactly once at the ready transition, even when registration
    /// races with [`complete`](Self::complete).
    pub fn add_listener(&self, listener: Arc<dyn CompletionListener<V>>) {
        if self.is_done() {
            self.invoke(listener.as_ref());
            return;
        }

        let mut current = self.shared.listeners.load();
        loop {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(Arc::clone(&listener));
            let previous = self
                .shared
                .listeners
                .compare_and_swap(&*current, Arc::new(next));
            if Arc::ptr_eq(&*previous, &*current) {
                break;
            }
            current = previous;
        }

        // The producer claims the list only after flipping ready. If ready is
        // now observed, the claim may or may not have included our entry:
        // whoever removes it from the live list owns the single invocation.
        if self.is_done() && self.remove_listener(&listener) {
            self.invoke(listener.as_ref());
        }
    }

    /// Remove the first occurrence of `listener` (by `Arc` identity).
    /// Returns whether an entry was removed.
    pub fn remove_listener(&self, listener: &Arc<dyn CompletionListener<V>>) -> bool {
        let mut current = self.shared.listeners.load();
        loop {
            let Some(index) = current.iter().position(|l| Arc::ptr_eq(l, listener)) else {
                return false;
            };
            let mut next: ListenerList<V> = (**current).clone();
            next.remove(index);
            let previous = self
                .shared
                .listeners
                .compare_and_swap(&*current, Arc::new(next));
            if Arc::ptr_eq(&*previous, &*current) {
                return true;
            }
            current = previous;
        }
    }

    fn invoke(&self, listener: &dyn CompletionListener<V>) {
        if let Err(error) = listener.on_complete(self) {
            self.shared.monitor.notify("completion listener", &error);
        }
    }
}

impl<V> std::fmt::Debug for CompletionFuture<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionFuture")
            .field("ready", &self.is_done())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::ErrorMonitor;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    struct Counting {
        invoked: AtomicUsize,
    }

    impl Counting {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                invoked: AtomicUsize::new(0),
            })
        }

        fn count(&self) -> usize {
            self.invoked.load(Ordering::SeqCst)
        }
    }

    impl<V> CompletionListener<V> for Counting {
        fn on_complete(&self, _future: &CompletionFuture<V>) -> Result<(), BoxError> {
            self.invoked.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct CollectingMonitor {
        errors: Mutex<Vec<String>>,
    }

    impl ErrorMonitor for CollectingMonitor {
        fn notify(&self, _context: &'static str, error: &BoxError) {
            self.errors.lock().unwrap().push(error.to_string());
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn latch_completes_across_threads() {
        let future: CompletionFuture<u32> = CompletionFuture::new();
        let listener = Counting::new();
        future.add_listener(listener.clone());

        let producer = future.clone();
        let handle = thread::spawn(move || producer.complete(42));

        future.wait().await;
        assert!(handle.join().unwrap());
        assert!(future.is_done());
        assert_eq!(future.value(), Some(42));
        assert_eq!(listener.count(), 1);
        assert!(future.wait_timeout(Duration::ZERO).await);
    }

    #[test]
    fn late_listener_fires_synchronously() {
        let future: CompletionFuture<u32> = CompletionFuture::new();
        assert!(future.complete(7));

        let listener = Counting::new();
        future.add_listener(listener.clone());
        assert_eq!(listener.count(), 1);
        assert_eq!(future.value(), Some(7));
    }

    #[tokio::test]
    async fn wait_timeout_on_pending_future() {
        let future: CompletionFuture<u32> = CompletionFuture::new();
        let start = std::time::Instant::now();
        assert!(!future.wait_timeout(Duration::from_millis(50)).await);
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(!future.is_done());
        assert_eq!(future.value(), None);
    }

    #[test]
    fn first_completion_wins() {
        let future: CompletionFuture<u32> = CompletionFuture::new();
        assert!(future.complete(1));
        assert!(!future.complete(2));
        assert_eq!(future.value(), Some(1));
    }

    #[test]
    fn listener_errors_are_isolated() {
        let monitor = Arc::new(CollectingMonitor {
            errors: Mutex::new(Vec::new()),
        });
        let future: CompletionFuture<u32> = CompletionFuture::with_monitor(monitor.clone());

        let failing = Arc::new(|_: &CompletionFuture<u32>| -> Result<(), BoxError> {
            Err("listener failed".into())
        });
        let recording = Counting::new();
        future.add_listener(failing);
        future.add_listener(recording.clone());

        assert!(future.complete(9));
        assert_eq!(recording.count(), 1);
        assert_eq!(*monitor.errors.lock().unwrap(), ["listener failed"]);
    }

    #[test]
    fn removed_listener_never_fires() {
        let future: CompletionFuture<u32> = CompletionFuture::new();
        let listener = Counting::new();
        let handle: Arc<dyn CompletionListener<u32>> = listener.clone();
        future.add_listener(Arc::clone(&handle));

        assert!(future.remove_listener(&handle));
        assert!(!future.remove_listener(&handle));

        future.complete(3);
        assert_eq!(listener.count(), 0);
    }

    #[test]
    fn concurrent_adds_race_with_completion() {
        const ADDERS: usize = 4;
        const ROUNDS: usize = 200;

        for round in 0..ROUNDS {
            let future: CompletionFuture<usize> = CompletionFuture::new();
            let listeners: Vec<_> = (0..ADDERS).map(|_| Counting::new()).collect();

            let mut handles = Vec::new();
            for listener in &listeners {
                let future = future.clone();
                let listener = listener.clone();
                handles.push(thread::spawn(move || future.add_listener(listener)));
            }
            let producer = future.clone();
            handles.push(thread::spawn(move || {
                producer.complete(round);
            }));

            for handle in handles {
                handle.join().unwrap();
            }

            for listener in &listeners {
                assert_eq!(listener.count(), 1, "round {round}");
            }
            assert_eq!(future.value(), Some(round));
        }
    }
}
