//! TCP acceptor: binds endpoints and drives admission-gated accept loops.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::Mutex;
use tracing::{info, span, Instrument, Level};

use crate::config::AcceptorConfig;
use crate::error::AcceptorError;
use crate::monitor::{self, ErrorMonitor};
use crate::session::{IdleChecker, SessionProcessor, SessionRegistry};

use super::accept::{self, AcceptContext};
use super::bindings::{BoundListener, ListenerSet, ListenerTag};
use super::factory::{SessionFactory, TcpSessionFactory};
use super::gate::AdmissionGate;

/// Acceptor for incoming TCP sessions.
///
/// Binds any number of endpoints, bounds concurrently live sessions through
/// an [`AdmissionGate`], and hands accepted sessions to the configured
/// [`SessionProcessor`].
pub struct TcpAcceptor {
    config: AcceptorConfig,
    bindings: ListenerSet,

    /// Present iff at least one listener is bound and `max_connections > 0`.
    gate: Mutex<Option<Arc<AdmissionGate>>>,

    processor: Arc<dyn SessionProcessor>,
    factory: Arc<dyn SessionFactory>,
    monitor: Arc<dyn ErrorMonitor>,

    registry: Arc<SessionRegistry>,
    idle: IdleChecker,

    active: Arc<AtomicUsize>,
    disposed: AtomicBool,
}

impl TcpAcceptor {
    /// Create an acceptor with the default TCP transport hooks and the
    /// process-wide error monitor.
    pub fn new(config: AcceptorConfig, processor: Arc<dyn SessionProcessor>) -> Self {
        let registry = SessionRegistry::new();
        let idle = IdleChecker::new(registry.clone(), config.idle_check_interval);
        Self {
            config,
            bindings: ListenerSet::new(),
            gate: Mutex::new(None),
            processor,
            factory: Arc::new(TcpSessionFactory),
            monitor: monitor::global(),
            registry,
            idle,
            active: Arc::new(AtomicUsize::new(0)),
            disposed: AtomicBool::new(false),
        }
    }

    /// Replace the transport hooks. Call before binding.
    pub fn with_factory(mut self, factory: Arc<dyn SessionFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Replace the error monitor. Call before binding.
    pub fn with_monitor(mut self, monitor: Arc<dyn ErrorMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn config(&self) -> &AcceptorConfig {
        &self.config
    }

    /// Read-only view over the sessions this acceptor created.
    pub fn sessions(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Number of live sessions created by this acceptor.
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// The admission gate, when admission control is active.
    pub async fn admission_gate(&self) -> Option<Arc<AdmissionGate>> {
        self.gate.lock().await.clone()
    }

    /// Endpoints currently bound, as actually resolved by the OS.
    pub async fn local_endpoints(&self) -> Vec<SocketAddr> {
        self.bindings.endpoints().await
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Bind every endpoint, all-or-nothing, and start an accept loop per
    /// listener. Returns the actual local endpoints (relevant when port 0
    /// was requested).
    pub async fn bind(&self, endpoints: &[SocketAddr]) -> Result<Vec<SocketAddr>, AcceptorError> {
        let entries: Vec<_> = endpoints.iter().map(|&endpoint| (endpoint, None)).collect();
        self.bind_entries(entries).await
    }

    /// Like [`bind`](Self::bind), attaching an opaque tag to each endpoint.
    /// The tag is carried to the [`SessionFactory`] for every connection
    /// accepted on that endpoint.
    pub async fn bind_tagged(
        &self,
        endpoints: Vec<(SocketAddr, ListenerTag)>,
    ) -> Result<Vec<SocketAddr>, AcceptorError> {
        let entries: Vec<_> = endpoints
            .into_iter()
            .map(|(endpoint, tag)| (endpoint, Some(tag)))
            .collect();
        self.bind_entries(entries).await
    }

    async fn bind_entries(
        &self,
        endpoints: Vec<(SocketAddr, Option<ListenerTag>)>,
    ) -> Result<Vec<SocketAddr>, AcceptorError> {
        if self.is_disposed() {
            return Err(AcceptorError::Disposed);
        }
        if endpoints.is_empty() {
            return Ok(Vec::new());
        }

        // Open everything first so a failure can roll back cleanly: dropping
        // a listener closes it.
        let mut opened: Vec<(SocketAddr, TcpListener, Option<ListenerTag>)> =
            Vec::with_capacity(endpoints.len());
        for (endpoint, tag) in endpoints {
            let result = self
                .open_listener(endpoint)
                .and_then(|listener| Ok((listener.local_addr()?, listener)));
            match result {
                Ok((actual, listener)) => opened.push((actual, listener, tag)),
                Err(source) => {
                    drop(opened);
                    return Err(AcceptorError::Bind { endpoint, source });
                }
            }
        }

        let gate = if self.config.max_connections > 0 {
            let mut slot = self.gate.lock().await;
            Some(Arc::clone(slot.get_or_insert_with(|| {
                AdmissionGate::new(self.config.max_connections)
            })))
        } else {
            None
        };

        let mut actual_endpoints = Vec::with_capacity(opened.len());
        for (endpoint, listener, tag) in opened {
            let listener = Arc::new(listener);
            let ctx = AcceptContext {
                endpoint,
                listener: Arc::clone(&listener),
                tag: tag.clone(),
                gate: gate.clone(),
                processor: Arc::clone(&self.processor),
                factory: Arc::clone(&self.factory),
                monitor: Arc::clone(&self.monitor),
                registry: Arc::clone(&self.registry),
                active: Arc::clone(&self.active),
                session_config: self.config.session.clone(),
            };
            let task = tokio::spawn(
                accept::run(ctx).instrument(span!(Level::DEBUG, "accept", endpoint = %endpoint)),
            );

            self.bindings
                .insert(BoundListener {
                    endpoint,
                    listener,
                    tag,
                    task,
                })
                .await;

            info!(
                endpoint = %endpoint,
                max_connections = self.config.max_connections,
                "listener started"
            );
            actual_endpoints.push(endpoint);
        }

        self.idle.start();
        Ok(actual_endpoints)
    }

    fn open_listener(&self, endpoint: SocketAddr) -> io::Result<TcpListener> {
        let socket = match endpoint {
            SocketAddr::V4(_) => TcpSocket::new_v4()?,
            SocketAddr::V6(_) => TcpSocket::new_v6()?,
        };
        socket.set_reuseaddr(self.config.reuse_address)?;
        socket.bind(endpoint)?;
        socket.listen(self.config.backlog)
    }

    /// Unbind the given endpoints. Unknown endpoints are ignored; a second
    /// unbind of the same endpoints is a no-op. When the last listener goes,
    /// the idle checker stops and the admission gate is closed and
    /// discarded.
    pub async fn unbind(&self, endpoints: &[SocketAddr]) {
        for endpoint in endpoints {
            if let Some(entry) = self.bindings.remove(endpoint).await {
                // Aborting the loop drops its listener handle (closing the
                // socket) and any permit held at a suspension point.
                entry.task.abort();
                info!(endpoint = %entry.endpoint, "listener stopped");
            }
        }

        if self.bindings.is_empty().await {
            self.idle.stop();
            let mut slot = self.gate.lock().await;
            if let Some(gate) = slot.take() {
                gate.close();
            }
        }
    }

    /// Dispose the acceptor: unbind everything, close the gate, dispose the
    /// processor. Idempotent; other operations on a disposed acceptor are
    /// rejected (`bind`) or no-ops (`unbind`).
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let bound = self.bindings.endpoints().await;
        self.unbind(&bound).await;
        self.processor.dispose();
        info!("acceptor disposed");
    }
}
