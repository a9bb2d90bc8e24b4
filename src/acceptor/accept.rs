//! Per-listener accept loop.
//!
//! Each bound endpoint runs one loop task: acquire an admission permit,
//! accept, build a session, hand it to the processor, re-arm. A saturated
//! gate parks only this endpoint's task. Unbind stops the loop by aborting
//! the task; an abort at any suspension point drops the held permit, so the
//! admission budget never leaks.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::future::CompletionFuture;
use crate::monitor::{BoxError, ErrorMonitor};
use crate::session::{DisconnectReason, SessionProcessor, SessionRegistry};

use super::bindings::ListenerTag;
use super::factory::SessionFactory;
use super::gate::AdmissionGate;

pub(crate) struct AcceptContext {
    pub endpoint: SocketAddr,
    pub listener: Arc<TcpListener>,
    pub tag: Option<ListenerTag>,
    pub gate: Option<Arc<AdmissionGate>>,
    pub processor: Arc<dyn SessionProcessor>,
    pub factory: Arc<dyn SessionFactory>,
    pub monitor: Arc<dyn ErrorMonitor>,
    pub registry: Arc<SessionRegistry>,
    pub active: Arc<AtomicUsize>,
    pub session_config: SessionConfig,
}

pub(crate) async fn run(ctx: AcceptContext) {
    loop {
        // Admission first: the permit covers the in-flight accept as well as
        // the session it eventually admits.
        let permit = match &ctx.gate {
            Some(gate) => match gate.acquire().await {
                Ok(permit) => Some(permit),
                Err(_closed) => {
                    debug!(endpoint = %ctx.endpoint, "admission gate closed, stopping accept loop");
                    break;
                }
            },
            None => None,
        };

        let (stream, peer) = match ctx.factory.accept(&ctx.listener).await {
            Ok(accepted) => accepted,
            Err(error) => {
                warn!(endpoint = %ctx.endpoint, error = %error, "accept failed");
                let error: BoxError = Box::new(error);
                ctx.monitor.notify("accept", &error);
                // The permit drops here, freeing the slot before re-arming.
                continue;
            }
        };

        let session = match ctx
            .factory
            .new_session(&ctx.session_config, stream, permit, ctx.tag.as_ref())
        {
            Ok(session) => session,
            Err(error) => {
                warn!(endpoint = %ctx.endpoint, peer = %peer, error = %error, "session setup failed");
                ctx.monitor.notify("session setup", &error);
                continue;
            }
        };

        debug!(
            endpoint = %ctx.endpoint,
            session = %session.id(),
            peer = %peer,
            "connection accepted"
        );

        ctx.registry.insert(Arc::clone(&session));
        ctx.active.fetch_add(1, Ordering::SeqCst);

        let registry = Arc::clone(&ctx.registry);
        let active = Arc::clone(&ctx.active);
        let id = session.id();
        session.close_future().add_listener(Arc::new(
            move |_: &CompletionFuture<DisconnectReason>| -> Result<(), BoxError> {
                registry.remove(id);
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            },
        ));

        if let Err(error) = ctx.processor.add(Arc::clone(&session)) {
            warn!(session = %session.id(), error = %error, "session processor rejected session");
            ctx.monitor.notify("session processor", &error);
            // Closes the socket and returns the permit before re-arming.
            session.destroy(DisconnectReason::Error);
        }
    }
}
