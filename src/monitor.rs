//! Process-wide sink for errors raised on background tasks.
//!
//! Accept loops, completion listeners, and idle checks run detached from any
//! caller, so their failures have nowhere to unwind to. Components report
//! them here instead. The monitor is injectable per component, with a
//! replaceable process-wide default that logs through `tracing`.

use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use tracing::error;

/// Boxed error type carried across the monitor boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Sink for errors that have no caller to propagate to.
pub trait ErrorMonitor: Send + Sync {
    /// Report an error raised in `context` (a short component label).
    fn notify(&self, context: &'static str, error: &BoxError);
}

/// Default monitor: reports through `tracing::error!`.
#[derive(Debug, Default)]
pub struct LogMonitor;

impl ErrorMonitor for LogMonitor {
    fn notify(&self, context: &'static str, error: &BoxError) {
        error!(context, error = %error, "unhandled background error");
    }
}

static GLOBAL: LazyLock<RwLock<Arc<dyn ErrorMonitor>>> =
    LazyLock::new(|| RwLock::new(Arc::new(LogMonitor) as Arc<dyn ErrorMonitor>));

/// Get the process-wide monitor.
pub fn global() -> Arc<dyn ErrorMonitor> {
    GLOBAL
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Replace the process-wide monitor.
pub fn set_global(monitor: Arc<dyn ErrorMonitor>) {
    *GLOBAL.write().unwrap_or_else(PoisonError::into_inner) = monitor;
}
