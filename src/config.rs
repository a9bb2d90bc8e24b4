//! Configuration types for acceptors and sessions.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Acceptor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptorConfig {
    /// Maximum concurrently live sessions across all bound listeners.
    /// Zero disables admission control.
    #[serde(default)]
    pub max_connections: usize,

    /// Listen backlog applied to every bound socket.
    #[serde(default = "default_backlog")]
    pub backlog: u32,

    /// Apply SO_REUSEADDR to bound sockets.
    #[serde(default = "default_true")]
    pub reuse_address: bool,

    /// Whether the accept path may reuse read buffers across accepts.
    #[serde(default = "default_reuse_buffer")]
    pub reuse_buffer: bool,

    /// How often the idle checker scans live sessions.
    #[serde(default = "default_idle_check_interval", with = "humantime_serde")]
    pub idle_check_interval: Duration,

    /// Template copied into every accepted session.
    #[serde(default)]
    pub session: SessionConfig,
}

impl Default for AcceptorConfig {
    fn default() -> Self {
        Self {
            max_connections: 0,
            backlog: default_backlog(),
            reuse_address: default_true(),
            reuse_buffer: default_reuse_buffer(),
            idle_check_interval: default_idle_check_interval(),
            session: SessionConfig::default(),
        }
    }
}

/// Per-session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle time after which the session is destroyed.
    /// Zero disables idle destruction.
    #[serde(default, with = "humantime_serde")]
    pub idle_timeout: Duration,

    /// Whether the I/O layer may reuse read buffers across reads.
    #[serde(default)]
    pub reuse_buffer: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::ZERO,
            reuse_buffer: false,
        }
    }
}

fn default_backlog() -> u32 {
    1024
}

fn default_true() -> bool {
    true
}

fn default_reuse_buffer() -> bool {
    false
}

fn default_idle_check_interval() -> Duration {
    Duration::from_secs(1)
}
