//! Connection state and reconnect policy.

use std::time::Duration;

/// State of the realtime connection. At most one live transport exists per
/// client; these states describe where in its lifecycle it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    /// A close was requested; waiting for the transport's close signal.
    Closing,
    /// An unexpected close happened; a retry fires after the fixed interval.
    ReconnectScheduled { attempt: u32 },
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::ReconnectScheduled { .. }
        )
    }
}

/// Configuration for auto-reconnect behavior.
///
/// Bounded linear backoff: a fixed interval between attempts and a fixed
/// maximum attempt count. The counter resets on every successful open and on
/// a fresh manual connect.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of consecutive automatic attempts.
    pub max_attempts: u32,
    /// Fixed delay between an unexpected close and the next attempt.
    pub retry_interval: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_interval: Duration::from_millis(3000),
        }
    }
}
