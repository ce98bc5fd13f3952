//! Public types for the push connection manager.

use std::time::Duration;

use reportify_protocol::Inbound;
use reportify_protocol::constants::{DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_BASE_DELAY};

/// Lifecycle state of the logical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport handshake in progress.
    Connecting,
    /// Transport open; sends go out immediately.
    Open,
    /// Peer sent a close frame; waiting for the stream to end.
    Closing,
    /// No live transport.
    Closed,
}

/// Events emitted by the connection manager, in the order they happen.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// The transport reached [`ConnectionState::Open`].
    Opened,
    /// A text frame arrived and was decoded.
    Message(Inbound),
    /// The transport closed. `code`/`reason` come from the peer's close
    /// frame when one was received.
    Closed {
        code: Option<u16>,
        reason: Option<String>,
    },
    /// Transport-level failure. Reported for observability only; the
    /// following `Closed` drives reconnection.
    Error(String),
    /// A reconnect was scheduled after `delay`. `attempt` is 1-based.
    Reconnecting { attempt: u32, delay: Duration },
    /// The attempt cap was reached; the manager stays closed.
    GaveUp { attempts: u32 },
}

/// Reconnection policy: exponential backoff bounded by attempt count only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Reconnects allowed after consecutive failures. `0` disables reconnection.
    pub max_attempts: u32,
    /// Delay before the first reconnect; doubles on each further attempt.
    pub base_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            base_delay: DEFAULT_RECONNECT_BASE_DELAY,
        }
    }
}

impl ReconnectConfig {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay for a reconnect given how many have already been scheduled
    /// since the last successful open: `base_delay * 2^previous`.
    pub fn delay_for_attempt(&self, previous: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(previous))
    }
}

/// Options applied to every connection a manager makes.
#[derive(Debug, Clone, Default)]
pub struct ManagerOptions {
    pub reconnect: ReconnectConfig,
    /// Subprotocols offered in `Sec-WebSocket-Protocol`.
    pub protocols: Vec<String>,
    /// Ping period while open. `None` disables client pings.
    pub keepalive: Option<Duration>,
}

impl ManagerOptions {
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_protocols(mut self, protocols: Vec<String>) -> Self {
        self.protocols = protocols;
        self
    }

    pub fn with_keepalive(mut self, period: Duration) -> Self {
        self.keepalive = Some(period);
        self
    }
}
