//! Lifecycle gate tying the push channel to the session credential.
//!
//! The channel is eligible only when both an endpoint and a non-empty
//! token are present. Each change of the derived target replaces the
//! connection; losing eligibility tears it down and re-arms the
//! one-per-login "connected" notice.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use reportify_notifications::NotificationSink;
use reportify_protocol::Outbound;
use reportify_protocol::constants::NOTIFICATION_DISPLAY_MS;
use reportify_push_connection::{
    ConnectionManager, ConnectionState, ConnectionTarget, Connector, ManagerOptions,
    ReconnectConfig, TungsteniteConnector,
};

use crate::relay::relay_events;

/// Connection settings the gate applies to every connection it builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatePolicy {
    pub reconnect: ReconnectConfig,
    /// Display duration for relayed notifications.
    pub notice_duration_ms: u64,
    pub protocols: Vec<String>,
    pub keepalive: Option<Duration>,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            reconnect: ReconnectConfig::new(3, Duration::from_millis(2000)),
            notice_duration_ms: NOTIFICATION_DISPLAY_MS,
            protocols: Vec::new(),
            keepalive: None,
        }
    }
}

impl GatePolicy {
    fn manager_options(&self) -> ManagerOptions {
        let mut options = ManagerOptions::default()
            .with_reconnect(self.reconnect.clone())
            .with_protocols(self.protocols.clone());
        if let Some(period) = self.keepalive {
            options = options.with_keepalive(period);
        }
        options
    }
}

/// The live connection and its relay task.
struct ActiveChannel {
    target: ConnectionTarget,
    manager: ConnectionManager,
    relay_cancel: CancellationToken,
    _relay: JoinHandle<()>,
}

impl ActiveChannel {
    fn shutdown(self) {
        self.relay_cancel.cancel();
        self.manager.close();
    }
}

/// Owns at most one push connection, derived from the current credential.
pub struct NotificationGate {
    endpoint: String,
    policy: GatePolicy,
    connector: Arc<dyn Connector>,
    sink: Arc<dyn NotificationSink>,
    acknowledged: Arc<AtomicBool>,
    active: Mutex<Option<ActiveChannel>>,
}

impl NotificationGate {
    /// Creates a gate for `endpoint` using real WebSocket transports.
    ///
    /// An empty endpoint makes the gate permanently ineligible.
    pub fn new(
        endpoint: impl Into<String>,
        policy: GatePolicy,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self::with_connector(endpoint, policy, sink, Arc::new(TungsteniteConnector))
    }

    pub fn with_connector(
        endpoint: impl Into<String>,
        policy: GatePolicy,
        sink: Arc<dyn NotificationSink>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            policy,
            connector,
            sink,
            acknowledged: Arc::new(AtomicBool::new(false)),
            active: Mutex::new(None),
        }
    }

    /// Applies a new session credential.
    ///
    /// Must be called from within a tokio runtime. A credential that maps to
    /// the current target leaves the connection alone.
    pub fn set_credential(&self, token: Option<&str>) {
        let target = token.and_then(|t| ConnectionTarget::with_token(&self.endpoint, t));
        let mut active = self.lock_active();

        if let (Some(current), Some(next)) = (active.as_ref(), target.as_ref())
            && current.target == *next
        {
            return;
        }

        if let Some(previous) = active.take() {
            debug!(endpoint = %previous.target, "replacing push channel");
            previous.shutdown();
        }

        match target {
            Some(target) => {
                info!(endpoint = %target, "push channel eligible");
                *active = Some(self.open(target));
            }
            None => {
                debug!("push channel ineligible");
                self.acknowledged.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Whether the current connection is open.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Whether an endpoint and credential are both present.
    pub fn is_eligible(&self) -> bool {
        self.lock_active().is_some()
    }

    /// State of the current connection; `Closed` while ineligible.
    pub fn state(&self) -> ConnectionState {
        self.lock_active()
            .as_ref()
            .map_or(ConnectionState::Closed, |a| a.manager.state())
    }

    /// Watches the current connection's state. `None` while ineligible.
    pub fn watch_state(&self) -> Option<watch::Receiver<ConnectionState>> {
        self.lock_active().as_ref().map(|a| a.manager.watch_state())
    }

    /// Sends through the current connection.
    ///
    /// Returns `false` without queueing when ineligible; otherwise follows
    /// [`ConnectionManager::send`].
    pub fn send(&self, payload: impl Into<Outbound>) -> bool {
        match self.lock_active().as_ref() {
            Some(active) => active.manager.send(payload),
            None => false,
        }
    }

    /// Messages queued on the current connection.
    pub fn queued(&self) -> usize {
        self.lock_active().as_ref().map_or(0, |a| a.manager.queued())
    }

    /// Tears the connection down without clearing the acknowledgement.
    pub fn shutdown(&self) {
        if let Some(active) = self.lock_active().take() {
            info!(endpoint = %active.target, "push channel shut down");
            active.shutdown();
        }
    }

    fn open(&self, target: ConnectionTarget) -> ActiveChannel {
        let manager =
            ConnectionManager::with_connector(self.connector.clone(), self.policy.manager_options());
        let relay_cancel = CancellationToken::new();
        let relay = tokio::spawn(relay_events(
            manager.subscribe(),
            self.sink.clone(),
            self.acknowledged.clone(),
            self.policy.notice_duration_ms,
            relay_cancel.clone(),
        ));
        manager.configure(Some(target.clone()));

        ActiveChannel {
            target,
            manager,
            relay_cancel,
            _relay: relay,
        }
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveChannel>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for NotificationGate {
    fn drop(&mut self) {
        self.shutdown();
    }
}
