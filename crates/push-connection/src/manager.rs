//! Connection manager owning one logical push-channel connection.
//!
//! [`ConnectionManager::configure`] points the manager at a target and
//! spawns a driver task that connects, reconnects with exponential backoff
//! on drops, and gives up after the configured number of attempts. Sends
//! made while the connection is not open are queued and flushed, in order,
//! on the next open.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};
use uuid::Uuid;

use reportify_protocol::{Inbound, Outbound};

use crate::reconnection::{DriverContext, SharedState, run_connection};
use crate::target::ConnectionTarget;
use crate::transport::{Connector, TungsteniteConnector};
use crate::types::{ConnectionEvent, ConnectionState, ManagerOptions};

/// Capacity of the event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A running driver and the target it serves.
struct Driver {
    target: ConnectionTarget,
    cancel: CancellationToken,
    _handle: JoinHandle<()>,
}

/// Push-channel connection manager.
///
/// Must be configured from within a tokio runtime. Dropping the manager
/// tears the connection down.
pub struct ConnectionManager {
    id: Uuid,
    connector: Arc<dyn Connector>,
    options: ManagerOptions,
    shared: Arc<SharedState>,
    driver: Mutex<Option<Driver>>,
}

impl ConnectionManager {
    /// Creates an unconfigured manager using real WebSocket transports.
    pub fn new(options: ManagerOptions) -> Self {
        Self::with_connector(Arc::new(TungsteniteConnector), options)
    }

    /// Creates an unconfigured manager using `connector` for transports.
    pub fn with_connector(connector: Arc<dyn Connector>, options: ManagerOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            connector,
            options,
            shared: Arc::new(SharedState::new(EVENT_CHANNEL_CAPACITY)),
            driver: Mutex::new(None),
        }
    }

    /// Points the manager at `target`, or disconnects when `None`.
    ///
    /// Configuring the current target again is a no-op. Any other change
    /// tears down the existing connection (pending reconnect included) and
    /// discards its queue before the new connection starts. The connect
    /// attempt itself runs on a spawned task, never inside this call.
    pub fn configure(&self, target: Option<ConnectionTarget>) {
        let mut driver = self.lock_driver();
        if let (Some(current), Some(next)) = (driver.as_ref(), target.as_ref())
            && current.target == *next
        {
            trace!(connection = %self.id, endpoint = %next, "target unchanged");
            return;
        }

        if let Some(previous) = driver.take() {
            debug!(connection = %self.id, endpoint = %previous.target, "replacing target");
            self.teardown(previous);
            let mut shared = self.shared.lock();
            shared.queue.clear();
            shared.last_message = None;
        }

        let Some(target) = target else {
            return;
        };

        let generation = {
            let mut shared = self.shared.lock();
            shared.generation += 1;
            shared.generation
        };
        let cancel = CancellationToken::new();
        let ctx = DriverContext {
            id: self.id,
            generation,
            target: target.clone(),
            options: self.options.clone(),
            connector: self.connector.clone(),
            shared: self.shared.clone(),
        };
        info!(connection = %self.id, endpoint = %target, "push channel configured");
        let handle = tokio::spawn(run_connection(ctx, cancel.clone()));

        *driver = Some(Driver {
            target,
            cancel,
            _handle: handle,
        });
    }

    /// Sends `payload`, or queues it when the connection is not open.
    ///
    /// Returns `true` if the payload went out now and `false` if it was
    /// queued for the next open.
    pub fn send(&self, payload: impl Into<Outbound>) -> bool {
        let text = payload.into().into_text();
        let mut shared = self.shared.lock();

        if shared.state == ConnectionState::Open
            && let Some(writer) = &shared.writer
            && writer
                .send(tungstenite::Message::Text(text.clone().into()))
                .is_ok()
        {
            return true;
        }

        shared.queue.push_back(text);
        trace!(connection = %self.id, queued = shared.queue.len(), "message queued");
        false
    }

    /// Cancels any pending reconnect and closes the live transport.
    /// Idempotent.
    pub fn close(&self) {
        if let Some(driver) = self.lock_driver().take() {
            debug!(connection = %self.id, endpoint = %driver.target, "closing");
            self.teardown(driver);
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    /// Watches connection state changes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Subscribes to lifecycle events from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.shared.events_tx.subscribe()
    }

    /// Most recently decoded inbound frame.
    pub fn last_message(&self) -> Option<Inbound> {
        self.shared.lock().last_message.clone()
    }

    /// Number of messages waiting for the next open.
    pub fn queued(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// Target currently configured, if any.
    pub fn target(&self) -> Option<ConnectionTarget> {
        self.lock_driver().as_ref().map(|d| d.target.clone())
    }

    /// Identifier used in this manager's log lines.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Cancels the driver and invalidates everything it could still publish.
    fn teardown(&self, driver: Driver) {
        let mut shared = self.shared.lock();
        driver.cancel.cancel();
        shared.generation += 1;
        shared.writer = None;
        self.shared.set_state(&mut shared, ConnectionState::Closed);
    }

    fn lock_driver(&self) -> MutexGuard<'_, Option<Driver>> {
        self.driver.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close();
    }
}
