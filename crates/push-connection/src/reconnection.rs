//! Connection driver: connect, run a session, back off, repeat.
//!
//! Contains the state shared between a [`ConnectionManager`] and its
//! driver task, the generation-checked [`DriverContext`], and the
//! reconnect loop.
//!
//! [`ConnectionManager`]: crate::ConnectionManager

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, mpsc, watch};
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use reportify_protocol::Inbound;

use crate::pumps::ping::ping_pump;
use crate::pumps::read::{ReadOutcome, read_pump};
use crate::pumps::write::write_pump;
use crate::target::ConnectionTarget;
use crate::transport::{Connector, Transport};
use crate::types::{ConnectionEvent, ConnectionState, ManagerOptions};

/// Mutable connection state guarded by one lock.
///
/// `generation` is bumped on every teardown; a driver only mutates the
/// state while its captured generation is still current.
pub(crate) struct Shared {
    pub(crate) generation: u64,
    pub(crate) state: ConnectionState,
    pub(crate) queue: VecDeque<String>,
    pub(crate) writer: Option<mpsc::UnboundedSender<tungstenite::Message>>,
    pub(crate) last_message: Option<Inbound>,
}

/// Shared state plus the channels that publish it.
pub(crate) struct SharedState {
    inner: Mutex<Shared>,
    pub(crate) state_tx: watch::Sender<ConnectionState>,
    pub(crate) events_tx: broadcast::Sender<ConnectionEvent>,
}

impl SharedState {
    pub(crate) fn new(events_capacity: usize) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Closed);
        let (events_tx, _) = broadcast::channel(events_capacity);
        Self {
            inner: Mutex::new(Shared {
                generation: 0,
                state: ConnectionState::Closed,
                queue: VecDeque::new(),
                writer: None,
                last_message: None,
            }),
            state_tx,
            events_tx,
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Shared> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a state transition and publishes it. Caller holds the lock.
    pub(crate) fn set_state(&self, shared: &mut Shared, state: ConnectionState) {
        if shared.state != state {
            debug!(from = ?shared.state, to = ?state, "connection state changed");
        }
        shared.state = state;
        self.state_tx.send_replace(state);
    }

    pub(crate) fn emit(&self, event: ConnectionEvent) {
        // No subscribers is fine.
        let _ = self.events_tx.send(event);
    }
}

/// Writes queued messages to `writer` in FIFO order.
///
/// Stops at the first message the writer refuses, leaving it and
/// everything behind it queued. Returns the number written.
pub(crate) fn drain_queue(
    queue: &mut VecDeque<String>,
    writer: &mpsc::UnboundedSender<tungstenite::Message>,
) -> usize {
    let mut sent = 0;
    while let Some(front) = queue.front() {
        if writer
            .send(tungstenite::Message::Text(front.clone().into()))
            .is_err()
        {
            break;
        }
        queue.pop_front();
        sent += 1;
    }
    sent
}

/// Everything one driver task needs. Cheap to clone.
#[derive(Clone)]
pub(crate) struct DriverContext {
    pub(crate) id: Uuid,
    pub(crate) generation: u64,
    pub(crate) target: ConnectionTarget,
    pub(crate) options: ManagerOptions,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) shared: Arc<SharedState>,
}

impl DriverContext {
    /// Runs `f` against the shared state if this driver is still current.
    fn with_current<R>(&self, f: impl FnOnce(&SharedState, &mut Shared) -> R) -> Option<R> {
        let mut shared = self.shared.lock();
        if shared.generation != self.generation {
            return None;
        }
        Some(f(self.shared.as_ref(), &mut *shared))
    }

    pub(crate) fn set_state(&self, state: ConnectionState) -> bool {
        self.with_current(|s, shared| s.set_state(shared, state))
            .is_some()
    }

    pub(crate) fn emit(&self, event: ConnectionEvent) -> bool {
        self.with_current(|s, _| s.emit(event)).is_some()
    }

    /// Marks the connection open, announces it, then flushes the queue.
    ///
    /// All under one lock so a concurrent `send` cannot overtake queued
    /// messages.
    pub(crate) fn open(&self, writer: &mpsc::UnboundedSender<tungstenite::Message>) -> bool {
        self.with_current(|s, shared| {
            s.set_state(shared, ConnectionState::Open);
            shared.writer = Some(writer.clone());
            s.emit(ConnectionEvent::Opened);
            let flushed = drain_queue(&mut shared.queue, writer);
            if flushed > 0 {
                debug!(
                    connection = %self.id,
                    flushed,
                    remaining = shared.queue.len(),
                    "flushed queued messages"
                );
            }
        })
        .is_some()
    }

    /// Records and publishes a decoded inbound frame.
    pub(crate) fn deliver(&self, inbound: Inbound) -> bool {
        self.with_current(|s, shared| {
            shared.last_message = Some(inbound.clone());
            s.emit(ConnectionEvent::Message(inbound));
        })
        .is_some()
    }

    /// Detaches the writer and publishes the close.
    pub(crate) fn closed(&self, code: Option<u16>, reason: Option<String>) -> bool {
        self.with_current(|s, shared| {
            shared.writer = None;
            s.set_state(shared, ConnectionState::Closed);
            s.emit(ConnectionEvent::Closed { code, reason });
        })
        .is_some()
    }
}

/// Connection loop for one target.
///
/// Exits when cancelled, when the manager moved on to a newer generation,
/// or after the reconnect cap is reached.
pub(crate) async fn run_connection(ctx: DriverContext, cancel: CancellationToken) {
    let reconnect = ctx.options.reconnect.clone();
    let mut attempts: u32 = 0;

    loop {
        if cancel.is_cancelled() || !ctx.set_state(ConnectionState::Connecting) {
            return;
        }
        debug!(connection = %ctx.id, endpoint = %ctx.target, "connecting");

        let connected = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            result = ctx.connector.connect(&ctx.target, &ctx.options.protocols) => result,
        };

        let (code, reason) = match connected {
            Ok(transport) => {
                attempts = 0;
                info!(connection = %ctx.id, endpoint = %ctx.target, "push channel open");
                match run_session(&ctx, transport, &cancel).await {
                    ReadOutcome::Closed { code, reason } => (code, reason),
                    ReadOutcome::Cancelled => return,
                }
            }
            Err(e) => {
                warn!(connection = %ctx.id, endpoint = %ctx.target, error = %e, "connect failed");
                if !ctx.emit(ConnectionEvent::Error(e.to_string())) {
                    return;
                }
                (None, None)
            }
        };

        if cancel.is_cancelled() || !ctx.closed(code, reason) {
            return;
        }

        if attempts >= reconnect.max_attempts {
            warn!(
                connection = %ctx.id,
                attempts,
                "reconnect attempts exhausted, giving up"
            );
            ctx.emit(ConnectionEvent::GaveUp { attempts });
            return;
        }

        let delay = reconnect.delay_for_attempt(attempts);
        attempts += 1;
        if !ctx.emit(ConnectionEvent::Reconnecting {
            attempt: attempts,
            delay,
        }) {
            return;
        }
        info!(
            connection = %ctx.id,
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            "reconnecting"
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(connection = %ctx.id, "reconnect cancelled");
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Runs one open transport until it closes or the driver is cancelled.
async fn run_session(
    ctx: &DriverContext,
    transport: Transport,
    cancel: &CancellationToken,
) -> ReadOutcome {
    let Transport { sink, stream } = transport;
    let session = cancel.child_token();
    let (write_tx, write_rx) = mpsc::unbounded_channel();

    let write_handle = tokio::spawn(write_pump(sink, write_rx, session.clone()));
    let ping_handle = ctx
        .options
        .keepalive
        .map(|period| tokio::spawn(ping_pump(write_tx.clone(), period, session.clone())));

    let outcome = if ctx.open(&write_tx) {
        read_pump(stream, ctx, &write_tx, &session).await
    } else {
        ReadOutcome::Cancelled
    };

    // Stops the pumps; the write pump sends a close frame on its way out.
    session.cancel();
    if let Some(handle) = ping_handle {
        handle.abort();
    }
    drop(write_handle);

    outcome
}
