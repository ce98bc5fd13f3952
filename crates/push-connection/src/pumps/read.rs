//! WebSocket read pump: decodes inbound frames.

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use reportify_protocol::Inbound;

use crate::reconnection::DriverContext;
use crate::types::{ConnectionEvent, ConnectionState};

/// How a read loop ended.
#[derive(Debug, PartialEq)]
pub(crate) enum ReadOutcome {
    /// The transport closed; close frame details if the peer sent one.
    Closed {
        code: Option<u16>,
        reason: Option<String>,
    },
    /// The driver was torn down; nothing more may be published.
    Cancelled,
}

/// Reads frames until the transport closes or the session is cancelled.
///
/// Text frames are decoded and delivered in arrival order. Transport errors
/// are reported as [`ConnectionEvent::Error`] and end the loop; the caller
/// publishes the close.
pub(crate) async fn read_pump<S>(
    mut read: S,
    ctx: &DriverContext,
    write_tx: &mpsc::UnboundedSender<tungstenite::Message>,
    cancel: &CancellationToken,
) -> ReadOutcome
where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    loop {
        let msg = tokio::select! {
            biased;
            _ = cancel.cancelled() => return ReadOutcome::Cancelled,
            msg = read.next() => msg,
        };

        match msg {
            Some(Ok(tungstenite::Message::Text(text))) => {
                trace!(connection = %ctx.id, len = text.len(), "received text frame");
                if !ctx.deliver(Inbound::decode(&text)) {
                    return ReadOutcome::Cancelled;
                }
            }
            Some(Ok(tungstenite::Message::Ping(data))) => {
                trace!("received ping, sending pong");
                let _ = write_tx.send(tungstenite::Message::Pong(data));
            }
            Some(Ok(tungstenite::Message::Pong(_))) => {
                trace!("received pong");
            }
            Some(Ok(tungstenite::Message::Close(frame))) => {
                debug!(connection = %ctx.id, ?frame, "received close frame");
                if !ctx.set_state(ConnectionState::Closing) {
                    return ReadOutcome::Cancelled;
                }
                let (code, reason) = match frame {
                    Some(f) => (
                        Some(u16::from(f.code)),
                        Some(f.reason.as_str().to_string()),
                    ),
                    None => (None, None),
                };
                return ReadOutcome::Closed { code, reason };
            }
            Some(Ok(other)) => {
                trace!(len = other.len(), "ignoring non-text frame");
            }
            Some(Err(e)) => {
                warn!(connection = %ctx.id, "WebSocket read error: {e}");
                if !ctx.emit(ConnectionEvent::Error(e.to_string())) {
                    return ReadOutcome::Cancelled;
                }
                return ReadOutcome::Closed {
                    code: None,
                    reason: None,
                };
            }
            None => {
                debug!(connection = %ctx.id, "WebSocket stream ended");
                return ReadOutcome::Closed {
                    code: None,
                    reason: None,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures_util::stream;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use uuid::Uuid;

    use super::*;
    use crate::reconnection::SharedState;
    use crate::target::ConnectionTarget;
    use crate::types::ManagerOptions;

    fn context() -> (DriverContext, Arc<SharedState>) {
        let shared = Arc::new(SharedState::new(16));
        let ctx = DriverContext {
            id: Uuid::new_v4(),
            generation: 0,
            target: ConnectionTarget::with_token("wss://x/", "abc").unwrap(),
            options: ManagerOptions::default(),
            connector: Arc::new(crate::mock::MockConnector::new().0),
            shared: shared.clone(),
        };
        (ctx, shared)
    }

    type Frame = Result<tungstenite::Message, tungstenite::Error>;

    #[tokio::test]
    async fn read_pump_delivers_in_arrival_order() {
        let (ctx, shared) = context();
        let mut events = shared.events_tx.subscribe();
        let (write_tx, _write_rx) = mpsc::unbounded_channel();
        let frames: Vec<Frame> = vec![
            Ok(tungstenite::Message::Text(r#"{"type":"StatusUpdated"}"#.into())),
            Ok(tungstenite::Message::Text("ping".into())),
        ];

        let outcome = read_pump(
            stream::iter(frames),
            &ctx,
            &write_tx,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(
            outcome,
            ReadOutcome::Closed {
                code: None,
                reason: None
            }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            ConnectionEvent::Message(Inbound::decode(r#"{"type":"StatusUpdated"}"#))
        );
        assert_eq!(
            events.try_recv().unwrap(),
            ConnectionEvent::Message(Inbound::Text("ping".into()))
        );
        assert_eq!(
            shared.lock().last_message,
            Some(Inbound::Text("ping".into()))
        );
    }

    #[tokio::test]
    async fn read_pump_answers_ping() {
        let (ctx, _shared) = context();
        let (write_tx, mut write_rx) = mpsc::unbounded_channel();
        let frames: Vec<Frame> = vec![Ok(tungstenite::Message::Ping(vec![1, 2].into()))];

        read_pump(stream::iter(frames), &ctx, &write_tx, &CancellationToken::new()).await;

        assert_eq!(
            write_rx.try_recv().unwrap(),
            tungstenite::Message::Pong(vec![1, 2].into())
        );
    }

    #[tokio::test]
    async fn read_pump_reports_close_frame() {
        let (ctx, shared) = context();
        let mut states = shared.state_tx.subscribe();
        let (write_tx, _write_rx) = mpsc::unbounded_channel();
        let frames: Vec<Frame> = vec![Ok(tungstenite::Message::Close(Some(CloseFrame {
            code: CloseCode::from(4001),
            reason: "token expired".into(),
        })))];

        let outcome =
            read_pump(stream::iter(frames), &ctx, &write_tx, &CancellationToken::new()).await;

        assert_eq!(
            outcome,
            ReadOutcome::Closed {
                code: Some(4001),
                reason: Some("token expired".into())
            }
        );
        assert_eq!(*states.borrow_and_update(), ConnectionState::Closing);
    }

    #[tokio::test]
    async fn read_pump_reports_error_then_closes() {
        let (ctx, shared) = context();
        let mut events = shared.events_tx.subscribe();
        let (write_tx, _write_rx) = mpsc::unbounded_channel();
        let frames: Vec<Frame> = vec![Err(tungstenite::Error::ConnectionClosed)];

        let outcome =
            read_pump(stream::iter(frames), &ctx, &write_tx, &CancellationToken::new()).await;

        assert!(matches!(outcome, ReadOutcome::Closed { code: None, .. }));
        assert!(matches!(events.try_recv().unwrap(), ConnectionEvent::Error(_)));
        // The close itself is published by the driver, not the pump.
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn read_pump_stops_on_cancel() {
        let (ctx, _shared) = context();
        let (write_tx, _write_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = read_pump(stream::pending::<Frame>(), &ctx, &write_tx, &cancel).await;
        assert_eq!(outcome, ReadOutcome::Cancelled);
    }

    #[tokio::test]
    async fn read_pump_ignores_binary() {
        let (ctx, shared) = context();
        let mut events = shared.events_tx.subscribe();
        let (write_tx, _write_rx) = mpsc::unbounded_channel();
        let frames: Vec<Frame> = vec![Ok(tungstenite::Message::Binary(vec![0xff].into()))];

        read_pump(stream::iter(frames), &ctx, &write_tx, &CancellationToken::new()).await;

        assert!(events.try_recv().is_err());
        assert!(shared.lock().last_message.is_none());
    }
}
