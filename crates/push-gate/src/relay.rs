//! Relays connection events to the notification sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use reportify_notifications::{Notice, NotificationSink};
use reportify_protocol::constants::{CONNECTED_ACK_DISPLAY_MS, CONNECTED_ACK_MESSAGE};
use reportify_protocol::{Inbound, Notification};
use reportify_push_connection::ConnectionEvent;

/// Notice for a decoded frame, if it is a report notification.
pub(crate) fn notice_for(inbound: &Inbound, duration_ms: u64) -> Option<Notice> {
    let notification = Notification::from_inbound(inbound)?;
    Some(Notice::info(notification.message, duration_ms))
}

/// Forwards events from one connection until cancelled or the connection
/// is gone.
///
/// `acknowledged` is shared across connections for the same login: only
/// the first open after it was cleared produces the connected notice.
pub(crate) async fn relay_events(
    mut events: broadcast::Receiver<ConnectionEvent>,
    sink: Arc<dyn NotificationSink>,
    acknowledged: Arc<AtomicBool>,
    notice_duration_ms: u64,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = events.recv() => event,
        };
        if cancel.is_cancelled() {
            break;
        }

        match event {
            Ok(ConnectionEvent::Opened) => {
                info!("push channel connected");
                if !acknowledged.swap(true, Ordering::SeqCst) {
                    sink.show(Notice::success(CONNECTED_ACK_MESSAGE, CONNECTED_ACK_DISPLAY_MS));
                }
            }
            Ok(ConnectionEvent::Message(inbound)) => {
                match notice_for(&inbound, notice_duration_ms) {
                    Some(notice) => {
                        debug!(kind = ?inbound.kind(), "relaying notification");
                        sink.show(notice);
                    }
                    None => trace!(frame = ?inbound, "inbound message not relayed"),
                }
            }
            Ok(ConnectionEvent::Closed { code, reason }) => {
                debug!(?code, ?reason, "push channel disconnected");
            }
            Ok(ConnectionEvent::Error(e)) => warn!(error = %e, "push channel error"),
            Ok(ConnectionEvent::Reconnecting { attempt, delay }) => {
                debug!(attempt, delay_ms = delay.as_millis() as u64, "push channel reconnecting");
            }
            Ok(ConnectionEvent::GaveUp { attempts }) => {
                warn!(attempts, "push channel gave up reconnecting");
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "relay lagged behind connection events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use reportify_notifications::{NoticeBoard, Severity};
    use serde_json::json;

    use super::*;

    #[test]
    fn status_updated_becomes_info_notice() {
        let inbound = Inbound::Json(json!({
            "type": "StatusUpdated",
            "message": "X",
            "data": {"report_id": "r-1", "estado": "RESUELTO"}
        }));
        assert_eq!(notice_for(&inbound, 5000), Some(Notice::info("X", 5000)));
    }

    #[test]
    fn unknown_and_raw_frames_are_not_relayed() {
        let unknown = Inbound::Json(json!({"type": "Unknown", "message": "X"}));
        assert!(notice_for(&unknown, 5000).is_none());
        assert!(notice_for(&Inbound::Text("ping".into()), 5000).is_none());
    }

    #[tokio::test]
    async fn relay_acknowledges_first_open_only() {
        let (tx, rx) = broadcast::channel(16);
        let board = Arc::new(Mutex::new(NoticeBoard::new()));
        let acknowledged = Arc::new(AtomicBool::new(false));

        tx.send(ConnectionEvent::Opened).unwrap();
        tx.send(ConnectionEvent::Closed {
            code: None,
            reason: None,
        })
        .unwrap();
        tx.send(ConnectionEvent::Opened).unwrap();
        tx.send(ConnectionEvent::Message(Inbound::Json(json!({
            "type": "ReportCreated",
            "message": "Nuevo reporte"
        }))))
        .unwrap();
        drop(tx);

        relay_events(
            rx,
            board.clone(),
            acknowledged.clone(),
            5000,
            CancellationToken::new(),
        )
        .await;

        let board = board.lock().unwrap();
        let notices: Vec<(Severity, &str, u64)> = board
            .iter()
            .map(|n| {
                (
                    n.notice.severity,
                    n.notice.message.as_str(),
                    n.notice.duration_ms,
                )
            })
            .collect();
        assert_eq!(
            notices,
            vec![
                (Severity::Success, CONNECTED_ACK_MESSAGE, CONNECTED_ACK_DISPLAY_MS),
                (Severity::Info, "Nuevo reporte", 5000),
            ]
        );
        assert!(acknowledged.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn relay_stops_when_cancelled() {
        let (tx, rx) = broadcast::channel(16);
        let board = Arc::new(Mutex::new(NoticeBoard::new()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        tx.send(ConnectionEvent::Opened).unwrap();
        relay_events(rx, board.clone(), Arc::new(AtomicBool::new(false)), 5000, cancel).await;

        assert!(board.lock().unwrap().is_empty());
    }
}
