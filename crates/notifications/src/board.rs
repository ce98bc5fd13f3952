use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::trace;

/// Visual category of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
    Info,
}

/// A notice to show the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub severity: Severity,
    /// How long the notice stays visible. `0` keeps it until dismissed.
    pub duration_ms: u64,
}

impl Notice {
    pub fn new(message: impl Into<String>, severity: Severity, duration_ms: u64) -> Self {
        Self {
            message: message.into(),
            severity,
            duration_ms,
        }
    }

    pub fn success(message: impl Into<String>, duration_ms: u64) -> Self {
        Self::new(message, Severity::Success, duration_ms)
    }

    pub fn error(message: impl Into<String>, duration_ms: u64) -> Self {
        Self::new(message, Severity::Error, duration_ms)
    }

    pub fn info(message: impl Into<String>, duration_ms: u64) -> Self {
        Self::new(message, Severity::Info, duration_ms)
    }
}

/// Receives notices for display.
pub trait NotificationSink: Send + Sync {
    fn show(&self, notice: Notice);
}

/// A notice on the board.
#[derive(Debug, Clone)]
pub struct PostedNotice {
    pub id: u64,
    pub notice: Notice,
    pub posted_at: Instant,
}

impl PostedNotice {
    /// Whether a timed notice has outlived its duration at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.notice.duration_ms > 0
            && now.saturating_duration_since(self.posted_at)
                >= Duration::from_millis(self.notice.duration_ms)
    }
}

/// In-memory notice board with monotonic ID assignment.
///
/// Expiry is driven by the caller through [`prune_expired`](Self::prune_expired).
#[derive(Debug, Clone, Default)]
pub struct NoticeBoard {
    notices: Vec<PostedNotice>,
    next_id: u64,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Posts a notice now. Returns its ID.
    pub fn post(&mut self, notice: Notice) -> u64 {
        self.post_at(notice, Instant::now())
    }

    /// Posts a notice as of `posted_at`. Returns its ID.
    pub fn post_at(&mut self, notice: Notice, posted_at: Instant) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        trace!(id, severity = ?notice.severity, "notice posted");
        self.notices.push(PostedNotice {
            id,
            notice,
            posted_at,
        });
        id
    }

    /// Removes a notice by ID. Returns `true` if it was on the board.
    pub fn dismiss(&mut self, id: u64) -> bool {
        let len_before = self.notices.len();
        self.notices.retain(|n| n.id != id);
        self.notices.len() != len_before
    }

    /// Removes every timed notice expired at `now`; returns how many.
    pub fn prune_expired(&mut self, now: Instant) -> usize {
        let len_before = self.notices.len();
        self.notices.retain(|n| !n.is_expired(now));
        len_before - self.notices.len()
    }

    pub fn get(&self, id: u64) -> Option<&PostedNotice> {
        self.notices.iter().find(|n| n.id == id)
    }

    /// Most recently posted notice still on the board.
    pub fn latest(&self) -> Option<&PostedNotice> {
        self.notices.last()
    }

    /// Notices in posting order (oldest first).
    pub fn iter(&self) -> impl Iterator<Item = &PostedNotice> {
        self.notices.iter()
    }

    pub fn len(&self) -> usize {
        self.notices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }

    pub fn clear(&mut self) {
        self.notices.clear();
    }
}

impl NotificationSink for Mutex<NoticeBoard> {
    fn show(&self, notice: Notice) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .post(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_and_retrieve() {
        let mut board = NoticeBoard::new();
        let id = board.post(Notice::info("Test", 3000));

        let posted = board.get(id).unwrap();
        assert_eq!(posted.notice.message, "Test");
        assert_eq!(posted.notice.severity, Severity::Info);
        assert_eq!(posted.notice.duration_ms, 3000);
    }

    #[test]
    fn ids_are_monotonic_and_order_kept() {
        let mut board = NoticeBoard::new();
        let a = board.post(Notice::success("first", 0));
        let b = board.post(Notice::error("second", 0));
        let c = board.post(Notice::info("third", 0));

        assert_eq!((a, b, c), (0, 1, 2));
        let messages: Vec<&str> = board.iter().map(|n| n.notice.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "third"]);
        assert_eq!(board.latest().unwrap().id, 2);
    }

    #[test]
    fn dismiss_notice() {
        let mut board = NoticeBoard::new();
        let keep = board.post(Notice::success("keep", 0));
        let gone = board.post(Notice::error("remove me", 0));

        assert!(board.dismiss(gone));
        assert!(!board.dismiss(gone));
        assert!(board.get(gone).is_none());
        assert!(board.get(keep).is_some());
        assert_eq!(board.len(), 1);
    }

    #[test]
    fn prune_removes_only_expired_timed_notices() {
        let mut board = NoticeBoard::new();
        let t0 = Instant::now();
        board.post_at(Notice::success("short", 3000), t0);
        board.post_at(Notice::info("long", 5000), t0);
        board.post_at(Notice::error("sticky", 0), t0);

        assert_eq!(board.prune_expired(t0 + Duration::from_millis(2999)), 0);
        assert_eq!(board.prune_expired(t0 + Duration::from_millis(3000)), 1);
        assert_eq!(board.prune_expired(t0 + Duration::from_secs(3600)), 1);

        let left: Vec<&str> = board.iter().map(|n| n.notice.message.as_str()).collect();
        assert_eq!(left, vec!["sticky"]);
    }

    #[test]
    fn mutex_board_is_a_sink() {
        let board = Mutex::new(NoticeBoard::new());
        let sink: &dyn NotificationSink = &board;
        sink.show(Notice::info("hello", 5000));

        let board = board.into_inner().unwrap();
        assert_eq!(board.len(), 1);
        assert_eq!(board.latest().unwrap().notice, Notice::info("hello", 5000));
    }

    #[test]
    fn clear_and_is_empty() {
        let mut board = NoticeBoard::new();
        assert!(board.is_empty());
        board.post(Notice::info("a", 0));
        assert!(!board.is_empty());
        board.clear();
        assert!(board.is_empty());
    }
}
