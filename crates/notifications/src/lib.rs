//! User-facing notices.
//!
//! [`NotificationSink`] is what the push gate talks to; [`NoticeBoard`] is
//! the in-memory implementation the notifier app renders from.

pub mod board;

pub use board::{Notice, NoticeBoard, NotificationSink, PostedNotice, Severity};
