//! Terminal notice sink.

use std::sync::{Arc, Mutex, PoisonError};

use reportify_notifications::{Notice, NoticeBoard, NotificationSink, Severity};

/// Prints notices to stdout and keeps them on a board until they expire.
pub struct ConsoleSink {
    board: Arc<Mutex<NoticeBoard>>,
}

impl ConsoleSink {
    pub fn new(board: Arc<Mutex<NoticeBoard>>) -> Self {
        Self { board }
    }
}

impl NotificationSink for ConsoleSink {
    fn show(&self, notice: Notice) {
        println!("{}", render(&notice));
        self.board
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .post(notice);
    }
}

/// Single-line rendering of a notice.
pub fn render(notice: &Notice) -> String {
    let label = match notice.severity {
        Severity::Success => "ok",
        Severity::Error => "error",
        Severity::Info => "info",
    };
    format!("[{label}] {}", notice.message)
}
