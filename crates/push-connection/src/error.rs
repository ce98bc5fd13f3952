//! Push connection error types.

use tokio_tungstenite::tungstenite;

/// Errors from establishing or using a push connection.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("WebSocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("connection closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_error_display() {
        assert_eq!(PushError::Closed.to_string(), "connection closed");
        assert_eq!(
            PushError::InvalidTarget("bad header".into()).to_string(),
            "invalid target: bad header"
        );
        let err = PushError::from(tungstenite::Error::ConnectionClosed);
        assert!(err.to_string().starts_with("WebSocket error"));
    }
}
