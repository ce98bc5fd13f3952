use std::time::Duration;

/// Query parameter carrying the credential on the connect URL.
pub const TOKEN_QUERY_PARAM: &str = "token";

/// Default reconnect attempts before giving up.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Default base interval for exponential reconnect backoff.
pub const DEFAULT_RECONNECT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Maximum inbound message size in bytes (1 MB).
///
/// Notifications are small JSON documents; anything larger is rejected
/// by the transport.
pub const WS_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Display duration for relayed domain notifications, in milliseconds.
pub const NOTIFICATION_DISPLAY_MS: u64 = 5000;

/// Display duration for the one-time connected acknowledgment, in milliseconds.
pub const CONNECTED_ACK_DISPLAY_MS: u64 = 3000;

/// Text shown once per login when the push channel first opens.
pub const CONNECTED_ACK_MESSAGE: &str = "Conectado al sistema de notificaciones";
