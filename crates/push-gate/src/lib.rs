//! Auth-gated push channel.
//!
//! [`NotificationGate`] owns at most one push connection, rebuilt whenever
//! the session credential changes, and relays report notifications to a
//! [`NotificationSink`](reportify_notifications::NotificationSink).

pub mod gate;
mod relay;

pub use gate::{GatePolicy, NotificationGate};
pub use reportify_push_connection::{ConnectionState, ReconnectConfig};
