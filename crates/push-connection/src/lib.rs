//! Persistent push-channel client.
//!
//! Keeps at most one WebSocket open to a [`ConnectionTarget`], reconnects
//! with exponential backoff after drops, queues sends while disconnected,
//! and decodes inbound frames.

pub mod error;
pub mod manager;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
mod pumps;
pub(crate) mod reconnection;
pub mod target;
pub mod transport;
pub mod types;

pub use error::PushError;
pub use manager::ConnectionManager;
pub use target::ConnectionTarget;
pub use transport::{Connector, Transport, TungsteniteConnector};
pub use types::{ConnectionEvent, ConnectionState, ManagerOptions, ReconnectConfig};
