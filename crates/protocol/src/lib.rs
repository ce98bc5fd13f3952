//! Wire types for the Reportify push-notification channel.
//!
//! Inbound frames are decoded best-effort into [`Inbound`]; the subset that
//! carries a known [`NotificationType`] converts into a [`Notification`].
//! Outbound payloads are either raw text or JSON ([`Outbound`]).

pub mod constants;
pub mod frame;
pub mod notification;

// Re-export primary types for convenience.
pub use frame::{Inbound, Outbound};
pub use notification::{Notification, NotificationData, NotificationType, ReportStatus, Urgency};
