//! Domain notifications pushed by the backend when reports change.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::frame::Inbound;

/// Kinds of notification the backend emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationType {
    ReportCreated,
    StatusUpdated,
}

impl NotificationType {
    /// Parses a wire name. Unknown names are not notifications.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ReportCreated" => Some(Self::ReportCreated),
            "StatusUpdated" => Some(Self::StatusUpdated),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReportCreated => "ReportCreated",
            Self::StatusUpdated => "StatusUpdated",
        }
    }
}

/// Report urgency level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Urgency {
    Baja,
    Media,
    Alta,
}

/// Report lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReportStatus {
    Pendiente,
    Atendiendo,
    Resuelto,
}

/// Event-specific payload. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_id: Option<String>,
    #[serde(
        rename = "urgencia",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub urgency: Option<Urgency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(rename = "estado", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ReportStatus>,
}

/// A user-facing notification about a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: NotificationType,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: NotificationData,
}

impl Notification {
    /// Extracts a notification from a decoded frame.
    ///
    /// Returns `None` for raw text, non-objects, and unknown `type` values.
    /// A known kind with a malformed `data` block still yields a
    /// notification carrying the message and empty data.
    pub fn from_inbound(inbound: &Inbound) -> Option<Self> {
        let kind = NotificationType::from_name(inbound.kind()?)?;
        let value = inbound.as_json()?;

        if let Ok(notification) = serde_json::from_value::<Notification>(value.clone()) {
            return Some(notification);
        }

        let field = |name: &str| {
            value
                .get(name)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        Some(Notification {
            kind,
            timestamp: field("timestamp"),
            message: field("message"),
            data: NotificationData::default(),
        })
    }

    /// Parses `timestamp` as RFC 3339. Empty or non-conforming stamps yield `None`.
    pub fn sent_at(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.timestamp).ok()
    }
}
