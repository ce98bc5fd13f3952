//! Inbound frame decoding and outbound payload serialization.

use serde::Serialize;

/// A decoded inbound text frame.
///
/// Frames are parsed as JSON when possible; anything else (e.g. a bare
/// `ping`) is kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Json(serde_json::Value),
    Text(String),
}

impl Inbound {
    /// Decodes a text frame. Never fails: unparseable input passes through
    /// as [`Inbound::Text`].
    pub fn decode(text: &str) -> Self {
        match serde_json::from_str(text) {
            Ok(value) => Inbound::Json(value),
            Err(_) => Inbound::Text(text.to_string()),
        }
    }

    /// Returns the JSON value if the frame was structured.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Inbound::Json(v) => Some(v),
            Inbound::Text(_) => None,
        }
    }

    /// Returns the raw text if the frame was not structured.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Inbound::Json(_) => None,
            Inbound::Text(t) => Some(t),
        }
    }

    /// Value of the `type` field, if the frame is a JSON object that has one.
    pub fn kind(&self) -> Option<&str> {
        self.as_json()?.get("type")?.as_str()
    }
}

/// A payload to transmit on the push channel.
///
/// Strings go out unchanged; JSON values are serialized first.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(String),
    Json(serde_json::Value),
}

impl Outbound {
    /// Builds a JSON payload from any serializable value.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Outbound::Json(serde_json::to_value(value)?))
    }

    /// Serialized wire form.
    pub fn into_text(self) -> String {
        match self {
            Outbound::Text(t) => t,
            Outbound::Json(v) => v.to_string(),
        }
    }
}

impl From<String> for Outbound {
    fn from(s: String) -> Self {
        Outbound::Text(s)
    }
}

impl From<&str> for Outbound {
    fn from(s: &str) -> Self {
        Outbound::Text(s.to_string())
    }
}

impl From<serde_json::Value> for Outbound {
    fn from(v: serde_json::Value) -> Self {
        Outbound::Json(v)
    }
}
