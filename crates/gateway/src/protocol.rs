//! Client protocol envelopes: `{"type": ..., "data": ...}`.
//!
//! Inbound:  `chat` (user text), `stop`.
//! Outbound: `newChat`, `chat` (text fragment), `chatDone`, `singleChat`.

use serde::{Deserialize, Serialize};
use staybot_core::event::SessionEvent;

/// A frame sent by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEnvelope {
    Chat(String),
    Stop,
}

/// Why an inbound frame was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("chat data must be a string")]
    ChatDataNotText,

    #[error("unknown frame type '{0}'")]
    UnknownType(String),
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl ClientEnvelope {
    pub fn parse(frame: &str) -> Result<Self, ProtocolError> {
        let raw: RawEnvelope =
            serde_json::from_str(frame).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        match raw.kind.as_str() {
            "chat" => match raw.data {
                serde_json::Value::String(text) => Ok(Self::Chat(text)),
                serde_json::Value::Null => Ok(Self::Chat(String::new())),
                _ => Err(ProtocolError::ChatDataNotText),
            },
            "stop" => Ok(Self::Stop),
            other => Err(ProtocolError::UnknownType(other.to_string())),
        }
    }
}

/// A frame sent to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: String,
}

impl From<SessionEvent> for ServerEnvelope {
    fn from(event: SessionEvent) -> Self {
        let (kind, data) = match event {
            SessionEvent::Start => ("newChat", String::new()),
            SessionEvent::Token(text) => ("chat", text),
            SessionEvent::Complete => ("chatDone", String::new()),
            SessionEvent::Single(text) => ("singleChat", text),
        };
        Self {
            kind: kind.into(),
            data,
        }
    }
}

impl ServerEnvelope {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
