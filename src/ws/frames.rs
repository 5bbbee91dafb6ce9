// Wire frames - JSON envelopes of the form {"event": ..., "data": ...}.
//
// Decoding is lenient about `data`: a message frame with a missing, null or
// oddly typed payload still reaches the router, which fills in defaults.
// Only unparseable JSON and unknown event names are rejected.

use crate::core::chat::{InboundEvent, MessagePayload, OutboundEvent};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown event: {0}")]
    UnknownEvent(String),
}

/// Frames a client may send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    Register(String),
    Message(MessagePayload),
}

impl From<ClientFrame> for InboundEvent {
    fn from(frame: ClientFrame) -> Self {
        match frame {
            ClientFrame::Register(username) => InboundEvent::Register { username },
            ClientFrame::Message(payload) => InboundEvent::Message(payload),
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

pub fn decode(text: &str) -> Result<ClientFrame, FrameError> {
    let envelope: Envelope = serde_json::from_str(text)?;

    match envelope.event.as_str() {
        // A non-string name registers as blank, which the router turns
        // into the anonymous user
        "register" => Ok(ClientFrame::Register(
            envelope.data.as_str().unwrap_or_default().to_string(),
        )),
        "message" => Ok(ClientFrame::Message(MessagePayload {
            user: string_field(&envelope.data, "user"),
            text: string_field(&envelope.data, "text"),
        })),
        other => Err(FrameError::UnknownEvent(other.to_string())),
    }
}

pub fn encode(event: &OutboundEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}

fn string_field(data: &Value, key: &str) -> Option<String> {
    data.get(key).and_then(Value::as_str).map(str::to_string)
}
