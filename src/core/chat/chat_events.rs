// Chat event vocabulary shared by the router and any transport.
//
// Outbound event names (`message`, `user_list`) are a wire contract with
// existing clients, so they are pinned with serde attributes here rather
// than left to each transport.

use crate::core::presence::PresenceSnapshot;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Display name used for moderation notices.
pub const SYSTEM_USER: &str = "⚠️ System";

/// Name given to messages that arrive without one.
pub const ANONYMOUS_USER: &str = "Anonymous";

/// Transport-assigned identity of one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A chat line as clients see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub user: String,
    pub text: String,
}

impl ChatMessage {
    pub fn new(user: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            text: text.into(),
        }
    }

    /// A moderation notice from the system user.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(SYSTEM_USER, text)
    }
}

/// Body of an inbound `message` event. Both fields are optional on the
/// wire; the router fills in defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePayload {
    pub user: Option<String>,
    pub text: Option<String>,
}

/// Everything a transport can tell the router about a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Connect,
    Register { username: String },
    Message(MessagePayload),
    Disconnect,
}

/// Everything the router can ask a transport to deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OutboundEvent {
    Message(ChatMessage),
    UserList(PresenceSnapshot),
}
