// Presence registry - who is in the room right now.
//
// Maps each live connection to the display name it registered with.
// The room only ever sees distinct names: two tabs logged in as "alice"
// count as one user.

use crate::core::chat::ConnectionId;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// The `user_list` payload: distinct registered names and how many there are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresenceSnapshot {
    pub count: usize,
    pub users: Vec<String>,
}

#[derive(Debug, Default)]
pub struct PresenceRegistry {
    entries: HashMap<ConnectionId, String>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `connection` to `username`, replacing any earlier name.
    ///
    /// Returns the name the connection was registered under before, if any.
    pub fn register(&mut self, connection: ConnectionId, username: String) -> Option<String> {
        self.entries.insert(connection, username)
    }

    /// Forget `connection`. Returns the name it held, or `None` if it never
    /// registered.
    pub fn unregister(&mut self, connection: ConnectionId) -> Option<String> {
        self.entries.remove(&connection)
    }

    /// Distinct usernames currently registered.
    ///
    /// Names come back sorted, but callers shouldn't rely on the order.
    pub fn snapshot(&self) -> PresenceSnapshot {
        let users: Vec<String> = self
            .entries
            .values()
            .map(String::as_str)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();

        PresenceSnapshot {
            count: users.len(),
            users,
        }
    }

    /// Number of registered connections (not distinct names).
    pub fn connection_count(&self) -> usize {
        self.entries.len()
    }
}
