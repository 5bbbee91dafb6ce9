// Connection hub - the Transport implementation for WebSocket clients.
//
// Each socket gets an unbounded channel; its send task drains the channel
// into the socket. Queuing never blocks the router, and the channel keeps
// per-connection FIFO order.

use crate::core::chat::{ConnectionId, OutboundEvent, Transport};
use dashmap::DashMap;
use tokio::sync::mpsc;

pub struct ConnectionHub {
    /// Maps connection -> that connection's outbound queue
    senders: DashMap<ConnectionId, mpsc::UnboundedSender<OutboundEvent>>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self {
            senders: DashMap::new(),
        }
    }

    /// Allocate an id and outbound queue for a new socket.
    pub fn open(&self) -> (ConnectionId, mpsc::UnboundedReceiver<OutboundEvent>) {
        let connection = ConnectionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.insert(connection, tx);
        (connection, rx)
    }

    /// Stop routing events to `connection`.
    pub fn close(&self, connection: ConnectionId) {
        self.senders.remove(&connection);
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for ConnectionHub {
    fn unicast(&self, connection: ConnectionId, event: OutboundEvent) {
        match self.senders.get(&connection) {
            Some(sender) => {
                if sender.send(event).is_err() {
                    tracing::debug!(connection = %connection, "Dropped event for closing connection");
                }
            }
            None => {
                tracing::debug!(connection = %connection, "Dropped event for unknown connection");
            }
        }
    }

    fn broadcast_all(&self, event: OutboundEvent) {
        for entry in self.senders.iter() {
            if entry.value().send(event.clone()).is_err() {
                tracing::debug!(connection = %entry.key(), "Dropped broadcast for closing connection");
            }
        }
    }
}
