// WebSocket layer - the transport adapter for browser clients.
//
// Everything here is glue: it turns socket frames into core events and
// core events back into frames. No moderation logic lives in this layer.

pub mod frames;
pub mod handler;
pub mod hub;
