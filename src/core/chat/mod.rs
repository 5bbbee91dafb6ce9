// Core chat module - event vocabulary and the session router.

pub mod chat_events;
pub mod session_router;

pub use chat_events::*;
pub use session_router::{SessionRouter, Transport};
