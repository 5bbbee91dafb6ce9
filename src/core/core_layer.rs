// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "classifier/classifier_port.rs"]
pub mod classifier;

#[path = "moderation/mod.rs"]
pub mod moderation;

#[path = "presence/presence_registry.rs"]
pub mod presence;

#[path = "chat/mod.rs"]
pub mod chat;
