// Core moderation module - contains the toxicity policy.
// Same layout as the chat module: models + service, re-exported.

pub mod moderation_models;
pub mod moderation_service;

pub use moderation_models::*;
pub use moderation_service::*;
