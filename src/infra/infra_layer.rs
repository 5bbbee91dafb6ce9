// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "classifier/huggingface_client.rs"]
pub mod classifier;
