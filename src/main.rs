// This is the entry point of the chat relay.
//
// **Architecture Overview:**
// - `core/` = Business logic (transport-agnostic)
// - `infra/` = Implementations of core traits (classifier APIs)
// - `ws/` = WebSocket adapter (frames, connection hub, routes)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Serve the HTTP/WebSocket app

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;
#[path = "ws/ws_layer.rs"]
mod ws;

use crate::core::chat::SessionRouter;
use crate::core::classifier::ToxicityClassifier;
use crate::core::moderation::{
    ModerationConfig, ModerationService, BAN_THRESHOLD, DEFAULT_CLASSIFIER_TIMEOUT_SECS,
    TOXICITY_THRESHOLD,
};
use crate::infra::classifier::{HuggingFaceClassifier, DEFAULT_MODEL};
use crate::ws::handler;
use crate::ws::hub::ConnectionHub;
use anyhow::Context;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";

/// Read `key` from the environment, falling back to `default` when it is
/// unset or doesn't parse.
fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Ignoring invalid {}={:?}: {}", key, raw, e);
                default
            }
        },
        Err(_) => default,
    }
}

fn load_moderation_config() -> ModerationConfig {
    ModerationConfig {
        toxicity_threshold: env_or("TOXICITY_THRESHOLD", TOXICITY_THRESHOLD),
        ban_threshold: env_or("BAN_THRESHOLD", BAN_THRESHOLD),
        classifier_timeout: Duration::from_secs(env_or(
            "CLASSIFIER_TIMEOUT_SECS",
            DEFAULT_CLASSIFIER_TIMEOUT_SECS,
        )),
        ..Default::default()
    }
}

fn build_classifier() -> HuggingFaceClassifier {
    let api_token = std::env::var("HF_API_TOKEN").ok();

    match std::env::var("CLASSIFIER_URL") {
        Ok(url) => HuggingFaceClassifier::new(url, api_token),
        Err(_) => {
            let model =
                std::env::var("CLASSIFIER_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
            HuggingFaceClassifier::for_model(&model, api_token)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists) so RUST_LOG applies too
    dotenv::dotenv().ok();

    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let bind_addr =
        std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // This is the "composition root" where we wire everything together.

    let moderation_config = load_moderation_config();
    let classifier = build_classifier();
    tracing::info!(
        endpoint = classifier.endpoint(),
        toxicity_threshold = moderation_config.toxicity_threshold,
        ban_threshold = moderation_config.ban_threshold,
        timeout = ?moderation_config.classifier_timeout,
        "Moderation configured"
    );

    let classifier: Box<dyn ToxicityClassifier> = Box::new(classifier);
    let moderation = ModerationService::new(classifier, moderation_config);
    let router = Arc::new(SessionRouter::new(moderation, ConnectionHub::new()));

    // ========================================================================
    // SERVER
    // ========================================================================

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    tracing::info!("🚀 Chat relay listening on {}", bind_addr);

    axum::serve(listener, handler::app(router))
        .await
        .context("Server error")?;

    Ok(())
}
