// Classifier port - the contract every toxicity model adapter implements.
//
// The core only ever sees `LabelScore` lists. Whether they come from a
// hosted inference API or a local model is an infra concern.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// One (label, confidence) pair produced by the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    /// Confidence in `[0, 1]`
    pub score: f64,
}

#[cfg(test)]
impl LabelScore {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Classifier request failed: {0}")]
    Request(String),

    #[error("Classifier returned an unexpected response: {0}")]
    InvalidResponse(String),

    #[error("Classifier returned no labels")]
    EmptyResult,

    #[error("Classifier did not answer within {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait ToxicityClassifier: Send + Sync {
    /// Scores `text` against the model's labels.
    ///
    /// Implementations must return at least one entry for non-empty text.
    async fn classify(&self, text: &str) -> Result<Vec<LabelScore>, ClassifierError>;
}

// Lets the composition root pick the classifier at runtime and hand a
// trait object to the moderation service.
#[async_trait]
impl ToxicityClassifier for Box<dyn ToxicityClassifier> {
    async fn classify(&self, text: &str) -> Result<Vec<LabelScore>, ClassifierError> {
        (**self).classify(text).await
    }
}
