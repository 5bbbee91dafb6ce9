// Moderation service - core business logic for the toxicity policy.
//
// This service handles:
// - Ban checks (banned users never reach the classifier)
// - Bounded classifier calls
// - Warning escalation (warn -> ban)
//
// NO transport dependencies here - just pure domain logic.

use super::moderation_models::{Disposition, ModerationConfig, UserStanding};
use crate::core::classifier::{ClassifierError, LabelScore, ToxicityClassifier};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tokio::sync::Mutex;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("Message could not be classified: {0}")]
    Classifier(#[from] ClassifierError),
}

// ============================================================================
// STATE
// ============================================================================

#[derive(Debug, Default)]
struct WarningRecord {
    count: u32,
    last_violation: Option<DateTime<Utc>>,
}

/// Warning counters and the ban set, keyed by display name.
///
/// Two connections using the same name share one record. Usernames are not
/// authenticated, so a client can inherit another's warnings or ban by
/// picking the same name.
#[derive(Debug, Default)]
struct ModerationLedger {
    warnings: HashMap<String, WarningRecord>,
    banned: HashSet<String>,
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// Screens messages and owns every user's warning/ban state.
///
/// All counter and ban mutations happen under one lock, so concurrent
/// messages from the same user can't lose an increment or ban twice.
/// Classification itself runs outside the lock.
pub struct ModerationService<C: ToxicityClassifier> {
    classifier: C,
    config: ModerationConfig,
    ledger: Mutex<ModerationLedger>,
}

impl<C: ToxicityClassifier> ModerationService<C> {
    /// Create a new moderation service with the given classifier.
    pub fn new(classifier: C, config: ModerationConfig) -> Self {
        Self {
            classifier,
            config,
            ledger: Mutex::new(ModerationLedger::default()),
        }
    }

    pub fn config(&self) -> &ModerationConfig {
        &self.config
    }

    /// Run one message through the full pipeline.
    ///
    /// Banned users short-circuit to `Blocked` before the classifier is
    /// called. A classifier failure or timeout is returned as an error and
    /// leaves every counter untouched.
    ///
    /// Messages from one connection arrive here one at a time. Connections
    /// sharing a username are classified concurrently, so their warnings
    /// are numbered in the order classifications finish, not the order the
    /// messages arrived. The totals are exact either way.
    pub async fn check_message(
        &self,
        username: &str,
        text: &str,
    ) -> Result<Disposition, ModerationError> {
        if self.is_banned(username).await {
            tracing::debug!(user = %username, "Skipping classifier for banned user");
            return Ok(Disposition::Blocked);
        }

        let classification = self.classify_bounded(text).await?;

        Ok(self.evaluate(username, text, &classification).await)
    }

    /// Apply the policy to an already-classified message.
    ///
    /// The ban check is repeated under the lock: another message from the
    /// same user may have crossed the threshold while this one was being
    /// classified.
    pub async fn evaluate(
        &self,
        username: &str,
        text: &str,
        classification: &[LabelScore],
    ) -> Disposition {
        let mut guard = self.ledger.lock().await;
        let ledger = &mut *guard;

        if ledger.banned.contains(username) {
            return Disposition::Blocked;
        }

        if !self.is_violation(classification) {
            return Disposition::Allowed {
                username: username.to_string(),
                text: text.to_string(),
            };
        }

        let record = ledger.warnings.entry(username.to_string()).or_default();
        record.count += 1;
        let previous_violation = record.last_violation.replace(Utc::now());
        let warning_count = record.count;

        if warning_count >= self.config.ban_threshold {
            ledger.banned.insert(username.to_string());
            tracing::info!(
                user = %username,
                warning_count,
                previous_violation = ?previous_violation,
                "User banned"
            );

            Disposition::Banned {
                username: username.to_string(),
                warning_count,
            }
        } else {
            tracing::info!(
                user = %username,
                warning_count,
                ban_threshold = self.config.ban_threshold,
                previous_violation = ?previous_violation,
                "User warned"
            );

            Disposition::Warned {
                warning_count,
                ban_threshold: self.config.ban_threshold,
                text: text.to_string(),
            }
        }
    }

    pub async fn is_banned(&self, username: &str) -> bool {
        self.ledger.lock().await.banned.contains(username)
    }

    /// Current warnings and ban status for a user.
    pub async fn standing(&self, username: &str) -> UserStanding {
        let ledger = self.ledger.lock().await;
        let record = ledger.warnings.get(username);

        UserStanding {
            warnings: record.map(|r| r.count).unwrap_or(0),
            banned: ledger.banned.contains(username),
            last_violation: record.and_then(|r| r.last_violation),
        }
    }

    async fn classify_bounded(&self, text: &str) -> Result<Vec<LabelScore>, ClassifierError> {
        let timeout = self.config.classifier_timeout;

        let classification = match tokio::time::timeout(timeout, self.classifier.classify(text))
            .await
        {
            Ok(result) => result?,
            Err(_) => return Err(ClassifierError::Timeout(timeout)),
        };

        if classification.is_empty() {
            return Err(ClassifierError::EmptyResult);
        }

        Ok(classification)
    }

    /// Only the highest-scoring label counts. Ties pick whichever entry
    /// `max_by` settles on.
    fn is_violation(&self, classification: &[LabelScore]) -> bool {
        let top = classification
            .iter()
            .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal));

        match top {
            Some(top) => {
                top.label.eq_ignore_ascii_case(&self.config.toxic_label)
                    && top.score > self.config.toxicity_threshold
            }
            None => false,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
