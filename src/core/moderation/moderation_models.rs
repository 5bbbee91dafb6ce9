// Moderation domain models - data structures for the toxicity policy.
//
// These are pure domain types with no transport dependencies.
// The router converts dispositions into outbound chat events.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Label the classifier uses for harmful content (compared case-insensitively).
pub const TOXIC_LABEL: &str = "toxic";

/// A message is a violation when its top score is strictly above this.
pub const TOXICITY_THRESHOLD: f64 = 0.5;

/// Warnings at which a user is banned.
pub const BAN_THRESHOLD: u32 = 3;

pub const DEFAULT_CLASSIFIER_TIMEOUT_SECS: u64 = 10;

/// What happens to a single message after moderation.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// Clean message - broadcast to the whole room
    Allowed { username: String, text: String },
    /// Violation below the ban threshold - only the sender hears about it
    Warned {
        warning_count: u32,
        ban_threshold: u32,
        text: String,
    },
    /// This violation pushed the user over the ban threshold
    Banned { username: String, warning_count: u32 },
    /// User was already banned; the message was never classified
    Blocked,
}

/// Tunables for the moderation policy.
#[derive(Debug, Clone)]
pub struct ModerationConfig {
    pub toxic_label: String,
    pub toxicity_threshold: f64,
    pub ban_threshold: u32,
    /// Upper bound on a single classifier call
    pub classifier_timeout: Duration,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            toxic_label: TOXIC_LABEL.to_string(),
            toxicity_threshold: TOXICITY_THRESHOLD,
            ban_threshold: BAN_THRESHOLD,
            classifier_timeout: Duration::from_secs(DEFAULT_CLASSIFIER_TIMEOUT_SECS),
        }
    }
}

/// Read-only view of one user's moderation record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserStanding {
    pub warnings: u32,
    pub banned: bool,
    pub last_violation: Option<DateTime<Utc>>,
}
