//! Core data types for the bandit recommender
//!
//! Arms are catalog items identified by integer ids. A context vector is the
//! numeric encoding of a (user, item) pair; feedback couples a context with
//! the arm it was shown for and the observed reward.

use serde::{Deserialize, Serialize};

/// Identifier of a recommendable item (the bandit's unit of choice)
pub type ArmId = i64;

/// Identifier of a user as known to the event store
pub type UserId = i64;

/// Fixed-length feature encoding of a (user, item) pair
pub type ContextVector = Vec<f64>;

/// One observed outcome, immutable once buffered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackSample {
    pub context: ContextVector,
    pub arm_id: ArmId,
    pub reward: f64,
}

impl FeedbackSample {
    pub fn new(context: ContextVector, arm_id: ArmId, reward: f64) -> Self {
        Self {
            context,
            arm_id,
            reward,
        }
    }
}

/// Explicit user reaction to a recommended item
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    Like,
    Dislike,
}

impl FeedbackKind {
    /// Reward fed to the bandit for this reaction
    pub fn reward(self) -> f64 {
        match self {
            FeedbackKind::Like => 1.0,
            FeedbackKind::Dislike => 0.0,
        }
    }
}

impl std::fmt::Display for FeedbackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedbackKind::Like => write!(f, "like"),
            FeedbackKind::Dislike => write!(f, "dislike"),
        }
    }
}

/// Per-user engagement aggregates supplied by the event store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEngagement {
    pub likes: u64,
    pub dislikes: u64,
    /// All recorded events, including ones that are neither like nor dislike
    pub total_events: u64,
}

/// Item attributes supplied by the catalog store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemAttributes {
    pub avg_rating: Option<f64>,
    #[serde(default)]
    pub ratings_count: u64,
    /// Category keys, used both for genre matching and the category block
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub publisher: Option<String>,
}
