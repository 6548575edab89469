//! Where engagement and item aggregates come from.
//!
//! The relational store behind the recommender implements `FeatureSource`;
//! the core never talks to a database directly.

use crate::error::Result;
use crate::types::{ArmId, ItemAttributes, UserEngagement, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Provider of the aggregates the context vectorizer needs
#[async_trait]
pub trait FeatureSource: Send + Sync {
    /// Like/dislike/total event counts for a user, `None` if the user is unknown
    async fn user_engagement(&self, user_id: UserId) -> Result<Option<UserEngagement>>;

    /// Rating and categorical attributes of an item, `None` if the item is unknown
    async fn item_attributes(&self, item_id: ArmId) -> Result<Option<ItemAttributes>>;
}

/// Map-backed source, loadable from a JSON fixture
///
/// ```json
/// {"users": {"1": {"likes": 3, "dislikes": 1, "total_events": 6}},
///  "items": {"10": {"avg_rating": 4.1, "ratings_count": 250, "categories": ["fantasy"]}}}
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryFeatureSource {
    #[serde(default)]
    users: HashMap<UserId, UserEngagement>,
    #[serde(default)]
    items: HashMap<ArmId, ItemAttributes>,
}

impl InMemoryFeatureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn with_user(mut self, user_id: UserId, engagement: UserEngagement) -> Self {
        self.users.insert(user_id, engagement);
        self
    }

    pub fn with_item(mut self, item_id: ArmId, attributes: ItemAttributes) -> Self {
        self.items.insert(item_id, attributes);
        self
    }

    /// Item ids in ascending order
    pub fn item_ids(&self) -> Vec<ArmId> {
        let mut ids: Vec<ArmId> = self.items.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

#[async_trait]
impl FeatureSource for InMemoryFeatureSource {
    async fn user_engagement(&self, user_id: UserId) -> Result<Option<UserEngagement>> {
        Ok(self.users.get(&user_id).copied())
    }

    async fn item_attributes(&self, item_id: ArmId) -> Result<Option<ItemAttributes>> {
        Ok(self.items.get(&item_id).cloned())
    }
}
