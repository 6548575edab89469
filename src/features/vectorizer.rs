//! Context vector construction.
//!
//! Layout of a context vector of dimension `d = 3 + item_dim`:
//!
//! | block | width | values |
//! |-------|-------|--------|
//! | user  | 3     | `like_rate`, `activity`, bias `1.0` |
//! | item  | 3     | `norm_rating`, `norm_popularity`, `genre_match` |
//! | categories | `|top_categories|` | multi-hot |
//! | authors    | `|top_authors|`    | multi-hot |
//! | publishers | `|top_publishers|` | multi-hot |
//!
//! Nothing here fails: missing aggregates produce the documented default
//! sub-vectors.

use crate::features::source::FeatureSource;
use crate::features::top_n::{normalize_key, CategoricalIndex, TopCategoricals};
use crate::types::{ArmId, ContextVector, ItemAttributes, UserEngagement, UserId};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

/// Width of the user sub-vector
pub const USER_DIM: usize = 3;

/// Width of the dense part of the item sub-vector
pub const ITEM_BASE_DIM: usize = 3;

/// Event count at which `activity` saturates at 1.0
const ACTIVITY_SATURATION: f64 = 50.0;

/// Rating count mapped to `norm_popularity = 1.0`
const POPULARITY_REF_MAX: f64 = 1000.0;

/// User sub-vector when there is no engagement signal
pub const DEFAULT_USER_FEATURES: [f64; USER_DIM] = [0.5, 0.0, 1.0];

/// Deterministic `(user, item)` -> context vector mapping
#[derive(Debug, Clone)]
pub struct ContextVectorizer {
    categories: CategoricalIndex,
    authors: CategoricalIndex,
    publishers: CategoricalIndex,
    version: Option<String>,
}

impl ContextVectorizer {
    pub fn new(top: &TopCategoricals) -> Self {
        Self {
            categories: CategoricalIndex::new(&top.top_categories),
            authors: CategoricalIndex::new(&top.top_authors),
            publishers: CategoricalIndex::new(&top.top_publishers),
            version: top.version.clone(),
        }
    }

    /// Build from the top-N artifact on disk (empty tables if it is missing)
    pub fn from_artifact(path: &Path) -> Self {
        Self::new(&TopCategoricals::load_or_default(path))
    }

    /// Version tag of the top-N artifact, if it carried one
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn user_dim(&self) -> usize {
        USER_DIM
    }

    pub fn item_dim(&self) -> usize {
        ITEM_BASE_DIM + self.categories.width() + self.authors.width() + self.publishers.width()
    }

    /// Full context dimension `d`
    pub fn dim(&self) -> usize {
        self.user_dim() + self.item_dim()
    }

    /// `[like_rate, activity, 1.0]`
    pub fn user_features(&self, engagement: Option<&UserEngagement>) -> Vec<f64> {
        let Some(engagement) = engagement else {
            return DEFAULT_USER_FEATURES.to_vec();
        };
        if engagement.total_events == 0 {
            return DEFAULT_USER_FEATURES.to_vec();
        }

        let rated = engagement.likes + engagement.dislikes;
        let like_rate = if rated == 0 {
            0.5
        } else {
            engagement.likes as f64 / rated as f64
        };
        let activity = (engagement.total_events as f64 / ACTIVITY_SATURATION).min(1.0);

        vec![like_rate, activity, 1.0]
    }

    /// `[norm_rating, norm_popularity, genre_match, categories.., authors.., publishers..]`
    ///
    /// `preferred_genres = None` means the caller has no preference set.
    pub fn item_features(
        &self,
        item: Option<&ItemAttributes>,
        preferred_genres: Option<&[String]>,
    ) -> Vec<f64> {
        let Some(item) = item else {
            return vec![0.0; self.item_dim()];
        };

        // clamp passes NaN through, so a non-finite rating counts as missing
        let rating = item.avg_rating.filter(|r| r.is_finite()).unwrap_or(0.0);
        let norm_rating = (rating / 5.0).clamp(0.0, 1.0);
        let norm_popularity =
            ((item.ratings_count as f64).ln_1p() / POPULARITY_REF_MAX.ln_1p()).clamp(0.0, 1.0);
        let genre_match = genre_match(&item.categories, preferred_genres);

        let mut features = Vec::with_capacity(self.item_dim());
        features.extend([norm_rating, norm_popularity, genre_match]);
        features.extend(
            self.categories
                .encode(item.categories.iter().map(String::as_str)),
        );
        features.extend(self.authors.encode(item.authors.iter().map(String::as_str)));
        features.extend(self.publishers.encode(item.publisher.as_deref()));
        features
    }

    /// Concatenate sub-vectors and force the result to length `d`
    ///
    /// Short vectors are right-padded with zeros; long ones are truncated,
    /// which drops trailing features.
    pub fn combine(&self, user: &[f64], item: &[f64]) -> ContextVector {
        let d = self.dim();
        let mut context: ContextVector = user.iter().chain(item).copied().collect();

        if context.len() != d {
            debug!(
                "Context length {} differs from d={}, {}",
                context.len(),
                d,
                if context.len() < d { "padding" } else { "truncating" }
            );
            context.resize(d, 0.0);
        }
        context
    }

    /// Context vector from already-fetched aggregates
    pub fn context(
        &self,
        engagement: Option<&UserEngagement>,
        item: Option<&ItemAttributes>,
        preferred_genres: Option<&[String]>,
    ) -> ContextVector {
        let user = self.user_features(engagement);
        let item = self.item_features(item, preferred_genres);
        self.combine(&user, &item)
    }

    /// Context vector for `(user_id, item_id)`, fetching aggregates from `source`
    ///
    /// Source failures are logged and treated as missing data.
    pub async fn context_for<S>(
        &self,
        source: &S,
        user_id: UserId,
        item_id: ArmId,
        preferred_genres: Option<&[String]>,
    ) -> ContextVector
    where
        S: FeatureSource + ?Sized,
    {
        let engagement = match source.user_engagement(user_id).await {
            Ok(engagement) => engagement,
            Err(e) => {
                warn!("Engagement lookup for user {} failed: {}", user_id, e);
                None
            }
        };
        let item = match source.item_attributes(item_id).await {
            Ok(item) => item,
            Err(e) => {
                warn!("Attribute lookup for item {} failed: {}", item_id, e);
                None
            }
        };

        self.context(engagement.as_ref(), item.as_ref(), preferred_genres)
    }
}

/// 1.0 on any overlap, 0.0 when a non-empty preference set misses every
/// category, 0.5 when there is no usable preference set
fn genre_match(categories: &[String], preferred_genres: Option<&[String]>) -> f64 {
    let prefs: HashSet<String> = match preferred_genres {
        Some(prefs) => prefs.iter().map(|g| normalize_key(g)).collect(),
        None => return 0.5,
    };
    if prefs.is_empty() {
        return 0.5;
    }

    let overlaps = categories
        .iter()
        .any(|c| prefs.contains(&normalize_key(c)));
    if overlaps {
        1.0
    } else {
        0.0
    }
}
