//! Bookbandit - contextual-bandit core for book recommendations
//!
//! Ranks candidate books with disjoint LinUCB and learns online from
//! like/dislike feedback:
//! - Per-book ridge-regression arms scored by an upper confidence bound
//! - Deterministic `(user, book)` context vectors from engagement and catalog aggregates
//! - Mini-batch online training with background, atomic model persistence
//! - Catalog reconciliation that keeps learned arms across refreshes
//!
//! # Architecture
//!
//! - **Features**: top-N categorical tables, `FeatureSource`, `ContextVectorizer`
//! - **Bandit**: `ArmState`, `LinearArmBank`, the persisted JSON model format
//! - **Training**: `OnlineTrainer` and the `ModelPersister` worker
//! - **Runtime**: `RuntimeCoordinator`, the explicitly owned handle tying it together
//!
//! # Example
//!
//! ```ignore
//! use bookbandit_core::{RecommenderConfig, RuntimeCoordinator, FeedbackKind};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = RecommenderConfig::default().with_env_overrides()?;
//!     let coordinator = RuntimeCoordinator::init(config, &[101, 102, 103]).await?;
//!
//!     let context = coordinator.context_for(&source, user_id, 101, None).await;
//!     let ranked = coordinator.recommend(&[101], &[context.clone()], 1)?;
//!     coordinator.record_feedback_kind(context, ranked[0], FeedbackKind::Like)?;
//!
//!     coordinator.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod bandit;
pub mod config;
pub mod error;
pub mod features;
pub mod runtime;
pub mod training;
pub mod types;

// Re-export commonly used types
pub use bandit::{ArmState, LinearArmBank, LoadOutcome, PersistedBankState};
pub use config::{ConfigError, RecommenderConfig};
pub use error::{BanditError, Result};
pub use features::{ContextVectorizer, FeatureSource, InMemoryFeatureSource, TopCategoricals};
pub use runtime::RuntimeCoordinator;
pub use training::{ModelPersister, OnlineTrainer, SharedBank};
pub use types::{
    ArmId, ContextVector, FeedbackKind, FeedbackSample, ItemAttributes, UserEngagement, UserId,
};
