//! Process-wide recommender handle.
//!
//! A `RuntimeCoordinator` owns the catalog index, the vectorizer (which fixes
//! `d`), the shared arm bank and the online trainer. It is built explicitly
//! with [`RuntimeCoordinator::init`] and handed to whatever layer serves
//! requests, typically behind an `Arc`. Scoring and feedback take `&self`;
//! catalog reconciliation takes `&mut self`, so it can never overlap with
//! in-flight requests.

use crate::bandit::{LinearArmBank, LoadOutcome};
use crate::config::RecommenderConfig;
use crate::error::{BanditError, Result};
use crate::features::{ContextVectorizer, FeatureSource};
use crate::training::{ModelPersister, OnlineTrainer, SharedBank};
use crate::types::{ArmId, ContextVector, FeedbackKind, UserId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct RuntimeCoordinator {
    config: RecommenderConfig,
    catalog: Vec<ArmId>,
    index: HashMap<ArmId, usize>,
    vectorizer: ContextVectorizer,
    bank: SharedBank,
    trainer: OnlineTrainer,
    load_outcome: LoadOutcome,
}

impl RuntimeCoordinator {
    /// Build everything from the catalog and restore the persisted bank
    ///
    /// Catalog order assigns arm indices; a repeated id keeps its first index.
    /// Must be called from within a Tokio runtime (the persistence worker is
    /// spawned here).
    pub async fn init(config: RecommenderConfig, catalog: &[ArmId]) -> Result<Self> {
        config.validate()?;

        let mut ids = Vec::with_capacity(catalog.len());
        let mut index = HashMap::with_capacity(catalog.len());
        for &arm_id in catalog {
            if !index.contains_key(&arm_id) {
                index.insert(arm_id, ids.len());
                ids.push(arm_id);
            }
        }
        if ids.len() < catalog.len() {
            debug!(
                "Catalog had {} duplicate ids, keeping first occurrences",
                catalog.len() - ids.len()
            );
        }

        let vectorizer = ContextVectorizer::from_artifact(&config.item_config_path);
        let d = vectorizer.dim();

        let mut bank = LinearArmBank::new(d, config.alpha);
        let load_outcome = match bank.load(&config.model_path, &ids, d) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    "Could not read model state at {}: {}. Starting cold",
                    config.model_path.display(),
                    e
                );
                bank.reconcile_arms(&ids);
                LoadOutcome::ColdStart
            }
        };

        let bank: SharedBank = Arc::new(Mutex::new(bank));
        let persister = ModelPersister::spawn(config.model_path.clone());
        let trainer = OnlineTrainer::new(Arc::clone(&bank), config.batch_size, Some(persister))?;

        info!(
            "Recommender ready: {} arms, d={}, alpha={}, batch_size={}",
            ids.len(),
            d,
            config.alpha,
            config.batch_size
        );

        Ok(Self {
            config,
            catalog: ids,
            index,
            vectorizer,
            bank,
            trainer,
            load_outcome,
        })
    }

    /// Rebuild against a new catalog, keeping what has been learned
    ///
    /// Pending feedback is applied and the bank is written to the model path
    /// before state is reloaded, so arms that stay in the catalog keep their
    /// parameters. If that write fails the coordinator is left untouched.
    pub async fn reconcile(&mut self, catalog: &[ArmId]) -> Result<LoadOutcome> {
        self.trainer.flush();
        self.trainer.wait_for_persistence().await?;

        let state = self.bank.lock().to_state();
        let path = self.config.model_path.clone();
        tokio::task::spawn_blocking(move || state.write_to(&path))
            .await
            .map_err(|e| BanditError::Persistence(format!("model write task failed: {}", e)))??;

        *self = Self::init(self.config.clone(), catalog).await?;
        Ok(self.load_outcome.clone())
    }

    /// Rank `candidates` (with one context each) and return the top `k` ids
    pub fn recommend<X: AsRef<[f64]>>(
        &self,
        candidates: &[ArmId],
        contexts: &[X],
        k: usize,
    ) -> Result<Vec<ArmId>> {
        self.bank.lock().recommend(candidates, contexts, k)
    }

    /// Record an observed reward. Returns `true` if it triggered a flush.
    pub fn record_feedback(
        &self,
        context: ContextVector,
        arm_id: ArmId,
        reward: f64,
    ) -> Result<bool> {
        if !self.index.contains_key(&arm_id) {
            debug!("Feedback for arm {} outside the current catalog", arm_id);
        }
        self.trainer.add_feedback(context, arm_id, reward)
    }

    /// Record a like/dislike
    pub fn record_feedback_kind(
        &self,
        context: ContextVector,
        arm_id: ArmId,
        kind: FeedbackKind,
    ) -> Result<bool> {
        self.record_feedback(context, arm_id, kind.reward())
    }

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
        self.vectorizer
            .context_for(source, user_id, item_id, preferred_genres)
            .await
    }

    /// Build a context for every candidate from `source`, then rank
    pub async fn recommend_for_user<S>(
        &self,
        source: &S,
        user_id: UserId,
        candidates: &[ArmId],
        k: usize,
        preferred_genres: Option<&[String]>,
    ) -> Result<Vec<ArmId>>
    where
        S: FeatureSource + ?Sized,
    {
        let mut contexts = Vec::with_capacity(candidates.len());
        for &item_id in candidates {
            contexts.push(
                self.context_for(source, user_id, item_id, preferred_genres)
                    .await,
            );
        }
        self.recommend(candidates, &contexts, k)
    }

    /// Position of `arm_id` in the catalog
    pub fn arm_index(&self, arm_id: ArmId) -> Option<usize> {
        self.index.get(&arm_id).copied()
    }

    pub fn catalog(&self) -> &[ArmId] {
        &self.catalog
    }

    pub fn dim(&self) -> usize {
        self.vectorizer.dim()
    }

    pub fn vectorizer(&self) -> &ContextVectorizer {
        &self.vectorizer
    }

    pub fn config(&self) -> &RecommenderConfig {
        &self.config
    }

    pub fn bank(&self) -> &SharedBank {
        &self.bank
    }

    /// What `init` found on disk
    pub fn load_outcome(&self) -> &LoadOutcome {
        &self.load_outcome
    }

    pub fn pending_feedback(&self) -> usize {
        self.trainer.pending()
    }

    /// Apply buffered feedback and wait until the model file reflects it
    pub async fn shutdown(&self) -> Result<()> {
        let applied = self.trainer.flush();
        if applied > 0 {
            debug!("Applied {} buffered samples on shutdown", applied);
        }
        self.trainer.wait_for_persistence().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::InMemoryFeatureSource;
    use crate::types::{ItemAttributes, UserEngagement};
    use tempfile::TempDir;

    fn config_in(temp: &TempDir, batch_size: usize) -> RecommenderConfig {
        RecommenderConfig {
            alpha: 1.0,
            batch_size,
            model_path: temp.path().join("models").join("linucb_model.json"),
            item_config_path: temp.path().join("item_config.json"),
        }
    }

    fn write_top_n(temp: &TempDir, categories: &[&str]) {
        let artifact = serde_json::json!({
            "top_categories": categories,
            "top_authors": ["a1"],
            "top_publishers": [],
        });
        std::fs::write(temp.path().join("item_config.json"), artifact.to_string()).unwrap();
    }

    #[tokio::test]
    async fn test_init_indexes_catalog_in_order() {
        let temp = TempDir::new().unwrap();
        let coordinator = RuntimeCoordinator::init(config_in(&temp, 5), &[30, 10, 20, 10])
            .await
            .unwrap();

        assert_eq!(coordinator.catalog(), &[30, 10, 20]);
        assert_eq!(coordinator.arm_index(30), Some(0));
        assert_eq!(coordinator.arm_index(10), Some(1));
        assert_eq!(coordinator.arm_index(20), Some(2));
        assert_eq!(coordinator.arm_index(99), None);
        assert_eq!(coordinator.load_outcome(), &LoadOutcome::ColdStart);
        assert_eq!(coordinator.bank().lock().arm_ids(), vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn test_dimension_follows_top_n_artifact() {
        let temp = TempDir::new().unwrap();
        let coordinator = RuntimeCoordinator::init(config_in(&temp, 5), &[1])
            .await
            .unwrap();
        assert_eq!(coordinator.dim(), 6);

        write_top_n(&temp, &["fantasy", "history"]);
        let coordinator = RuntimeCoordinator::init(config_in(&temp, 5), &[1])
            .await
            .unwrap();
        assert_eq!(coordinator.dim(), 9);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let temp = TempDir::new().unwrap();
        let mut config = config_in(&temp, 5);
        config.batch_size = 0;
        assert!(RuntimeCoordinator::init(config, &[1]).await.is_err());
    }

    #[tokio::test]
    async fn test_feedback_flushes_and_persists() {
        let temp = TempDir::new().unwrap();
        let coordinator = RuntimeCoordinator::init(config_in(&temp, 2), &[1, 2])
            .await
            .unwrap();
        let context = vec![1.0, 0.0, 1.0, 0.5, 0.5, 0.5];

        assert!(!coordinator
            .record_feedback_kind(context.clone(), 1, FeedbackKind::Like)
            .unwrap());
        assert_eq!(coordinator.pending_feedback(), 1);
        assert!(coordinator
            .record_feedback_kind(context, 2, FeedbackKind::Dislike)
            .unwrap());
        assert_eq!(coordinator.pending_feedback(), 0);

        coordinator.shutdown().await.unwrap();
        assert!(coordinator.config().model_path.exists());
    }

    #[tokio::test]
    async fn test_wrong_length_feedback_is_rejected() {
        let temp = TempDir::new().unwrap();
        let coordinator = RuntimeCoordinator::init(config_in(&temp, 1), &[1])
            .await
            .unwrap();
        assert!(coordinator.record_feedback(vec![1.0], 1, 1.0).is_err());
        assert_eq!(coordinator.pending_feedback(), 0);
    }

    #[tokio::test]
    async fn test_reconcile_keeps_learned_arms() {
        let temp = TempDir::new().unwrap();
        let mut coordinator = RuntimeCoordinator::init(config_in(&temp, 10), &[1, 2])
            .await
            .unwrap();
        coordinator
            .record_feedback(vec![1.0, 0.0, 1.0, 0.5, 0.5, 0.5], 1, 1.0)
            .unwrap();

        let outcome = coordinator.reconcile(&[1, 3]).await.unwrap();
        assert_eq!(
            outcome,
            LoadOutcome::Restored {
                arms: 2,
                added: 1,
                dropped: 1
            }
        );
        assert_eq!(coordinator.catalog(), &[1, 3]);

        let bank = coordinator.bank().lock();
        assert!(!bank.arm(1).unwrap().is_untrained());
        assert!(bank.arm(3).unwrap().is_untrained());
        assert!(!bank.contains(2));
    }

    #[tokio::test]
    async fn test_recommend_for_user_prefers_liked_profile() {
        let temp = TempDir::new().unwrap();
        write_top_n(&temp, &["fantasy", "history"]);
        let coordinator = RuntimeCoordinator::init(config_in(&temp, 1), &[10, 20])
            .await
            .unwrap();

        let source = InMemoryFeatureSource::new()
            .with_user(
                7,
                UserEngagement {
                    likes: 4,
                    dislikes: 1,
                    total_events: 10,
                },
            )
            .with_item(
                10,
                ItemAttributes {
                    avg_rating: Some(4.5),
                    ratings_count: 300,
                    categories: vec!["fantasy".to_string()],
                    ..Default::default()
                },
            )
            .with_item(
                20,
                ItemAttributes {
                    avg_rating: Some(3.0),
                    ratings_count: 20,
                    categories: vec!["history".to_string()],
                    ..Default::default()
                },
            );

        for _ in 0..5 {
            let liked = coordinator.context_for(&source, 7, 10, None).await;
            coordinator.record_feedback(liked, 10, 1.0).unwrap();
            let disliked = coordinator.context_for(&source, 7, 20, None).await;
            coordinator.record_feedback(disliked, 20, 0.0).unwrap();
        }

        let ranked = coordinator
            .recommend_for_user(&source, 7, &[20, 10], 2, None)
            .await
            .unwrap();
        assert_eq!(ranked, vec![10, 20]);
        coordinator.shutdown().await.unwrap();
    }
}
