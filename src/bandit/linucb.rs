//! Disjoint LinUCB over a bank of per-arm linear models.
//!
//! Every arm owns an independent ridge regression (`ArmState`). Scoring uses
//! the upper confidence bound `θ·x + alpha * sqrt(xᵀ·Ainv·x)`, where `alpha`
//! trades exploiting the current reward estimate against exploring arms whose
//! estimate is still uncertain for this context.
//!
//! Arms are created lazily the first time an id is scored or updated, and are
//! reconciled against the catalog when state is loaded from disk.

use crate::bandit::arm::ArmState;
use crate::bandit::state::{PersistedArm, PersistedBankState};
use crate::error::{BanditError, Result};
use crate::types::{ArmId, FeedbackSample};
use ndarray::ArrayView1;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

/// What `LinearArmBank::load` found on disk
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// No model file yet; every valid arm starts from the prior
    ColdStart,

    /// Persisted arms restored and reconciled against the catalog
    Restored {
        arms: usize,
        added: usize,
        dropped: usize,
    },

    /// File was written with another feature dimension and was ignored
    DimensionMismatch { found: usize, expected: usize },

    /// File could not be parsed or had inconsistent shapes and was ignored
    Corrupt(String),
}

/// Bank of per-arm ridge-regression models
#[derive(Debug, Clone)]
pub struct LinearArmBank {
    d: usize,
    alpha: f64,
    arms: HashMap<ArmId, ArmState>,
}

impl LinearArmBank {
    /// Create an empty bank for contexts of dimension `d`
    pub fn new(d: usize, alpha: f64) -> Self {
        Self {
            d,
            alpha,
            arms: HashMap::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.d
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Number of arms currently held
    pub fn len(&self) -> usize {
        self.arms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arms.is_empty()
    }

    pub fn contains(&self, arm_id: ArmId) -> bool {
        self.arms.contains_key(&arm_id)
    }

    pub fn arm(&self, arm_id: ArmId) -> Option<&ArmState> {
        self.arms.get(&arm_id)
    }

    /// Arm ids in ascending order
    pub fn arm_ids(&self) -> Vec<ArmId> {
        let mut ids: Vec<ArmId> = self.arms.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn ensure_arm(&mut self, arm_id: ArmId) -> &mut ArmState {
        let d = self.d;
        self.arms.entry(arm_id).or_insert_with(|| {
            debug!("Initializing arm {} with identity prior", arm_id);
            ArmState::new(d)
        })
    }

    /// UCB score of one arm for one context, initializing the arm if unseen
    pub fn score(&mut self, arm_id: ArmId, context: &[f64]) -> Result<f64> {
        check_context(self.d, context)?;
        let alpha = self.alpha;
        Ok(self.ensure_arm(arm_id).ucb(ArrayView1::from(context), alpha))
    }

    /// Rank candidates by UCB score and return the top `min(k, len)` ids
    ///
    /// `contexts[i]` is the context for `candidates[i]`. Ties keep candidate
    /// input order.
    pub fn recommend<X: AsRef<[f64]>>(
        &mut self,
        candidates: &[ArmId],
        contexts: &[X],
        k: usize,
    ) -> Result<Vec<ArmId>> {
        if candidates.len() != contexts.len() {
            return Err(BanditError::InvalidInput(format!(
                "{} candidates but {} contexts",
                candidates.len(),
                contexts.len()
            )));
        }
        for context in contexts {
            check_context(self.d, context.as_ref())?;
        }

        let alpha = self.alpha;
        let scores: Vec<f64> = candidates
            .iter()
            .zip(contexts)
            .map(|(&arm_id, context)| {
                self.ensure_arm(arm_id)
                    .ucb(ArrayView1::from(context.as_ref()), alpha)
            })
            .collect();

        let mut order: Vec<usize> = (0..candidates.len()).collect();
        // sort_by is stable, so equal scores stay in input order
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

        let ranked: Vec<ArmId> = order
            .into_iter()
            .take(k.min(candidates.len()))
            .map(|i| candidates[i])
            .collect();

        debug!(
            "Ranked {} candidates, returning {}",
            candidates.len(),
            ranked.len()
        );
        Ok(ranked)
    }

    /// Apply one observed reward to `arm_id`
    pub fn update(&mut self, context: &[f64], arm_id: ArmId, reward: f64) -> Result<()> {
        check_sample(self.d, context, reward)?;
        self.ensure_arm(arm_id)
            .update(ArrayView1::from(context), reward);
        Ok(())
    }

    /// Apply samples in order. Nothing is applied unless every sample is valid.
    pub fn batch_update(&mut self, samples: &[FeedbackSample]) -> Result<usize> {
        for sample in samples {
            check_sample(self.d, &sample.context, sample.reward)?;
        }
        for sample in samples {
            self.ensure_arm(sample.arm_id)
                .update(ArrayView1::from(sample.context.as_slice()), sample.reward);
        }
        Ok(samples.len())
    }

    /// Make the arm set equal to `valid_arm_ids`: add missing arms at the
    /// prior, drop arms outside the catalog. Returns `(added, dropped)`.
    pub fn reconcile_arms(&mut self, valid_arm_ids: &[ArmId]) -> (usize, usize) {
        let valid: HashSet<ArmId> = valid_arm_ids.iter().copied().collect();

        let before = self.arms.len();
        self.arms.retain(|arm_id, _| valid.contains(arm_id));
        let dropped = before - self.arms.len();

        let mut added = 0;
        for &arm_id in &valid {
            if !self.arms.contains_key(&arm_id) {
                self.arms.insert(arm_id, ArmState::new(self.d));
                added += 1;
            }
        }

        (added, dropped)
    }

    /// Discard everything and start every valid arm from the prior
    fn reset_arms(&mut self, valid_arm_ids: &[ArmId]) {
        self.arms.clear();
        for &arm_id in valid_arm_ids {
            self.arms.insert(arm_id, ArmState::new(self.d));
        }
    }

    /// Snapshot the full bank
    pub fn to_state(&self) -> PersistedBankState {
        PersistedBankState {
            d: self.d,
            alpha: self.alpha,
            arms: self
                .arms
                .iter()
                .map(|(&arm_id, arm)| (arm_id, PersistedArm::from_arm(arm)))
                .collect(),
        }
    }

    /// Rebuild a bank from a snapshot, rejecting any arm whose shape disagrees with `d`
    pub fn from_state(state: &PersistedBankState) -> Result<Self> {
        let mut arms = HashMap::with_capacity(state.arms.len());
        for (&arm_id, persisted) in &state.arms {
            arms.insert(arm_id, persisted.to_arm(state.d)?);
        }
        Ok(Self {
            d: state.d,
            alpha: state.alpha,
            arms,
        })
    }

    /// Write the bank to `path` (atomic replace)
    pub fn save(&self, path: &Path) -> Result<()> {
        self.to_state().write_to(path)
    }

    /// Load persisted arms from `path` and reconcile them with the catalog
    ///
    /// A missing file is a cold start. A file whose `d` differs from
    /// `d_expected`, or that cannot be parsed, is ignored and every valid arm
    /// starts from the prior. I/O failures other than "not found" are returned.
    pub fn load(
        &mut self,
        path: &Path,
        valid_arm_ids: &[ArmId],
        d_expected: usize,
    ) -> Result<LoadOutcome> {
        if d_expected != self.d {
            return Err(BanditError::DimensionMismatch {
                expected: self.d,
                actual: d_expected,
            });
        }

        let state = match PersistedBankState::read_from(path) {
            Ok(Some(state)) => state,
            Ok(None) => {
                info!(
                    "No model state at {}, cold start with {} arms",
                    path.display(),
                    valid_arm_ids.len()
                );
                self.reset_arms(valid_arm_ids);
                return Ok(LoadOutcome::ColdStart);
            }
            Err(BanditError::Serialization(e)) => {
                warn!("Ignoring unreadable model state at {}: {}", path.display(), e);
                self.reset_arms(valid_arm_ids);
                return Ok(LoadOutcome::Corrupt(e.to_string()));
            }
            Err(e) => return Err(e),
        };

        if state.d != d_expected {
            warn!(
                "Model state at {} has d={} but d={} is expected, discarding it",
                path.display(),
                state.d,
                d_expected
            );
            self.reset_arms(valid_arm_ids);
            return Ok(LoadOutcome::DimensionMismatch {
                found: state.d,
                expected: d_expected,
            });
        }

        let loaded = match Self::from_state(&state) {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!("Ignoring inconsistent model state at {}: {}", path.display(), e);
                self.reset_arms(valid_arm_ids);
                return Ok(LoadOutcome::Corrupt(e.to_string()));
            }
        };

        if (state.alpha - self.alpha).abs() > f64::EPSILON {
            debug!(
                "Persisted alpha {} differs from configured {}, keeping configured value",
                state.alpha, self.alpha
            );
        }

        self.arms = loaded.arms;
        let (added, dropped) = self.reconcile_arms(valid_arm_ids);
        info!(
            "Restored {} arms from {} ({} added, {} dropped)",
            self.arms.len(),
            path.display(),
            added,
            dropped
        );

        Ok(LoadOutcome::Restored {
            arms: self.arms.len(),
            added,
            dropped,
        })
    }
}

/// Reject contexts of the wrong length or with non-finite entries
pub fn check_context(d: usize, context: &[f64]) -> Result<()> {
    if context.len() != d {
        return Err(BanditError::DimensionMismatch {
            expected: d,
            actual: context.len(),
        });
    }
    if context.iter().any(|v| !v.is_finite()) {
        return Err(BanditError::InvalidInput(
            "context contains non-finite values".to_string(),
        ));
    }
    Ok(())
}

/// `check_context` plus a finite reward
pub fn check_sample(d: usize, context: &[f64], reward: f64) -> Result<()> {
    check_context(d, context)?;
    if !reward.is_finite() {
        return Err(BanditError::InvalidInput(format!(
            "reward must be finite (got {})",
            reward
        )));
    }
    Ok(())
}
