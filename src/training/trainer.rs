//! Online mini-batch training.
//!
//! Feedback is buffered and applied to the shared bank in batches of
//! `batch_size`. After every flush a snapshot of the bank is handed to the
//! persistence worker; callers never wait on disk.
//!
//! Lock order is buffer, then bank. The buffer lock is held for the whole
//! drain-and-apply so two flushes can never interleave.

use crate::bandit::{check_sample, LinearArmBank};
use crate::error::{BanditError, Result};
use crate::training::persister::ModelPersister;
use crate::types::{ArmId, ContextVector, FeedbackSample};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info};

/// The bank shared by scoring and training; one lock guards all of it
pub type SharedBank = Arc<Mutex<LinearArmBank>>;

/// Buffers feedback and flushes it into the bank in batches
pub struct OnlineTrainer {
    bank: SharedBank,
    d: usize,
    batch_size: usize,
    buffer: Mutex<Vec<FeedbackSample>>,
    persister: Option<ModelPersister>,
}

impl OnlineTrainer {
    /// Create a trainer; `persister = None` keeps everything in memory
    pub fn new(
        bank: SharedBank,
        batch_size: usize,
        persister: Option<ModelPersister>,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(BanditError::InvalidInput(
                "batch_size must be at least 1".to_string(),
            ));
        }
        let d = bank.lock().dim();

        Ok(Self {
            bank,
            d,
            batch_size,
            buffer: Mutex::new(Vec::with_capacity(batch_size)),
            persister,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Samples buffered but not yet applied
    pub fn pending(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn bank(&self) -> &SharedBank {
        &self.bank
    }

    /// Buffer one sample, flushing when the buffer reaches `batch_size`
    ///
    /// Invalid samples are rejected here and never enter the buffer.
    /// Returns `true` if this call triggered a flush.
    pub fn add_feedback(&self, context: ContextVector, arm_id: ArmId, reward: f64) -> Result<bool> {
        check_sample(self.d, &context, reward)?;

        let mut buffer = self.buffer.lock();
        buffer.push(FeedbackSample::new(context, arm_id, reward));
        debug!(
            "Buffered feedback for arm {} ({}/{})",
            arm_id,
            buffer.len(),
            self.batch_size
        );

        if buffer.len() >= self.batch_size {
            self.flush_locked(&mut buffer);
            return Ok(true);
        }
        Ok(false)
    }

    /// Apply everything buffered now, regardless of batch size
    ///
    /// Returns the number of samples applied.
    pub fn flush(&self) -> usize {
        let mut buffer = self.buffer.lock();
        self.flush_locked(&mut buffer)
    }

    fn flush_locked(&self, buffer: &mut Vec<FeedbackSample>) -> usize {
        if buffer.is_empty() {
            return 0;
        }
        let samples = std::mem::take(buffer);

        let snapshot = {
            let mut bank = self.bank.lock();
            if let Err(e) = bank.batch_update(&samples) {
                // Samples are validated on the way in, so this means the bank
                // dimension changed underneath us
                error!("Dropping batch of {} samples: {}", samples.len(), e);
                return 0;
            }
            self.persister.as_ref().map(|_| bank.to_state())
        };

        let avg_reward = samples.iter().map(|s| s.reward).sum::<f64>() / samples.len() as f64;
        info!(
            "Model updated with {} samples. Avg reward: {:.3}",
            samples.len(),
            avg_reward
        );

        if let (Some(persister), Some(state)) = (&self.persister, snapshot) {
            persister.submit(state);
        }

        samples.len()
    }

    /// Wait until every snapshot queued so far is on disk
    pub async fn wait_for_persistence(&self) -> Result<()> {
        match &self.persister {
            Some(persister) => persister.wait_idle().await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trainer(batch_size: usize) -> OnlineTrainer {
        let bank = Arc::new(Mutex::new(LinearArmBank::new(3, 1.0)));
        OnlineTrainer::new(bank, batch_size, None).unwrap()
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let bank = Arc::new(Mutex::new(LinearArmBank::new(3, 1.0)));
        assert!(OnlineTrainer::new(bank, 0, None).is_err());
    }

    #[test]
    fn test_flushes_exactly_at_batch_size() {
        let trainer = trainer(3);

        assert!(!trainer.add_feedback(vec![1.0, 0.0, 0.0], 1, 1.0).unwrap());
        assert!(!trainer.add_feedback(vec![0.0, 1.0, 0.0], 2, 0.0).unwrap());
        assert_eq!(trainer.pending(), 2);
        assert!(trainer.bank().lock().is_empty());

        assert!(trainer.add_feedback(vec![0.0, 0.0, 1.0], 3, 1.0).unwrap());
        assert_eq!(trainer.pending(), 0);
        assert_eq!(trainer.bank().lock().arm_ids(), vec![1, 2, 3]);
    }

    #[test]
    fn test_invalid_sample_never_buffered() {
        let trainer = trainer(2);
        assert!(trainer.add_feedback(vec![1.0, 0.0], 1, 1.0).is_err());
        assert!(trainer
            .add_feedback(vec![1.0, 0.0, 0.0], 1, f64::NAN)
            .is_err());
        assert_eq!(trainer.pending(), 0);
    }

    #[test]
    fn test_manual_flush() {
        let trainer = trainer(10);
        assert_eq!(trainer.flush(), 0);

        trainer.add_feedback(vec![1.0, 0.0, 0.0], 7, 1.0).unwrap();
        assert_eq!(trainer.flush(), 1);
        assert_eq!(trainer.pending(), 0);
        assert!(trainer.bank().lock().contains(7));
    }

    #[test]
    fn test_flush_applies_in_buffer_order() {
        let trainer = trainer(3);
        let samples = [
            (vec![0.2, 0.3, 1.0], 5, 1.0),
            (vec![0.9, 0.1, 1.0], 5, 0.0),
            (vec![0.4, 0.4, 1.0], 5, 1.0),
        ];

        let mut expected = LinearArmBank::new(3, 1.0);
        for (context, arm_id, reward) in samples.iter().cloned() {
            expected.update(&context, arm_id, reward).unwrap();
            trainer.add_feedback(context, arm_id, reward).unwrap();
        }

        assert_eq!(trainer.bank().lock().arm(5), expected.arm(5));
    }

    #[tokio::test]
    async fn test_wait_without_persister_is_noop() {
        let trainer = trainer(1);
        trainer.add_feedback(vec![1.0, 0.0, 0.0], 1, 1.0).unwrap();
        trainer.wait_for_persistence().await.unwrap();
    }
}
