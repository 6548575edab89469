//! Background persistence of bank snapshots.
//!
//! Flushes hand a snapshot to a single worker task over an unbounded channel
//! and return immediately. The worker coalesces whatever is queued (only the
//! newest snapshot is written), performs the blocking write on the blocking
//! pool, and logs failures instead of returning them.

use crate::bandit::PersistedBankState;
use crate::error::{BanditError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

enum PersistCommand {
    Save(PersistedBankState),
    /// Answered once every snapshot queued before it has been written
    Barrier(oneshot::Sender<()>),
}

/// Handle to the persistence worker
#[derive(Clone)]
pub struct ModelPersister {
    sender: mpsc::UnboundedSender<PersistCommand>,
    path: Arc<PathBuf>,
}

impl ModelPersister {
    /// Start the worker. Must be called from within a Tokio runtime.
    pub fn spawn(path: PathBuf) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let path = Arc::new(path);
        tokio::spawn(run_worker(Arc::clone(&path), receiver));
        debug!("Model persister started for {}", path.display());
        Self { sender, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue a snapshot for writing. Never blocks.
    pub fn submit(&self, state: PersistedBankState) {
        if self.sender.send(PersistCommand::Save(state)).is_err() {
            error!(
                "Model persister for {} has stopped, snapshot dropped",
                self.path.display()
            );
        }
    }

    /// Wait until every snapshot submitted so far has been written (or failed)
    pub async fn wait_idle(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(PersistCommand::Barrier(tx))
            .map_err(|_| BanditError::Persistence("persistence worker stopped".to_string()))?;
        rx.await
            .map_err(|_| BanditError::Persistence("persistence worker stopped".to_string()))
    }
}

async fn run_worker(path: Arc<PathBuf>, mut receiver: mpsc::UnboundedReceiver<PersistCommand>) {
    while let Some(command) = receiver.recv().await {
        let mut state = match command {
            PersistCommand::Save(state) => state,
            PersistCommand::Barrier(tx) => {
                let _ = tx.send(());
                continue;
            }
        };

        // Last flush wins: skip snapshots superseded while we were busy
        let mut barriers = Vec::new();
        let mut superseded = 0usize;
        while let Ok(next) = receiver.try_recv() {
            match next {
                PersistCommand::Save(newer) => {
                    state = newer;
                    superseded += 1;
                }
                PersistCommand::Barrier(tx) => barriers.push(tx),
            }
        }
        if superseded > 0 {
            debug!("Coalesced {} superseded snapshots", superseded);
        }

        write_state(&path, state).await;

        for tx in barriers {
            let _ = tx.send(());
        }
    }

    debug!("Model persister for {} stopped", path.display());
}

async fn write_state(path: &Arc<PathBuf>, state: PersistedBankState) {
    let target = Arc::clone(path);
    let arms = state.arms.len();

    match tokio::task::spawn_blocking(move || state.write_to(&target)).await {
        Ok(Ok(())) => debug!("Persisted {} arms to {}", arms, path.display()),
        Ok(Err(e)) => error!("Failed to persist model state to {}: {}", path.display(), e),
        Err(e) => error!("Persistence task for {} failed: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn state(alpha: f64) -> PersistedBankState {
        PersistedBankState {
            d: 2,
            alpha,
            arms: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_submit_then_wait_writes_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bank.json");
        let persister = ModelPersister::spawn(path.clone());

        persister.submit(state(1.0));
        persister.wait_idle().await.unwrap();

        let written = PersistedBankState::read_from(&path).unwrap().unwrap();
        assert_eq!(written.alpha, 1.0);
    }

    #[tokio::test]
    async fn test_last_submission_wins() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bank.json");
        let persister = ModelPersister::spawn(path.clone());

        for i in 0..10 {
            persister.submit(state(i as f64));
        }
        persister.wait_idle().await.unwrap();

        let written = PersistedBankState::read_from(&path).unwrap().unwrap();
        assert_eq!(written.alpha, 9.0);
    }

    #[tokio::test]
    async fn test_write_failure_is_logged_not_raised() {
        let temp = TempDir::new().unwrap();
        // A regular file where a directory is expected makes every write fail
        let blocker = temp.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();
        let persister = ModelPersister::spawn(blocker.join("bank.json"));

        persister.submit(state(1.0));
        persister.wait_idle().await.unwrap();

        // The worker survives the failure and keeps serving
        persister.wait_idle().await.unwrap();
    }
}
