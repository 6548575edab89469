//! Online training around the arm bank.
//!
//! - **OnlineTrainer**: buffers feedback, flushes in bounded batches
//! - **ModelPersister**: writes bank snapshots off the request path

pub mod persister;
pub mod trainer;

pub use persister::ModelPersister;
pub use trainer::{OnlineTrainer, SharedBank};
