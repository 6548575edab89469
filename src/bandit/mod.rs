//! Contextual bandit engine (disjoint LinUCB).
//!
//! - **ArmState**: `(Ainv, b)` ridge-regression state for one arm
//! - **LinearArmBank**: scoring, ranking, incremental updates, load/save
//! - **PersistedBankState**: the JSON model file, the only durable artifact
//!
//! The bank itself is not synchronized; callers share it behind a single
//! lock (see `training::SharedBank`) so reads and writes never interleave.

pub mod arm;
pub mod linucb;
pub mod state;

pub use arm::ArmState;
pub use linucb::{check_context, check_sample, LinearArmBank, LoadOutcome};
pub use state::{PersistedArm, PersistedBankState};
