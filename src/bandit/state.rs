//! On-disk representation of the arm bank.
//!
//! ```json
//! {"d": 3, "alpha": 1.0,
//!  "arms": {"10": {"A_inv": [[1,0,0],[0,1,0],[0,0,1]], "b": [[0],[0],[0]]}}}
//! ```
//!
//! `b` is stored as a column (`d` rows of one element). Writes go through a
//! temporary file in the target directory followed by a rename, so readers
//! only ever observe a complete file.

use crate::bandit::arm::ArmState;
use crate::error::{BanditError, Result};
use crate::types::ArmId;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Serialized form of one arm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedArm {
    #[serde(rename = "A_inv")]
    pub a_inv: Vec<Vec<f64>>,
    pub b: Vec<Vec<f64>>,
}

/// Full durable state of a bank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedBankState {
    pub d: usize,
    pub alpha: f64,
    pub arms: BTreeMap<ArmId, PersistedArm>,
}

impl PersistedArm {
    pub fn from_arm(arm: &ArmState) -> Self {
        Self {
            a_inv: arm.a_inv.rows().into_iter().map(|row| row.to_vec()).collect(),
            b: arm.b.iter().map(|v| vec![*v]).collect(),
        }
    }

    /// Rebuild an arm, checking every shape against `d`
    pub fn to_arm(&self, d: usize) -> Result<ArmState> {
        if self.a_inv.len() != d {
            return Err(BanditError::DimensionMismatch {
                expected: d,
                actual: self.a_inv.len(),
            });
        }
        if let Some(row) = self.a_inv.iter().find(|row| row.len() != d) {
            return Err(BanditError::DimensionMismatch {
                expected: d,
                actual: row.len(),
            });
        }
        if self.b.len() != d {
            return Err(BanditError::DimensionMismatch {
                expected: d,
                actual: self.b.len(),
            });
        }
        if self.b.iter().any(|cell| cell.len() != 1) {
            return Err(BanditError::InvalidInput(
                "b must be a column vector of single-element rows".to_string(),
            ));
        }

        let flat: Vec<f64> = self.a_inv.iter().flatten().copied().collect();
        if flat.iter().any(|v| !v.is_finite()) {
            return Err(BanditError::InvalidInput(
                "A_inv contains non-finite values".to_string(),
            ));
        }
        let a_inv = Array2::from_shape_vec((d, d), flat)
            .map_err(|e| BanditError::InvalidInput(format!("Malformed A_inv: {}", e)))?;

        let b: Array1<f64> = self.b.iter().map(|cell| cell[0]).collect();
        if b.iter().any(|v| !v.is_finite()) {
            return Err(BanditError::InvalidInput(
                "b contains non-finite values".to_string(),
            ));
        }

        Ok(ArmState { a_inv, b })
    }
}

impl PersistedBankState {
    /// Read a state file. `Ok(None)` means the file does not exist.
    pub fn read_from(path: &Path) -> Result<Option<Self>> {
        // Raw bytes, so invalid UTF-8 is reported as a parse error, not I/O
        let contents = match std::fs::read(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let state: PersistedBankState = serde_json::from_slice(&contents)?;
        Ok(Some(state))
    }

    /// Atomically write this state to `path`, creating parent directories
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut tmp, self)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| {
            BanditError::Persistence(format!("Failed to replace {}: {}", path.display(), e))
        })?;

        debug!(
            "Wrote bank state ({} arms) to {}",
            self.arms.len(),
            path.display()
        );
        Ok(())
    }
}
