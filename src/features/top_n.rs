//! Top-N categorical tables for the item multi-hot blocks.
//!
//! Loaded once from a JSON artifact produced by the catalog pipeline:
//!
//! ```json
//! {"version": "2024-06", "top_categories": [12, 7], "top_authors": ["a1"], "top_publishers": ["Penguin"]}
//! ```
//!
//! Entries may be strings or integers. A missing or malformed artifact yields
//! empty tables; it never stops the recommender from starting.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// The raw artifact
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopCategoricals {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "deserialize_keys")]
    pub top_categories: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_keys")]
    pub top_authors: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_keys")]
    pub top_publishers: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawKey {
    Text(String),
    Integer(i64),
    Float(f64),
}

fn deserialize_keys<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<RawKey>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|key| match key {
            RawKey::Text(s) => s,
            RawKey::Integer(i) => i.to_string(),
            RawKey::Float(f) => f.to_string(),
        })
        .collect())
}

/// Case- and whitespace-insensitive form used for every categorical lookup
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

impl TopCategoricals {
    /// Load the artifact, falling back to empty tables when it is absent or unreadable
    pub fn load_or_default(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "Top-N artifact {} not found, item multi-hot blocks will be empty",
                    path.display()
                );
                return Self::default();
            }
            Err(e) => {
                warn!("Failed to read top-N artifact {}: {}", path.display(), e);
                return Self::default();
            }
        };

        match serde_json::from_str::<TopCategoricals>(&contents) {
            Ok(top) => {
                info!(
                    "Loaded top-N artifact {} (version {}): {} categories, {} authors, {} publishers",
                    path.display(),
                    top.version.as_deref().unwrap_or("unversioned"),
                    top.top_categories.len(),
                    top.top_authors.len(),
                    top.top_publishers.len()
                );
                top
            }
            Err(e) => {
                warn!("Malformed top-N artifact {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

/// Position lookup for one multi-hot block
#[derive(Debug, Clone, Default)]
pub struct CategoricalIndex {
    positions: HashMap<String, usize>,
    width: usize,
}

impl CategoricalIndex {
    /// Build from an ordered list; duplicates keep their first position
    pub fn new(values: &[String]) -> Self {
        let mut positions = HashMap::with_capacity(values.len());
        for (i, value) in values.iter().enumerate() {
            positions.entry(normalize_key(value)).or_insert(i);
        }
        Self {
            positions,
            width: values.len(),
        }
    }

    /// Block width (`|top list|`)
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.positions.get(&normalize_key(key)).copied()
    }

    /// Multi-hot encoding of `keys`; unknown keys set no bit
    pub fn encode<'a, I>(&self, keys: I) -> Vec<f64>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut block = vec![0.0; self.width];
        for key in keys {
            if let Some(i) = self.position(key) {
                block[i] = 1.0;
            }
        }
        block
    }
}
