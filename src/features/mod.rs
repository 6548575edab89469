//! Context features for the bandit.
//!
//! - **ContextVectorizer**: fixed-length user + item encoding
//! - **TopCategoricals**: top-N category/author/publisher tables
//! - **FeatureSource**: seam to the store that owns engagement and item data

pub mod source;
pub mod top_n;
pub mod vectorizer;

pub use source::{FeatureSource, InMemoryFeatureSource};
pub use top_n::{CategoricalIndex, TopCategoricals};
pub use vectorizer::{ContextVectorizer, DEFAULT_USER_FEATURES, ITEM_BASE_DIM, USER_DIM};
