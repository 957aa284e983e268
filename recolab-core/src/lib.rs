//! # recolab-core
//!
//! Shared foundation for the Recolab recommendation pipelines: identifier and
//! record types, the validated interaction dataset, the error taxonomy and the
//! loaders that read `(user_id, product_id, rating)` rows from storage.

pub mod config;
pub mod dataset;
pub mod error;
pub mod source;
pub mod types;

// Re-exports
pub use config::{ColumnMapping, StorageConfig};
pub use dataset::InteractionDataset;
pub use error::{RecolabError, Result};
pub use source::{InteractionSource, MemorySource, SourceInfo, SqliteSource};
pub use types::{Interaction, ProductId, RatingScale, UserId};
