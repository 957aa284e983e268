//! Error types for the Recolab pipelines.
//!
//! Every failure is terminal for a pipeline run; nothing here is retried.
//! Variants carry enough structured context (table, row, hyperparameter)
//! to diagnose a failed batch without re-running it.

use std::path::PathBuf;

/// Top-level error type shared by the loader, the shaping stages and the models.
#[derive(Debug, thiserror::Error)]
pub enum RecolabError {
    #[error("Storage unavailable at {location}: {message}")]
    StorageUnavailable { location: String, message: String },

    #[error("Malformed record{}: {reason}", at_row(*row))]
    MalformedRecord { row: Option<usize>, reason: String },

    #[error(
        "Conflicting ratings for user {user_id}, product {product_id}: {existing} vs {incoming}"
    )]
    ConflictingPivotEntry {
        user_id: i64,
        product_id: i64,
        existing: f64,
        incoming: f64,
    },

    #[error("Invalid hyperparameter '{name}': {reason}")]
    InvalidHyperparameter { name: String, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Configuration file not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },
}

fn at_row(row: Option<usize>) -> String {
    row.map(|r| format!(" at row {r}")).unwrap_or_default()
}

impl RecolabError {
    pub fn storage_unavailable(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StorageUnavailable {
            location: location.into(),
            message: message.into(),
        }
    }

    pub fn malformed(row: Option<usize>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            row,
            reason: reason.into(),
        }
    }

    pub fn invalid_hyperparameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidHyperparameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn empty_dataset(msg: impl Into<String>) -> Self {
        Self::EmptyDataset(msg.into())
    }
}

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, RecolabError>;
