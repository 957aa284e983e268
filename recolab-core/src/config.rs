//! Storage configuration for the interaction loader.
//!
//! Replaces the hard-coded database path and implicit schema with an explicit
//! struct: where the database lives, which table to read and how its columns
//! map onto (user, product, rating).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{RecolabError, Result};

/// Where interactions are read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Table holding one row per interaction.
    #[serde(default = "default_table")]
    pub table: String,
    /// Column names within `table`.
    #[serde(default)]
    pub columns: ColumnMapping,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            table: default_table(),
            columns: ColumnMapping::default(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("user_interactions.db")
}

fn default_table() -> String {
    "user_interactions".to_string()
}

/// Mapping from the logical interaction fields to physical column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    #[serde(default = "default_user_column")]
    pub user: String,
    #[serde(default = "default_product_column")]
    pub product: String,
    #[serde(default = "default_rating_column")]
    pub rating: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            user: default_user_column(),
            product: default_product_column(),
            rating: default_rating_column(),
        }
    }
}

fn default_user_column() -> String {
    "user_id".to_string()
}

fn default_product_column() -> String {
    "product_id".to_string()
}

fn default_rating_column() -> String {
    "rating".to_string()
}

impl ColumnMapping {
    pub fn as_array(&self) -> [&str; 3] {
        [&self.user, &self.product, &self.rating]
    }
}

impl StorageConfig {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Self::default()
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_columns(mut self, columns: ColumnMapping) -> Self {
        self.columns = columns;
        self
    }

    /// Table and column names are spliced into SQL, so only plain identifiers pass.
    pub fn validate(&self) -> Result<()> {
        validate_identifier("table", &self.table)?;
        for name in self.columns.as_array() {
            validate_identifier("column", name)?;
        }
        Ok(())
    }
}

fn validate_identifier(kind: &str, name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(RecolabError::invalid_input(format!(
            "{kind} name '{name}' is not a plain SQL identifier"
        )))
    }
}
