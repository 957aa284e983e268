//! Interaction loaders.
//!
//! A source produces the full interaction dataset in one blocking call. The
//! SQLite source owns its connection for exactly the duration of `load`: the
//! connection is closed whether the query succeeds or fails.

use chrono::{DateTime, Utc};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::StorageConfig;
use crate::dataset::InteractionDataset;
use crate::error::{RecolabError, Result};
use crate::types::{Interaction, ProductId, RatingScale, UserId};

/// Information about a source for lineage logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInfo {
    pub source_type: String,
    pub location: String,
    pub accessed_at: DateTime<Utc>,
    pub row_count: Option<usize>,
}

/// Anything that can produce the interaction dataset.
pub trait InteractionSource {
    /// Load every interaction, validating ratings against `scale`.
    fn load(&self, scale: RatingScale) -> Result<InteractionDataset>;

    /// Return metadata about this source.
    fn source_info(&self) -> SourceInfo;
}

// ---------------------------------------------------------------------------
// SqliteSource
// ---------------------------------------------------------------------------

/// Reads interactions from a table in a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteSource {
    config: StorageConfig,
}

impl SqliteSource {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    fn location(&self) -> String {
        self.config.db_path.display().to_string()
    }

    fn open(&self) -> Result<Connection> {
        Connection::open_with_flags(&self.config.db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| RecolabError::storage_unavailable(self.location(), e.to_string()))
    }

    fn read_interactions(&self, conn: &Connection) -> Result<Vec<Interaction>> {
        let table = &self.config.table;
        let present = table_columns(conn, table)
            .map_err(|e| RecolabError::storage_unavailable(self.location(), e.to_string()))?;
        if present.is_empty() {
            return Err(RecolabError::storage_unavailable(
                self.location(),
                format!("table '{table}' does not exist"),
            ));
        }
        for column in self.config.columns.as_array() {
            if !present.iter().any(|c| c.eq_ignore_ascii_case(column)) {
                return Err(RecolabError::malformed(
                    None,
                    format!("table '{table}' has no column '{column}'"),
                ));
            }
        }

        let [user_col, product_col, rating_col] = self.config.columns.as_array();
        let sql = format!(
            "SELECT \"{user_col}\", \"{product_col}\", \"{rating_col}\" FROM \"{table}\""
        );
        debug!(sql = %sql, "Querying interactions");

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| RecolabError::storage_unavailable(self.location(), e.to_string()))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| RecolabError::storage_unavailable(self.location(), e.to_string()))?;

        let mut records = Vec::new();
        loop {
            let row = match rows.next() {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(e) => {
                    return Err(RecolabError::storage_unavailable(self.location(), e.to_string()));
                }
            };
            let index = records.len();
            let user = integer_cell(row.get_ref(0), index, user_col)?;
            let product = integer_cell(row.get_ref(1), index, product_col)?;
            let rating = numeric_cell(row.get_ref(2), index, rating_col)?;
            records.push(Interaction {
                user_id: UserId(user),
                product_id: ProductId(product),
                rating,
            });
        }
        Ok(records)
    }
}

impl InteractionSource for SqliteSource {
    fn load(&self, scale: RatingScale) -> Result<InteractionDataset> {
        self.config.validate()?;
        let conn = self.open()?;
        let records = self.read_interactions(&conn);
        let closed = conn
            .close()
            .map_err(|(_, e)| RecolabError::storage_unavailable(self.location(), e.to_string()));
        let records = records?;
        closed?;

        info!(
            location = %self.location(),
            table = %self.config.table,
            rows = records.len(),
            "Loaded interactions"
        );
        InteractionDataset::new(records, scale)
    }

    fn source_info(&self) -> SourceInfo {
        SourceInfo {
            source_type: "sqlite".to_string(),
            location: format!("{}#{}", self.location(), self.config.table),
            accessed_at: Utc::now(),
            row_count: None,
        }
    }
}

fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let names = stmt
        .query_map([table], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names)
}

fn integer_cell(cell: rusqlite::Result<ValueRef<'_>>, row: usize, column: &str) -> Result<i64> {
    match cell {
        Ok(ValueRef::Integer(n)) => Ok(n),
        Ok(ValueRef::Null) => Err(RecolabError::malformed(
            Some(row),
            format!("column '{column}' is NULL"),
        )),
        Ok(other) => Err(RecolabError::malformed(
            Some(row),
            format!(
                "column '{column}' must hold an integer id, found {:?}",
                other.data_type()
            ),
        )),
        Err(e) => Err(RecolabError::malformed(Some(row), e.to_string())),
    }
}

fn numeric_cell(cell: rusqlite::Result<ValueRef<'_>>, row: usize, column: &str) -> Result<f64> {
    match cell {
        Ok(ValueRef::Integer(n)) => Ok(n as f64),
        Ok(ValueRef::Real(f)) => Ok(f),
        Ok(ValueRef::Null) => Err(RecolabError::malformed(
            Some(row),
            format!("column '{column}' is NULL"),
        )),
        Ok(other) => Err(RecolabError::malformed(
            Some(row),
            format!(
                "column '{column}' must be numeric, found {:?}",
                other.data_type()
            ),
        )),
        Err(e) => Err(RecolabError::malformed(Some(row), e.to_string())),
    }
}

// ---------------------------------------------------------------------------
// MemorySource
// ---------------------------------------------------------------------------

/// Interactions already held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: Vec<Interaction>,
}

impl MemorySource {
    pub fn new(records: Vec<Interaction>) -> Self {
        Self { records }
    }
}

impl<T: Into<Interaction>> FromIterator<T> for MemorySource {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

impl InteractionSource for MemorySource {
    fn load(&self, scale: RatingScale) -> Result<InteractionDataset> {
        InteractionDataset::new(self.records.clone(), scale)
    }

    fn source_info(&self) -> SourceInfo {
        SourceInfo {
            source_type: "memory".to_string(),
            location: "memory".to_string(),
            accessed_at: Utc::now(),
            row_count: Some(self.records.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnMapping;
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use tempfile::TempDir;

    fn seed_db(path: &Path, ddl: &str, rows: &[&str]) {
        let conn = Connection::open(path).unwrap();
        conn.execute(ddl, []).unwrap();
        for row in rows {
            conn.execute(row, []).unwrap();
        }
    }

    fn standard_db(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("user_interactions.db");
        seed_db(
            &path,
            "CREATE TABLE user_interactions (user_id INTEGER, product_id INTEGER, rating REAL)",
            &[
                "INSERT INTO user_interactions VALUES (1, 10, 5)",
                "INSERT INTO user_interactions VALUES (1, 11, 3.0)",
                "INSERT INTO user_interactions VALUES (2, 10, 4)",
                "INSERT INTO user_interactions VALUES (2, 11, 2.5)",
            ],
        );
        path
    }

    #[test]
    fn test_sqlite_source_loads_all_rows() {
        let dir = TempDir::new().unwrap();
        let path = standard_db(&dir);
        let source = SqliteSource::new(StorageConfig::new(&path));
        let ds = source.load(RatingScale::default()).unwrap();
        assert_eq!(
            ds.records(),
            &[
                Interaction::new(1, 10, 5.0),
                Interaction::new(1, 11, 3.0),
                Interaction::new(2, 10, 4.0),
                Interaction::new(2, 11, 2.5),
            ]
        );
    }

    #[test]
    fn test_sqlite_source_missing_file() {
        let dir = TempDir::new().unwrap();
        let source = SqliteSource::new(StorageConfig::new(dir.path().join("absent.db")));
        let err = source.load(RatingScale::default()).unwrap_err();
        assert!(matches!(err, RecolabError::StorageUnavailable { .. }));
    }

    #[test]
    fn test_sqlite_source_missing_table() {
        let dir = TempDir::new().unwrap();
        let path = standard_db(&dir);
        let source = SqliteSource::new(StorageConfig::new(&path).with_table("nope"));
        let err = source.load(RatingScale::default()).unwrap_err();
        assert!(matches!(err, RecolabError::StorageUnavailable { .. }));
    }

    #[test]
    fn test_sqlite_source_missing_column() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.db");
        seed_db(
            &path,
            "CREATE TABLE user_interactions (user_id INTEGER, product_id INTEGER)",
            &["INSERT INTO user_interactions VALUES (1, 10)"],
        );
        let source = SqliteSource::new(StorageConfig::new(&path));
        let err = source.load(RatingScale::default()).unwrap_err();
        assert!(matches!(err, RecolabError::MalformedRecord { row: None, .. }));
    }

    #[test]
    fn test_sqlite_source_rating_out_of_scale() {
        let dir = TempDir::new().unwrap();
        let path = standard_db(&dir);
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute("INSERT INTO user_interactions VALUES (3, 12, 9)", [])
                .unwrap();
        }
        let source = SqliteSource::new(StorageConfig::new(&path));
        let err = source.load(RatingScale::default()).unwrap_err();
        assert!(matches!(err, RecolabError::MalformedRecord { row: Some(4), .. }));
    }

    #[test]
    fn test_sqlite_source_null_rating() {
        let dir = TempDir::new().unwrap();
        let path = standard_db(&dir);
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute("INSERT INTO user_interactions VALUES (3, 12, NULL)", [])
                .unwrap();
        }
        let source = SqliteSource::new(StorageConfig::new(&path));
        let err = source.load(RatingScale::default()).unwrap_err();
        assert!(matches!(err, RecolabError::MalformedRecord { row: Some(4), .. }));
    }

    #[test]
    fn test_sqlite_source_custom_mapping() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.db");
        seed_db(
            &path,
            "CREATE TABLE reviews (customer INTEGER, sku INTEGER, stars INTEGER, note TEXT)",
            &["INSERT INTO reviews VALUES (7, 70, 4, 'ok')"],
        );
        let config = StorageConfig::new(&path)
            .with_table("reviews")
            .with_columns(ColumnMapping {
                user: "customer".into(),
                product: "sku".into(),
                rating: "stars".into(),
            });
        let ds = SqliteSource::new(config).load(RatingScale::default()).unwrap();
        assert_eq!(ds.records(), &[Interaction::new(7, 70, 4.0)]);
    }

    #[test]
    fn test_sqlite_source_rejects_unsafe_table_name() {
        let dir = TempDir::new().unwrap();
        let path = standard_db(&dir);
        let source = SqliteSource::new(StorageConfig::new(&path).with_table("x\"; --"));
        assert!(matches!(
            source.load(RatingScale::default()),
            Err(RecolabError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_sqlite_source_info() {
        let source = SqliteSource::new(StorageConfig::new("test.db"));
        let info = source.source_info();
        assert_eq!(info.source_type, "sqlite");
        assert_eq!(info.location, "test.db#user_interactions");
    }

    #[test]
    fn test_memory_source_roundtrip() {
        let source: MemorySource = vec![(1_i64, 10_i64, 5.0), (2, 10, 4.0)].into_iter().collect();
        let ds = source.load(RatingScale::default()).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(source.source_info().row_count, Some(2));
    }
}
