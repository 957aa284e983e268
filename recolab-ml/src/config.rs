//! Layered configuration for both pipelines.
//!
//! Uses `figment`: defaults -> TOML file -> `RECOLAB_` environment -> explicit overrides.
//! Nested keys are separated by a double underscore in the environment, e.g.
//! `RECOLAB_SVD__N_FACTORS=50` or `RECOLAB_STORAGE__DB_PATH=/data/ratings.db`.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use recolab_core::{RatingScale, RecolabError, Result, StorageConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::nmf::NmfParams;
use crate::split::validate_test_size;
use crate::svd::SvdParams;

/// Hold-out split settings for the collaborative filtering pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of records held out for evaluation, in `(0, 1)`.
    #[serde(default = "default_test_size")]
    pub test_size: f64,
    #[serde(default = "default_split_seed")]
    pub random_state: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_size: default_test_size(),
            random_state: default_split_seed(),
        }
    }
}

fn default_test_size() -> f64 {
    0.2
}

fn default_split_seed() -> u64 {
    42
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommenderConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub rating_scale: RatingScale,
    #[serde(default)]
    pub split: SplitConfig,
    #[serde(default)]
    pub svd: SvdParams,
    #[serde(default)]
    pub nmf: NmfParams,
}

impl RecommenderConfig {
    pub fn validate(&self) -> Result<()> {
        self.storage.validate()?;
        self.rating_scale.validate()?;
        validate_test_size(self.split.test_size)?;
        self.svd.validate()?;
        self.nmf.validate()
    }
}

/// Load configuration with layered sources.
///
/// A `config_file` that does not exist is an error rather than silently
/// skipped. The result is validated before it is returned.
pub fn load_config(
    config_file: Option<&Path>,
    overrides: Option<&RecommenderConfig>,
) -> Result<RecommenderConfig> {
    let mut figment = Figment::from(Serialized::defaults(RecommenderConfig::default()));

    if let Some(path) = config_file {
        if !path.exists() {
            return Err(RecolabError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("RECOLAB_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    let config: RecommenderConfig = figment.extract().map_err(Box::new)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nmf::NmfSolver;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = RecommenderConfig::default();
        assert_eq!(config.storage.db_path, PathBuf::from("user_interactions.db"));
        assert_eq!(config.split.test_size, 0.2);
        assert_eq!(config.split.random_state, 42);
        assert_eq!(config.svd.n_factors, 100);
        assert_eq!(config.nmf.n_components, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_config_from_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("recolab.toml");
        std::fs::write(
            &path,
            r#"
[storage]
db_path = "/data/ratings.db"
table = "ratings"

[split]
test_size = 0.25

[svd]
n_factors = 20
lr_bu = 0.01

[nmf]
n_components = 2
solver = "multiplicative_update"
"#,
        )
        .unwrap();

        let config = load_config(Some(&path), None).unwrap();
        assert_eq!(config.storage.db_path, PathBuf::from("/data/ratings.db"));
        assert_eq!(config.storage.table, "ratings");
        assert_eq!(config.storage.columns.rating, "rating");
        assert_eq!(config.split.test_size, 0.25);
        assert_eq!(config.split.random_state, 42);
        assert_eq!(config.svd.n_factors, 20);
        assert_eq!(config.svd.lr_bu, Some(0.01));
        assert_eq!(config.svd.n_epochs, 20);
        assert_eq!(config.nmf.n_components, 2);
        assert_eq!(config.nmf.solver, NmfSolver::MultiplicativeUpdate);
    }

    #[test]
    fn test_load_config_overrides_win() {
        let mut overrides = RecommenderConfig::default();
        overrides.nmf.n_components = 3;
        let config = load_config(None, Some(&overrides)).unwrap();
        assert_eq!(config.nmf.n_components, 3);
    }

    #[test]
    fn test_load_config_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(matches!(
            load_config(Some(&path), None),
            Err(RecolabError::ConfigNotFound { .. })
        ));
    }

    #[test]
    fn test_load_config_rejects_invalid_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[split]\ntest_size = 1.5\n").unwrap();
        assert!(matches!(
            load_config(Some(&path), None),
            Err(RecolabError::InvalidHyperparameter { .. })
        ));
    }
}
