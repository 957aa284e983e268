//! Train/test partitioning of an interaction dataset.
//!
//! Splits are index permutations drawn from a seeded `StdRng`, so the same
//! dataset and seed always give the same partition.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use recolab_core::{Interaction, InteractionDataset, RecolabError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A disjoint partition of a dataset into training and held-out records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainTestSplit {
    pub train: Vec<Interaction>,
    pub test: Vec<Interaction>,
}

/// Reject fractions outside the open interval (0, 1).
pub fn validate_test_size(test_size: f64) -> Result<()> {
    if !(test_size.is_finite() && test_size > 0.0 && test_size < 1.0) {
        return Err(RecolabError::invalid_hyperparameter(
            "test_size",
            format!("must lie in (0, 1), got {test_size}"),
        ));
    }
    Ok(())
}

fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

/// Randomly hold out `ceil(test_size * n)` records for testing.
///
/// The remaining records form the training set, which must not be empty.
pub fn train_test_split(
    dataset: &InteractionDataset,
    test_size: f64,
    seed: u64,
) -> Result<TrainTestSplit> {
    validate_test_size(test_size)?;
    let n = dataset.len();
    if n == 0 {
        return Err(RecolabError::empty_dataset("cannot split an empty dataset"));
    }
    let n_test = (test_size * n as f64).ceil() as usize;
    if n_test >= n {
        return Err(RecolabError::invalid_hyperparameter(
            "test_size",
            format!("{test_size} leaves no training records out of {n}"),
        ));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut rng_for(Some(seed)));

    let records = dataset.records();
    let test = indices[..n_test].iter().map(|&i| records[i]).collect();
    let train = indices[n_test..].iter().map(|&i| records[i]).collect();
    debug!(seed, n_train = n - n_test, n_test, "Split interactions");
    Ok(TrainTestSplit { train, test })
}

/// K-fold cross-validation iterator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KFold {
    pub n_splits: usize,
    pub shuffle: bool,
    pub random_state: Option<u64>,
}

impl Default for KFold {
    fn default() -> Self {
        Self {
            n_splits: 5,
            shuffle: true,
            random_state: Some(42),
        }
    }
}

impl KFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            ..Self::default()
        }
    }

    /// Partition the dataset into `n_splits` folds; each fold is the test set once.
    ///
    /// Fold sizes differ by at most one record.
    pub fn split(&self, dataset: &InteractionDataset) -> Result<Vec<TrainTestSplit>> {
        let n = dataset.len();
        if self.n_splits < 2 || self.n_splits > n {
            return Err(RecolabError::invalid_hyperparameter(
                "n_splits",
                format!("must lie in [2, {n}], got {}", self.n_splits),
            ));
        }

        let mut indices: Vec<usize> = (0..n).collect();
        if self.shuffle {
            indices.shuffle(&mut rng_for(self.random_state));
        }

        let records = dataset.records();
        let base = n / self.n_splits;
        let remainder = n % self.n_splits;
        let mut folds = Vec::with_capacity(self.n_splits);
        let mut stop = 0;
        for fold in 0..self.n_splits {
            let start = stop;
            stop += base + usize::from(fold < remainder);
            let test = indices[start..stop].iter().map(|&i| records[i]).collect();
            let train = indices[..start]
                .iter()
                .chain(&indices[stop..])
                .map(|&i| records[i])
                .collect();
            folds.push(TrainTestSplit { train, test });
        }
        Ok(folds)
    }
}
