//! User × product rating matrices.
//!
//! `PivotTable` is the raw pivot: one row per user, one column per product,
//! `None` where no rating exists. `fill_missing` turns it into the dense
//! `RatingMatrix` the factorizer consumes. Filling with 0 treats a missing
//! rating as "no signal", which also makes it indistinguishable from a true
//! zero; that conflation is accepted.

use ndarray::Array2;
use recolab_core::{InteractionDataset, ProductId, RecolabError, Result, UserId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Sparse-in-spirit pivot of the interaction dataset.
///
/// Rows and columns are the sorted unique user and product ids, so the
/// layout does not depend on input order. Duplicate (user, product) pairs
/// with the same rating collapse; differing ratings are rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotTable {
    users: Vec<UserId>,
    products: Vec<ProductId>,
    cells: Array2<Option<f64>>,
}

impl PivotTable {
    pub fn from_dataset(dataset: &InteractionDataset) -> Result<Self> {
        if dataset.is_empty() {
            return Err(RecolabError::empty_dataset("cannot pivot an empty dataset"));
        }
        let users = dataset.unique_users();
        let products = dataset.unique_products();
        let mut cells = Array2::from_elem((users.len(), products.len()), None);

        for rec in dataset.records() {
            let (Ok(row), Ok(col)) = (
                users.binary_search(&rec.user_id),
                products.binary_search(&rec.product_id),
            ) else {
                continue;
            };
            let cell = &mut cells[[row, col]];
            match *cell {
                Some(existing) if existing != rec.rating => {
                    return Err(RecolabError::ConflictingPivotEntry {
                        user_id: rec.user_id.0,
                        product_id: rec.product_id.0,
                        existing,
                        incoming: rec.rating,
                    });
                }
                _ => *cell = Some(rec.rating),
            }
        }

        debug!(
            users = users.len(),
            products = products.len(),
            "Pivoted interactions into user-product table"
        );
        Ok(Self {
            users,
            products,
            cells,
        })
    }

    pub fn users(&self) -> &[UserId] {
        &self.users
    }

    pub fn products(&self) -> &[ProductId] {
        &self.products
    }

    /// `(n_users, n_products)`.
    pub fn shape(&self) -> (usize, usize) {
        self.cells.dim()
    }

    pub fn get(&self, user: UserId, product: ProductId) -> Option<f64> {
        let row = self.users.binary_search(&user).ok()?;
        let col = self.products.binary_search(&product).ok()?;
        self.cells[[row, col]]
    }

    pub fn n_missing(&self) -> usize {
        self.cells.iter().filter(|c| c.is_none()).count()
    }

    /// Replace every missing cell with `value`.
    pub fn fill_missing(&self, value: f64) -> RatingMatrix {
        RatingMatrix {
            users: self.users.clone(),
            products: self.products.clone(),
            values: self.cells.mapv(|c| c.unwrap_or(value)),
        }
    }
}

/// Dense user × product matrix with labelled rows and columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingMatrix {
    users: Vec<UserId>,
    products: Vec<ProductId>,
    values: Array2<f64>,
}

impl RatingMatrix {
    pub fn users(&self) -> &[UserId] {
        &self.users
    }

    pub fn products(&self) -> &[ProductId] {
        &self.products
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn row_of(&self, user: UserId) -> Option<usize> {
        self.users.binary_search(&user).ok()
    }

    pub fn column_of(&self, product: ProductId) -> Option<usize> {
        self.products.binary_search(&product).ok()
    }

    /// Fraction of cells that are non-zero.
    pub fn density(&self) -> f64 {
        let total = self.values.len();
        if total == 0 {
            return 0.0;
        }
        self.values.iter().filter(|v| **v != 0.0).count() as f64 / total as f64
    }
}
