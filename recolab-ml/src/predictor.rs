//! The fit-then-predict contract shared by rating models.

use recolab_core::{Interaction, ProductId, Result, UserId};
use serde::{Deserialize, Serialize};

use crate::trainset::Trainset;

/// How an estimate was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PredictionDetails {
    pub known_user: bool,
    pub known_product: bool,
    /// Set when the user or the product was absent from training; the estimate
    /// then comes from the model's cold-start fallback.
    pub cold_start: bool,
}

/// A single rating estimate, optionally paired with the observed rating.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub actual: Option<f64>,
    pub estimate: f64,
    pub details: PredictionDetails,
}

impl Prediction {
    pub fn error(&self) -> Option<f64> {
        self.actual.map(|r| r - self.estimate)
    }
}

/// A model that learns from a trainset and then estimates ratings.
pub trait RatingPredictor {
    /// Short model name used in logs and reports.
    fn name(&self) -> &str;

    /// Fit the model, replacing any previous fit.
    fn fit(&mut self, trainset: &Trainset) -> Result<()>;

    /// Estimate the rating `user` would give `product`.
    ///
    /// Fails with `InvalidInput` if called before `fit`.
    fn predict(&self, user: UserId, product: ProductId, actual: Option<f64>)
    -> Result<Prediction>;

    /// Predict every record of a held-out set. No record is dropped.
    fn test(&self, testset: &[Interaction]) -> Result<Vec<Prediction>> {
        testset
            .iter()
            .map(|r| self.predict(r.user_id, r.product_id, Some(r.rating)))
            .collect()
    }
}
