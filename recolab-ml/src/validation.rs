//! K-fold cross-validation of rating predictors.

use recolab_core::{InteractionDataset, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::accuracy::evaluate;
use crate::predictor::RatingPredictor;
use crate::split::KFold;
use crate::trainset::Trainset;

/// Per-fold scores and their summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossValidationResult {
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
    pub metric_name: String,
}

impl CrossValidationResult {
    pub fn from_scores(scores: Vec<f64>, metric_name: &str) -> Self {
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        let variance =
            scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64;
        Self {
            fold_scores: scores,
            mean_score: mean,
            std_score: variance.sqrt(),
            metric_name: metric_name.to_string(),
        }
    }
}

/// Fit a fresh model on each training fold and score MSE on its test fold.
pub fn cross_validate<P, F>(
    mut make_model: F,
    dataset: &InteractionDataset,
    kfold: &KFold,
) -> Result<CrossValidationResult>
where
    P: RatingPredictor,
    F: FnMut() -> Result<P>,
{
    let folds = kfold.split(dataset)?;
    let mut scores = Vec::with_capacity(folds.len());
    for (fold, split) in folds.iter().enumerate() {
        let trainset = Trainset::build(&split.train, dataset.rating_scale())?;
        let mut model = make_model()?;
        model.fit(&trainset)?;
        let report = evaluate(&model, &split.test)?;
        info!(fold, mse = report.mse, "Cross-validation fold complete");
        scores.push(report.mse);
    }
    Ok(CrossValidationResult::from_scores(scores, "mse"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::svd::{Svd, SvdParams};
    use recolab_core::{Interaction, RatingScale};

    #[test]
    fn test_from_scores_summary() {
        let result = CrossValidationResult::from_scores(vec![1.0, 3.0], "mse");
        assert_eq!(result.mean_score, 2.0);
        assert_eq!(result.std_score, 1.0);
        assert_eq!(result.metric_name, "mse");
    }

    #[test]
    fn test_cross_validate_svd() {
        let records: Vec<Interaction> = (0..30i64)
            .map(|i| Interaction::new(i % 6, i % 5, ((i * 7) % 5 + 1) as f64))
            .collect();
        let dataset = InteractionDataset::new(records, RatingScale::default()).unwrap();
        let params = SvdParams {
            n_factors: 3,
            n_epochs: 10,
            ..SvdParams::default()
        };
        let result = cross_validate(|| Svd::new(params.clone()), &dataset, &KFold::new(3)).unwrap();
        assert_eq!(result.fold_scores.len(), 3);
        assert!(result.fold_scores.iter().all(|s| s.is_finite() && *s >= 0.0));
        assert!(result.mean_score >= 0.0);
    }
}
