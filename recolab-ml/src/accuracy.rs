//! Prediction-error metrics and held-out evaluation.

use recolab_core::{Interaction, RecolabError, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::predictor::{Prediction, RatingPredictor};

fn errors(predictions: &[Prediction]) -> Result<Vec<f64>> {
    if predictions.is_empty() {
        return Err(RecolabError::empty_dataset("prediction list is empty"));
    }
    predictions
        .iter()
        .map(|p| {
            p.error().ok_or_else(|| {
                RecolabError::invalid_input(format!(
                    "prediction for user {} / product {} has no observed rating",
                    p.user_id, p.product_id
                ))
            })
        })
        .collect()
}

/// Mean squared error over all predictions.
pub fn mse(predictions: &[Prediction]) -> Result<f64> {
    let errs = errors(predictions)?;
    Ok(errs.iter().map(|e| e * e).sum::<f64>() / errs.len() as f64)
}

/// Root mean squared error over all predictions.
pub fn rmse(predictions: &[Prediction]) -> Result<f64> {
    mse(predictions).map(f64::sqrt)
}

/// Mean absolute error over all predictions.
pub fn mae(predictions: &[Prediction]) -> Result<f64> {
    let errs = errors(predictions)?;
    Ok(errs.iter().map(|e| e.abs()).sum::<f64>() / errs.len() as f64)
}

/// Error metrics of a fitted model on a held-out set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub n_predictions: usize,
    /// Test records whose user or product was unseen during training.
    pub n_cold_start: usize,
}

impl EvaluationReport {
    pub fn from_predictions(predictions: &[Prediction]) -> Result<Self> {
        let mse = mse(predictions)?;
        Ok(Self {
            mse,
            rmse: mse.sqrt(),
            mae: mae(predictions)?,
            n_predictions: predictions.len(),
            n_cold_start: predictions.iter().filter(|p| p.details.cold_start).count(),
        })
    }
}

/// Predict every test record and summarize the error.
pub fn evaluate<P: RatingPredictor + ?Sized>(
    model: &P,
    testset: &[Interaction],
) -> Result<EvaluationReport> {
    let predictions = model.test(testset)?;
    let report = EvaluationReport::from_predictions(&predictions)?;
    info!(
        model = model.name(),
        mse = report.mse,
        rmse = report.rmse,
        mae = report.mae,
        n = report.n_predictions,
        cold_start = report.n_cold_start,
        "Evaluated model"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::PredictionDetails;
    use recolab_core::{ProductId, UserId};

    fn pred(actual: Option<f64>, estimate: f64) -> Prediction {
        Prediction {
            user_id: UserId(1),
            product_id: ProductId(1),
            actual,
            estimate,
            details: PredictionDetails::default(),
        }
    }

    #[test]
    fn test_metrics_on_known_errors() {
        let preds = vec![pred(Some(4.0), 3.0), pred(Some(2.0), 4.0), pred(Some(5.0), 5.0)];
        assert!((mse(&preds).unwrap() - 5.0 / 3.0).abs() < 1e-12);
        assert!((rmse(&preds).unwrap() - (5.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!((mae(&preds).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_predictions_rejected() {
        assert!(matches!(mse(&[]), Err(RecolabError::EmptyDataset(_))));
        assert!(mae(&[]).is_err());
    }

    #[test]
    fn test_missing_actual_rejected() {
        let preds = vec![pred(Some(4.0), 3.0), pred(None, 4.0)];
        assert!(matches!(mse(&preds), Err(RecolabError::InvalidInput(_))));
    }

    #[test]
    fn test_report_counts_cold_start() {
        let mut cold = pred(Some(3.0), 3.0);
        cold.details.cold_start = true;
        let report =
            EvaluationReport::from_predictions(&[pred(Some(4.0), 2.0), cold]).unwrap();
        assert_eq!(report.n_predictions, 2);
        assert_eq!(report.n_cold_start, 1);
        assert!((report.mse - 2.0).abs() < 1e-12);
        assert!((report.rmse - 2.0f64.sqrt()).abs() < 1e-12);
    }
}
