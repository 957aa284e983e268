//! The in-memory interaction dataset handed from the loader to both pipelines.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{RecolabError, Result};
use crate::types::{Interaction, ProductId, RatingScale, UserId};

/// Validated collection of interactions, in the order they were loaded.
///
/// Deserialization goes through [`InteractionDataset::new`], so a stored
/// dataset is re-validated against its scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDataset")]
pub struct InteractionDataset {
    records: Vec<Interaction>,
    scale: RatingScale,
}

#[derive(Deserialize)]
struct RawDataset {
    records: Vec<Interaction>,
    scale: RatingScale,
}

impl TryFrom<RawDataset> for InteractionDataset {
    type Error = RecolabError;

    fn try_from(raw: RawDataset) -> Result<Self> {
        Self::new(raw.records, raw.scale)
    }
}

impl InteractionDataset {
    /// Build a dataset, rejecting any rating that is NaN or outside `scale`.
    pub fn new(records: Vec<Interaction>, scale: RatingScale) -> Result<Self> {
        scale.validate()?;
        for (row, rec) in records.iter().enumerate() {
            if !rec.rating.is_finite() {
                return Err(RecolabError::malformed(
                    Some(row),
                    format!("rating {} is not a finite number", rec.rating),
                ));
            }
            if !scale.contains(rec.rating) {
                return Err(RecolabError::malformed(
                    Some(row),
                    format!("rating {} outside scale {scale}", rec.rating),
                ));
            }
        }
        Ok(Self { records, scale })
    }

    pub fn records(&self) -> &[Interaction] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Interaction> {
        self.records
    }

    pub fn rating_scale(&self) -> RatingScale {
        self.scale
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct users, sorted ascending.
    pub fn unique_users(&self) -> Vec<UserId> {
        self.records
            .iter()
            .map(|r| r.user_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Distinct products, sorted ascending.
    pub fn unique_products(&self) -> Vec<ProductId> {
        self.records
            .iter()
            .map(|r| r.product_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn mean_rating(&self) -> Option<f64> {
        if self.records.is_empty() {
            return None;
        }
        Some(self.records.iter().map(|r| r.rating).sum::<f64>() / self.records.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Interaction> {
        vec![
            Interaction::new(2, 11, 2.0),
            Interaction::new(1, 10, 5.0),
            Interaction::new(1, 11, 3.0),
            Interaction::new(2, 10, 4.0),
        ]
    }

    #[test]
    fn test_dataset_accepts_valid_records() {
        let ds = InteractionDataset::new(sample(), RatingScale::default()).unwrap();
        assert_eq!(ds.len(), 4);
        assert!(!ds.is_empty());
        assert_eq!(ds.unique_users(), vec![UserId(1), UserId(2)]);
        assert_eq!(ds.unique_products(), vec![ProductId(10), ProductId(11)]);
        assert_eq!(ds.mean_rating(), Some(3.5));
    }

    #[test]
    fn test_dataset_rejects_out_of_scale_rating() {
        let mut records = sample();
        records.push(Interaction::new(3, 12, 6.0));
        let err = InteractionDataset::new(records, RatingScale::default()).unwrap_err();
        match err {
            RecolabError::MalformedRecord { row, .. } => assert_eq!(row, Some(4)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_dataset_rejects_nan_rating() {
        let records = vec![Interaction::new(1, 1, f64::NAN)];
        assert!(matches!(
            InteractionDataset::new(records, RatingScale::default()),
            Err(RecolabError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_deserialize_revalidates_ratings() {
        let ds = InteractionDataset::new(sample(), RatingScale::default()).unwrap();
        let json = serde_json::to_string(&ds).unwrap();
        let back: InteractionDataset = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ds);

        let tampered = serde_json::json!({
            "records": [{ "user_id": 1, "product_id": 10, "rating": 9.0 }],
            "scale": { "min": 1.0, "max": 5.0 }
        });
        let err = serde_json::from_value::<InteractionDataset>(tampered).unwrap_err();
        assert!(err.to_string().contains("outside scale"));
    }

    #[test]
    fn test_empty_dataset_is_allowed() {
        let ds = InteractionDataset::new(Vec::new(), RatingScale::default()).unwrap();
        assert!(ds.is_empty());
        assert_eq!(ds.mean_rating(), None);
    }
}
