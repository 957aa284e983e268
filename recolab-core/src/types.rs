//! Identifier and record types shared by both pipelines.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{RecolabError, Result};

/// Raw user identifier as stored in the source table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// Raw product identifier as stored in the source table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

impl From<i64> for ProductId {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

/// One observed rating of a product by a user.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub rating: f64,
}

impl Interaction {
    pub fn new(user_id: i64, product_id: i64, rating: f64) -> Self {
        Self {
            user_id: UserId(user_id),
            product_id: ProductId(product_id),
            rating,
        }
    }
}

impl From<(i64, i64, f64)> for Interaction {
    fn from((user, product, rating): (i64, i64, f64)) -> Self {
        Self::new(user, product, rating)
    }
}

/// Inclusive bounds of the rating scale, e.g. 1 to 5 stars.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingScale {
    #[serde(default = "default_min")]
    pub min: f64,
    #[serde(default = "default_max")]
    pub max: f64,
}

fn default_min() -> f64 {
    1.0
}

fn default_max() -> f64 {
    5.0
}

impl Default for RatingScale {
    fn default() -> Self {
        Self {
            min: default_min(),
            max: default_max(),
        }
    }
}

impl RatingScale {
    pub fn new(min: f64, max: f64) -> Result<Self> {
        let scale = Self { min, max };
        scale.validate()?;
        Ok(scale)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(RecolabError::invalid_hyperparameter(
                "rating_scale",
                format!("bounds must be finite, got ({}, {})", self.min, self.max),
            ));
        }
        if self.min >= self.max {
            return Err(RecolabError::invalid_hyperparameter(
                "rating_scale",
                format!("min {} must be below max {}", self.min, self.max),
            ));
        }
        Ok(())
    }

    pub fn contains(&self, rating: f64) -> bool {
        rating >= self.min && rating <= self.max
    }

    pub fn clip(&self, rating: f64) -> f64 {
        rating.clamp(self.min, self.max)
    }
}

impl fmt::Display for RatingScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}
