//! Top-N product recommendations from a fitted model.

use recolab_core::{ProductId, RecolabError, Result, UserId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::matrix::RatingMatrix;
use crate::nmf::Factorization;
use crate::predictor::RatingPredictor;
use crate::trainset::Trainset;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub product_id: ProductId,
    pub score: f64,
}

/// Highest score first; ties go to the smaller product id.
fn rank(mut candidates: Vec<Recommendation>, n: usize) -> Vec<Recommendation> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.product_id.cmp(&b.product_id))
    });
    candidates.truncate(n);
    candidates
}

/// Rank the training products `user` has not rated by predicted rating.
pub fn top_n_for_user<P: RatingPredictor + ?Sized>(
    model: &P,
    trainset: &Trainset,
    user: UserId,
    n: usize,
) -> Result<Vec<Recommendation>> {
    let candidates = trainset
        .anti_testset_for(user)?
        .into_iter()
        .map(|product| {
            model.predict(user, product, None).map(|p| Recommendation {
                product_id: product,
                score: p.estimate,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(rank(candidates, n))
}

/// Rank the zero cells of `user`'s row by their reconstructed value.
pub fn top_n_from_factors(
    matrix: &RatingMatrix,
    factorization: &Factorization,
    user: UserId,
    n: usize,
) -> Result<Vec<Recommendation>> {
    let row = matrix.row_of(user).ok_or_else(|| {
        RecolabError::invalid_input(format!("user {user} is not in the matrix"))
    })?;
    if factorization.user_factors.nrows() != matrix.shape().0
        || factorization.product_factors.ncols() != matrix.shape().1
    {
        return Err(RecolabError::invalid_input(
            "factorization does not match the matrix shape",
        ));
    }

    let scores = factorization
        .user_factors
        .row(row)
        .dot(&factorization.product_factors);
    let observed = matrix.values().row(row);
    let candidates = matrix
        .products()
        .iter()
        .enumerate()
        .filter(|&(col, _)| observed[col] == 0.0)
        .map(|(col, &product_id)| Recommendation {
            product_id,
            score: scores[col],
        })
        .collect();
    Ok(rank(candidates, n))
}
