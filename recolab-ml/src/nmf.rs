//! Non-negative matrix factorization.
//!
//! Approximates a non-negative matrix `X` (users × products) by `W · H` where
//! `W` (users × k) and `H` (k × products) are non-negative, minimizing the
//! Frobenius norm `‖X − W·H‖`. Two solvers are provided:
//!
//! - **Coordinate descent** (default): cyclic per-component updates of `W`
//!   then `H`, each coordinate projected onto `[0, ∞)`.
//! - **Multiplicative update**: the Lee & Seung rules
//!   `H ← H ∘ (WᵀX) / (WᵀWH)` and `W ← W ∘ (XHᵀ) / (WHHᵀ)`.
//!
//! Iteration stops after `max_iter` rounds, or earlier once one round lowers
//! the error by less than `tol` relative to the initial error.

use ndarray::{Array2, ArrayView2, Zip};
use rand::SeedableRng;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use recolab_core::{RecolabError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Guards divisions in the multiplicative update.
const EPSILON: f64 = 1e-12;

/// Optimization strategy for the factor updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NmfSolver {
    #[default]
    CoordinateDescent,
    MultiplicativeUpdate,
}

/// NMF hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NmfParams {
    /// Target rank `k` of the factorization.
    #[serde(default = "default_n_components")]
    pub n_components: usize,
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    #[serde(default = "default_tol")]
    pub tol: f64,
    #[serde(default)]
    pub solver: NmfSolver,
    /// Seed for the random initialization; `None` draws from OS entropy.
    #[serde(default = "default_random_state")]
    pub random_state: Option<u64>,
}

impl Default for NmfParams {
    fn default() -> Self {
        Self {
            n_components: default_n_components(),
            max_iter: default_max_iter(),
            tol: default_tol(),
            solver: NmfSolver::default(),
            random_state: default_random_state(),
        }
    }
}

fn default_n_components() -> usize {
    10
}

fn default_max_iter() -> usize {
    200
}

fn default_tol() -> f64 {
    1e-4
}

fn default_random_state() -> Option<u64> {
    Some(42)
}

impl NmfParams {
    pub fn with_components(n_components: usize) -> Self {
        Self {
            n_components,
            ..Self::default()
        }
    }

    /// Checks that do not depend on the input matrix.
    pub fn validate(&self) -> Result<()> {
        if self.n_components == 0 {
            return Err(RecolabError::invalid_hyperparameter(
                "n_components",
                "must be at least 1",
            ));
        }
        if self.max_iter == 0 {
            return Err(RecolabError::invalid_hyperparameter(
                "max_iter",
                "must be at least 1",
            ));
        }
        if !(self.tol.is_finite() && self.tol >= 0.0) {
            return Err(RecolabError::invalid_hyperparameter(
                "tol",
                format!("must be finite and >= 0, got {}", self.tol),
            ));
        }
        Ok(())
    }

    /// `n_components` may not exceed the smaller matrix dimension.
    pub fn validate_for_shape(&self, (rows, cols): (usize, usize)) -> Result<()> {
        self.validate()?;
        let max_rank = rows.min(cols);
        if self.n_components > max_rank {
            return Err(RecolabError::invalid_hyperparameter(
                "n_components",
                format!(
                    "{} exceeds the rank bound {max_rank} of a {rows}x{cols} matrix",
                    self.n_components
                ),
            ));
        }
        Ok(())
    }
}

/// Result of factorizing a matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Factorization {
    /// `W`: one row of component weights per user.
    pub user_factors: Array2<f64>,
    /// `H`: one column of component weights per product.
    pub product_factors: Array2<f64>,
    /// Frobenius norm of `X − W·H` at the end of fitting.
    pub reconstruction_err: f64,
    /// Rounds performed.
    pub n_iter: usize,
    /// Whether the tolerance criterion stopped iteration before `max_iter`.
    pub converged: bool,
}

impl Factorization {
    pub fn n_components(&self) -> usize {
        self.user_factors.ncols()
    }

    /// `W · H`.
    pub fn reconstruct(&self) -> Array2<f64> {
        self.user_factors.dot(&self.product_factors)
    }
}

/// A method that splits a matrix into user and product factors.
pub trait Factorizer {
    fn name(&self) -> &str;

    fn factorize(&self, matrix: ArrayView2<'_, f64>) -> Result<Factorization>;
}

/// NMF factorizer.
#[derive(Debug, Clone)]
pub struct Nmf {
    params: NmfParams,
}

impl Nmf {
    pub fn new(params: NmfParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &NmfParams {
        &self.params
    }

    /// Compute user factors for new rows against the fitted product factors.
    ///
    /// `rows` must have as many columns as `fitted` has products. Only `W` is
    /// optimized; `H` stays fixed.
    pub fn transform(
        &self,
        fitted: &Factorization,
        rows: ArrayView2<'_, f64>,
    ) -> Result<Array2<f64>> {
        let h = &fitted.product_factors;
        if rows.ncols() != h.ncols() {
            return Err(RecolabError::invalid_input(format!(
                "expected {} columns, got {}",
                h.ncols(),
                rows.ncols()
            )));
        }
        check_non_negative(rows)?;

        let k = h.nrows();
        let scale = initial_scale(rows, k);
        let mut w = Array2::from_elem((rows.nrows(), k), scale);
        let hht = h.dot(&h.t());
        let xht = rows.dot(&h.t());
        for _ in 0..self.params.max_iter {
            match self.params.solver {
                NmfSolver::CoordinateDescent => coordinate_descent_step(&mut w, &hht, &xht),
                NmfSolver::MultiplicativeUpdate => {
                    let denom = w.dot(&hht);
                    multiplicative_step(&mut w, &xht, &denom);
                }
            }
        }
        Ok(w)
    }

    fn rng(&self) -> StdRng {
        match self.params.random_state {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

impl Factorizer for Nmf {
    fn name(&self) -> &str {
        "nmf"
    }

    fn factorize(&self, x: ArrayView2<'_, f64>) -> Result<Factorization> {
        if x.is_empty() {
            return Err(RecolabError::empty_dataset("cannot factorize an empty matrix"));
        }
        self.params.validate_for_shape(x.dim())?;
        check_non_negative(x)?;

        let (n_rows, n_cols) = x.dim();
        let k = self.params.n_components;

        // Uniform init scaled so that W·H starts near the mean of X.
        let scale = initial_scale(x, k);
        let dist = Uniform::new_inclusive(0.1 * scale, scale);
        let mut rng = self.rng();
        let mut w = Array2::from_shape_fn((n_rows, k), |_| dist.sample(&mut rng));
        let mut h = Array2::from_shape_fn((k, n_cols), |_| dist.sample(&mut rng));

        let initial_err = frobenius_error(x, &w, &h);
        let mut previous_err = initial_err;
        let mut err = initial_err;
        let mut n_iter = 0;
        let mut converged = false;

        while n_iter < self.params.max_iter {
            match self.params.solver {
                NmfSolver::CoordinateDescent => {
                    let hht = h.dot(&h.t());
                    let xht = x.dot(&h.t());
                    coordinate_descent_step(&mut w, &hht, &xht);

                    // Same update on the transposed problem for H.
                    let wtw = w.t().dot(&w);
                    let xtw = x.t().dot(&w);
                    let mut ht = h.t().to_owned();
                    coordinate_descent_step(&mut ht, &wtw, &xtw);
                    h = ht.reversed_axes();
                }
                NmfSolver::MultiplicativeUpdate => {
                    let wtx = w.t().dot(&x);
                    let wtwh = w.t().dot(&w).dot(&h);
                    multiplicative_step(&mut h, &wtx, &wtwh);

                    let xht = x.dot(&h.t());
                    let whht = w.dot(&h.dot(&h.t()));
                    multiplicative_step(&mut w, &xht, &whht);
                }
            }
            n_iter += 1;
            err = frobenius_error(x, &w, &h);

            if err == 0.0
                || (initial_err > 0.0 && (previous_err - err) / initial_err < self.params.tol)
            {
                converged = true;
                break;
            }
            previous_err = err;
        }

        debug!(initial_err, final_err = err, n_iter, "NMF iterations finished");
        info!(
            rows = n_rows,
            cols = n_cols,
            components = k,
            solver = ?self.params.solver,
            n_iter,
            converged,
            reconstruction_err = err,
            "Fitted NMF"
        );

        Ok(Factorization {
            user_factors: w,
            product_factors: h,
            reconstruction_err: err,
            n_iter,
            converged,
        })
    }
}

fn check_non_negative(x: ArrayView2<'_, f64>) -> Result<()> {
    if let Some(bad) = x.iter().find(|v| !v.is_finite() || **v < 0.0) {
        return Err(RecolabError::invalid_input(format!(
            "NMF input must be finite and non-negative, found {bad}"
        )));
    }
    Ok(())
}

fn initial_scale(x: ArrayView2<'_, f64>, k: usize) -> f64 {
    let mean = x.mean().unwrap_or(0.0);
    (mean / k as f64).sqrt()
}

fn frobenius_error(x: ArrayView2<'_, f64>, w: &Array2<f64>, h: &Array2<f64>) -> f64 {
    let residual = &x - &w.dot(h);
    residual.mapv(|v| v * v).sum().sqrt()
}

/// One cyclic pass over the columns of `w` for `min ‖X − W·H‖` with `H` fixed.
///
/// `hht` is `H·Hᵀ` (k × k), `xht` is `X·Hᵀ` (rows × k). Each coordinate takes
/// a projected Newton step, so `w` stays non-negative.
fn coordinate_descent_step(w: &mut Array2<f64>, hht: &Array2<f64>, xht: &Array2<f64>) {
    let (n_rows, k) = w.dim();
    for t in 0..k {
        let hess = hht[[t, t]];
        if hess == 0.0 {
            continue;
        }
        for i in 0..n_rows {
            let mut grad = -xht[[i, t]];
            for r in 0..k {
                grad += hht[[t, r]] * w[[i, r]];
            }
            w[[i, t]] = (w[[i, t]] - grad / hess).max(0.0);
        }
    }
}

fn multiplicative_step(base: &mut Array2<f64>, numer: &Array2<f64>, denom: &Array2<f64>) {
    Zip::from(base).and(numer).and(denom).for_each(|b, &n, &d| {
        *b *= n / (d + EPSILON);
        if !b.is_finite() {
            *b = 0.0;
        }
    });
}
