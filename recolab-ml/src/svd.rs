//! Latent-factor rating model trained by stochastic gradient descent.
//!
//! The estimate for user `u` and product `i` is
//! `r̂ = μ + b_u + b_i + q_iᵀ p_u` (biased form) or `q_iᵀ p_u` (unbiased form).
//! Parameters are updated once per training rating per epoch, in trainset order.
//!
//! Cold start: a user or product absent from training contributes no bias and
//! no factor term, so an unseen pair falls back to the global mean. The
//! prediction is flagged `cold_start` and is never dropped.

use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use recolab_core::{ProductId, RatingScale, RecolabError, Result, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::predictor::{Prediction, PredictionDetails, RatingPredictor};
use crate::trainset::Trainset;

/// Hyperparameters of the SGD latent-factor model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvdParams {
    /// Number of latent factors.
    #[serde(default = "default_n_factors")]
    pub n_factors: usize,
    /// Passes over the training ratings.
    #[serde(default = "default_n_epochs")]
    pub n_epochs: usize,
    /// Learn user/product biases and the global mean term.
    #[serde(default = "default_true")]
    pub biased: bool,
    #[serde(default)]
    pub init_mean: f64,
    #[serde(default = "default_init_std_dev")]
    pub init_std_dev: f64,
    /// Learning rate for every parameter unless overridden below.
    #[serde(default = "default_lr_all")]
    pub lr_all: f64,
    /// Regularization for every parameter unless overridden below.
    #[serde(default = "default_reg_all")]
    pub reg_all: f64,
    #[serde(default)]
    pub lr_bu: Option<f64>,
    #[serde(default)]
    pub lr_bi: Option<f64>,
    #[serde(default)]
    pub lr_pu: Option<f64>,
    #[serde(default)]
    pub lr_qi: Option<f64>,
    #[serde(default)]
    pub reg_bu: Option<f64>,
    #[serde(default)]
    pub reg_bi: Option<f64>,
    #[serde(default)]
    pub reg_pu: Option<f64>,
    #[serde(default)]
    pub reg_qi: Option<f64>,
    /// Seed for factor initialization; `None` draws from OS entropy.
    #[serde(default = "default_random_state")]
    pub random_state: Option<u64>,
}

impl Default for SvdParams {
    fn default() -> Self {
        Self {
            n_factors: default_n_factors(),
            n_epochs: default_n_epochs(),
            biased: true,
            init_mean: 0.0,
            init_std_dev: default_init_std_dev(),
            lr_all: default_lr_all(),
            reg_all: default_reg_all(),
            lr_bu: None,
            lr_bi: None,
            lr_pu: None,
            lr_qi: None,
            reg_bu: None,
            reg_bi: None,
            reg_pu: None,
            reg_qi: None,
            random_state: default_random_state(),
        }
    }
}

fn default_n_factors() -> usize {
    100
}

fn default_n_epochs() -> usize {
    20
}

fn default_true() -> bool {
    true
}

fn default_init_std_dev() -> f64 {
    0.1
}

fn default_lr_all() -> f64 {
    0.005
}

fn default_reg_all() -> f64 {
    0.02
}

fn default_random_state() -> Option<u64> {
    Some(42)
}

/// Effective per-parameter learning rates and regularization terms.
#[derive(Debug, Clone, Copy)]
struct Rates {
    lr_bu: f64,
    lr_bi: f64,
    lr_pu: f64,
    lr_qi: f64,
    reg_bu: f64,
    reg_bi: f64,
    reg_pu: f64,
    reg_qi: f64,
}

impl SvdParams {
    pub fn validate(&self) -> Result<()> {
        if self.n_factors == 0 {
            return Err(RecolabError::invalid_hyperparameter(
                "n_factors",
                "must be at least 1",
            ));
        }
        if self.n_epochs == 0 {
            return Err(RecolabError::invalid_hyperparameter(
                "n_epochs",
                "must be at least 1",
            ));
        }
        if !self.init_mean.is_finite() {
            return Err(RecolabError::invalid_hyperparameter(
                "init_mean",
                "must be finite",
            ));
        }
        if !(self.init_std_dev.is_finite() && self.init_std_dev >= 0.0) {
            return Err(RecolabError::invalid_hyperparameter(
                "init_std_dev",
                format!("must be finite and >= 0, got {}", self.init_std_dev),
            ));
        }
        self.init_distribution()?;
        let rates = self.rates();
        for (name, lr) in [
            ("lr_bu", rates.lr_bu),
            ("lr_bi", rates.lr_bi),
            ("lr_pu", rates.lr_pu),
            ("lr_qi", rates.lr_qi),
        ] {
            if !(lr.is_finite() && lr > 0.0) {
                return Err(RecolabError::invalid_hyperparameter(
                    name,
                    format!("learning rate must be > 0, got {lr}"),
                ));
            }
        }
        for (name, reg) in [
            ("reg_bu", rates.reg_bu),
            ("reg_bi", rates.reg_bi),
            ("reg_pu", rates.reg_pu),
            ("reg_qi", rates.reg_qi),
        ] {
            if !(reg.is_finite() && reg >= 0.0) {
                return Err(RecolabError::invalid_hyperparameter(
                    name,
                    format!("regularization must be >= 0, got {reg}"),
                ));
            }
        }
        Ok(())
    }

    /// Normal distribution the latent factors are drawn from.
    fn init_distribution(&self) -> Result<Normal<f64>> {
        Normal::new(self.init_mean, self.init_std_dev)
            .map_err(|e| RecolabError::invalid_hyperparameter("init_std_dev", e.to_string()))
    }

    fn rates(&self) -> Rates {
        Rates {
            lr_bu: self.lr_bu.unwrap_or(self.lr_all),
            lr_bi: self.lr_bi.unwrap_or(self.lr_all),
            lr_pu: self.lr_pu.unwrap_or(self.lr_all),
            lr_qi: self.lr_qi.unwrap_or(self.lr_all),
            reg_bu: self.reg_bu.unwrap_or(self.reg_all),
            reg_bi: self.reg_bi.unwrap_or(self.reg_all),
            reg_pu: self.reg_pu.unwrap_or(self.reg_all),
            reg_qi: self.reg_qi.unwrap_or(self.reg_all),
        }
    }
}

/// Mean squared training error after each epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epoch_mse: Vec<f64>,
}

impl TrainingHistory {
    pub fn epochs_completed(&self) -> usize {
        self.epoch_mse.len()
    }

    pub fn final_mse(&self) -> Option<f64> {
        self.epoch_mse.last().copied()
    }
}

/// Learned parameters.
#[derive(Debug, Clone)]
struct FittedSvd {
    scale: RatingScale,
    global_mean: f64,
    user_index: HashMap<UserId, usize>,
    product_index: HashMap<ProductId, usize>,
    bu: Array1<f64>,
    bi: Array1<f64>,
    pu: Array2<f64>,
    qi: Array2<f64>,
    history: TrainingHistory,
}

/// SGD matrix-factorization recommender.
#[derive(Debug, Clone)]
pub struct Svd {
    params: SvdParams,
    fitted: Option<FittedSvd>,
}

impl Svd {
    pub fn new(params: SvdParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            fitted: None,
        })
    }

    pub fn params(&self) -> &SvdParams {
        &self.params
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    pub fn history(&self) -> Option<&TrainingHistory> {
        self.fitted.as_ref().map(|f| &f.history)
    }

    /// User factor matrix (users × n_factors), rows in trainset order.
    pub fn user_factors(&self) -> Option<&Array2<f64>> {
        self.fitted.as_ref().map(|f| &f.pu)
    }

    /// Product factor matrix (products × n_factors), rows in trainset order.
    pub fn product_factors(&self) -> Option<&Array2<f64>> {
        self.fitted.as_ref().map(|f| &f.qi)
    }

    pub fn user_bias(&self, user: UserId) -> Option<f64> {
        let f = self.fitted.as_ref()?;
        f.user_index.get(&user).map(|&u| f.bu[u])
    }

    pub fn product_bias(&self, product: ProductId) -> Option<f64> {
        let f = self.fitted.as_ref()?;
        f.product_index.get(&product).map(|&i| f.bi[i])
    }

    fn init_factors(&self, dist: &Normal<f64>, rng: &mut StdRng, rows: usize) -> Array2<f64> {
        Array2::from_shape_fn((rows, self.params.n_factors), |_| dist.sample(&mut *rng))
    }
}

impl FittedSvd {
    fn estimate(&self, u: Option<usize>, i: Option<usize>, biased: bool) -> f64 {
        let dot = match (u, i) {
            (Some(u), Some(i)) => Some(self.pu.row(u).dot(&self.qi.row(i))),
            _ => None,
        };
        let raw = if biased {
            let mut est = self.global_mean;
            if let Some(u) = u {
                est += self.bu[u];
            }
            if let Some(i) = i {
                est += self.bi[i];
            }
            est + dot.unwrap_or(0.0)
        } else {
            dot.unwrap_or(self.global_mean)
        };
        self.scale.clip(raw)
    }
}

impl RatingPredictor for Svd {
    fn name(&self) -> &str {
        "svd"
    }

    fn fit(&mut self, trainset: &Trainset) -> Result<()> {
        let rates = self.params.rates();
        let biased = self.params.biased;
        let mut rng = match self.params.random_state {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let n_users = trainset.n_users();
        let n_products = trainset.n_products();
        let k = self.params.n_factors;
        let mu = trainset.global_mean();

        let mut bu = Array1::<f64>::zeros(n_users);
        let mut bi = Array1::<f64>::zeros(n_products);
        let init = self.params.init_distribution()?;
        let mut pu = self.init_factors(&init, &mut rng, n_users);
        let mut qi = self.init_factors(&init, &mut rng, n_products);
        let mut history = TrainingHistory::default();

        for epoch in 0..self.params.n_epochs {
            let mut squared = 0.0;
            for &(u, i, r) in trainset.all_ratings() {
                let dot = pu.row(u).dot(&qi.row(i));
                let est = if biased { mu + bu[u] + bi[i] + dot } else { dot };
                let err = r - est;
                squared += err * err;

                if biased {
                    bu[u] += rates.lr_bu * (err - rates.reg_bu * bu[u]);
                    bi[i] += rates.lr_bi * (err - rates.reg_bi * bi[i]);
                }
                for f in 0..k {
                    let puf = pu[[u, f]];
                    let qif = qi[[i, f]];
                    pu[[u, f]] += rates.lr_pu * (err * qif - rates.reg_pu * puf);
                    qi[[i, f]] += rates.lr_qi * (err * puf - rates.reg_qi * qif);
                }
            }
            let epoch_mse = squared / trainset.n_ratings() as f64;
            debug!(epoch, mse = epoch_mse, "SVD epoch complete");
            history.epoch_mse.push(epoch_mse);
        }

        info!(
            users = n_users,
            products = n_products,
            ratings = trainset.n_ratings(),
            factors = k,
            epochs = self.params.n_epochs,
            final_mse = history.final_mse().unwrap_or(f64::NAN),
            "Fitted SVD model"
        );

        self.fitted = Some(FittedSvd {
            scale: trainset.rating_scale(),
            global_mean: mu,
            user_index: trainset.user_index().clone(),
            product_index: trainset.product_index().clone(),
            bu,
            bi,
            pu,
            qi,
            history,
        });
        Ok(())
    }

    fn predict(
        &self,
        user: UserId,
        product: ProductId,
        actual: Option<f64>,
    ) -> Result<Prediction> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or_else(|| RecolabError::invalid_input("svd model has not been fitted"))?;
        let u = fitted.user_index.get(&user).copied();
        let i = fitted.product_index.get(&product).copied();
        let details = PredictionDetails {
            known_user: u.is_some(),
            known_product: i.is_some(),
            cold_start: u.is_none() || i.is_none(),
        };
        Ok(Prediction {
            user_id: user,
            product_id: product,
            actual,
            estimate: fitted.estimate(u, i, self.params.biased),
            details,
        })
    }
}
