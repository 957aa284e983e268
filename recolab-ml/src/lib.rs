//! # recolab-ml
//!
//! Recommendation pipelines over the interaction data loaded by `recolab-core`.
//!
//! - **Collaborative filtering**: train/test split, an SGD latent-factor model
//!   with user and product biases, and MSE/RMSE/MAE evaluation with K-fold
//!   cross validation.
//! - **Matrix factorization**: pivot to a labelled user × product matrix,
//!   zero-fill missing cells and factorize with non-negative matrix
//!   factorization.
//!
//! Both pipelines are single-threaded and blocking. Configuration is layered
//! with `figment`; see [`config::load_config`].

pub mod accuracy;
pub mod config;
pub mod matrix;
pub mod nmf;
pub mod pipeline;
pub mod predictor;
pub mod recommend;
pub mod split;
pub mod svd;
pub mod trainset;
pub mod validation;

// Re-exports
pub use accuracy::{EvaluationReport, evaluate, mae, mse, rmse};
pub use config::{RecommenderConfig, SplitConfig, load_config};
pub use matrix::{PivotTable, RatingMatrix};
pub use nmf::{Factorization, Factorizer, Nmf, NmfParams, NmfSolver};
pub use pipeline::{
    CollaborativeFilteringOutcome, CollaborativeFilteringPipeline, MatrixFactorizationOutcome,
    MatrixFactorizationPipeline, PipelineKind, PipelineRun,
};
pub use predictor::{Prediction, PredictionDetails, RatingPredictor};
pub use recommend::{Recommendation, top_n_for_user, top_n_from_factors};
pub use split::{KFold, TrainTestSplit, train_test_split};
pub use svd::{Svd, SvdParams, TrainingHistory};
pub use trainset::Trainset;
pub use validation::{CrossValidationResult, cross_validate};
