//! End-to-end pipeline drivers.
//!
//! Collaborative filtering: load -> split -> fit SVD -> evaluate.
//! Matrix factorization: load -> pivot -> fill missing with 0 -> NMF.
//!
//! Each run validates its full configuration before touching storage and
//! returns everything it produced; nothing is persisted.

use chrono::{DateTime, Utc};
use recolab_core::{
    Interaction, InteractionDataset, InteractionSource, RecolabError, Result, SourceInfo,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::accuracy::{EvaluationReport, evaluate};
use crate::config::RecommenderConfig;
use crate::matrix::{PivotTable, RatingMatrix};
use crate::nmf::{Factorization, Factorizer, Nmf};
use crate::predictor::RatingPredictor;
use crate::split::train_test_split;
use crate::svd::Svd;
use crate::trainset::Trainset;

/// Value written into cells with no observed rating before factorizing.
pub const MISSING_FILL: f64 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    CollaborativeFiltering,
    MatrixFactorization,
}

/// Record of one pipeline execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: String,
    pub pipeline: PipelineKind,
    pub source: SourceInfo,
    /// Model hyperparameters the run was fitted with.
    pub hyperparams: serde_json::Value,
    pub n_records: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PipelineRun {
    fn start(pipeline: PipelineKind, source: SourceInfo, hyperparams: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            pipeline,
            source,
            hyperparams,
            n_records: 0,
            started_at: now,
            finished_at: now,
        }
    }

    fn finish(mut self, n_records: usize) -> Self {
        self.n_records = n_records;
        self.finished_at = Utc::now();
        self
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

fn hyperparams_of<T: Serialize>(params: &T) -> Result<serde_json::Value> {
    serde_json::to_value(params)
        .map_err(|e| RecolabError::invalid_input(format!("cannot record hyperparameters: {e}")))
}

fn load(
    source: &dyn InteractionSource,
    config: &RecommenderConfig,
) -> Result<(InteractionDataset, SourceInfo)> {
    let dataset = source.load(config.rating_scale)?;
    let mut info = source.source_info();
    info.row_count = Some(dataset.len());
    info!(
        source = %info.source_type,
        location = %info.location,
        rows = dataset.len(),
        users = dataset.unique_users().len(),
        products = dataset.unique_products().len(),
        "Loaded interaction dataset"
    );
    Ok((dataset, info))
}

/// Output of the collaborative filtering pipeline.
#[derive(Debug, Clone)]
pub struct CollaborativeFilteringOutcome {
    pub run: PipelineRun,
    pub model: Svd,
    pub trainset: Trainset,
    pub testset: Vec<Interaction>,
    pub report: EvaluationReport,
}

impl CollaborativeFilteringOutcome {
    pub fn mse(&self) -> f64 {
        self.report.mse
    }
}

/// Load, split, fit SVD on the training part and score it on the held-out part.
#[derive(Debug, Clone)]
pub struct CollaborativeFilteringPipeline {
    config: RecommenderConfig,
}

impl CollaborativeFilteringPipeline {
    pub fn new(config: RecommenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RecommenderConfig {
        &self.config
    }

    pub fn run(&self, source: &dyn InteractionSource) -> Result<CollaborativeFilteringOutcome> {
        self.config.validate()?;
        let mut model = Svd::new(self.config.svd.clone())?;
        let hyperparams = hyperparams_of(&self.config.svd)?;

        let (dataset, source_info) = load(source, &self.config)?;
        let run =
            PipelineRun::start(PipelineKind::CollaborativeFiltering, source_info, hyperparams);

        let split = train_test_split(
            &dataset,
            self.config.split.test_size,
            self.config.split.random_state,
        )?;
        info!(
            run_id = %run.id,
            n_train = split.train.len(),
            n_test = split.test.len(),
            seed = self.config.split.random_state,
            "Split dataset"
        );

        let trainset = Trainset::build(&split.train, dataset.rating_scale())?;
        model.fit(&trainset)?;
        info!(
            run_id = %run.id,
            users = trainset.n_users(),
            products = trainset.n_products(),
            "Trained model"
        );

        let report = evaluate(&model, &split.test)?;
        let run = run.finish(dataset.len());
        info!(
            run_id = %run.id,
            mse = report.mse,
            cold_start = report.n_cold_start,
            "Collaborative filtering run complete"
        );

        Ok(CollaborativeFilteringOutcome {
            run,
            model,
            trainset,
            testset: split.test,
            report,
        })
    }
}

/// Output of the matrix factorization pipeline.
#[derive(Debug, Clone)]
pub struct MatrixFactorizationOutcome {
    pub run: PipelineRun,
    pub matrix: RatingMatrix,
    pub factorization: Factorization,
}

/// Load, pivot to a user × product matrix, zero-fill and factorize with NMF.
#[derive(Debug, Clone)]
pub struct MatrixFactorizationPipeline {
    config: RecommenderConfig,
}

impl MatrixFactorizationPipeline {
    pub fn new(config: RecommenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RecommenderConfig {
        &self.config
    }

    pub fn run(&self, source: &dyn InteractionSource) -> Result<MatrixFactorizationOutcome> {
        self.config.validate()?;
        let nmf = Nmf::new(self.config.nmf.clone())?;
        let hyperparams = hyperparams_of(&self.config.nmf)?;

        let (dataset, source_info) = load(source, &self.config)?;
        let run = PipelineRun::start(PipelineKind::MatrixFactorization, source_info, hyperparams);

        let pivot = PivotTable::from_dataset(&dataset)?;
        let missing = pivot.n_missing();
        let matrix = pivot.fill_missing(MISSING_FILL);
        info!(
            run_id = %run.id,
            rows = matrix.shape().0,
            cols = matrix.shape().1,
            missing,
            density = matrix.density(),
            "Built rating matrix"
        );

        let factorization = nmf.factorize(matrix.values().view())?;
        let run = run.finish(dataset.len());
        info!(
            run_id = %run.id,
            components = factorization.n_components(),
            reconstruction_err = factorization.reconstruction_err,
            "Matrix factorization run complete"
        );

        Ok(MatrixFactorizationOutcome {
            run,
            matrix,
            factorization,
        })
    }
}
