//! Churnlens trainer - offline model fitting
//!
//! Loads the Telco churn CSV, fits the preprocessor and a classifier on a
//! stratified split, evaluates on the held-out rows and produces the
//! artifact bundle the service loads.

pub mod cart;
pub mod dataset;
pub mod deterministic;
pub mod errors;
pub mod metrics;
pub mod trainer;

use churnlens_ai_core::{ArtifactBundle, ChurnModel, Classifier, ModelKind, Preprocessor};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

pub use dataset::{Dataset, TelcoDataset};
pub use deterministic::{stratified_split, LcgRng};
pub use errors::{Result, TrainerError};
pub use metrics::{roc_auc, ClassificationReport};
pub use trainer::{GbdtParams, GbdtTrainer, LogisticParams, LogisticTrainer};

/// Decision threshold for the classification report
pub const REPORT_THRESHOLD: f64 = 0.5;

/// Everything a training run needs
#[derive(Clone, Debug)]
pub struct TrainingConfig {
    pub model: ModelKind,
    pub gbdt: GbdtParams,
    pub logistic: LogisticParams,
    /// Share of rows held out for evaluation
    pub test_size: f64,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            model: ModelKind::Gbdt,
            gbdt: GbdtParams::default(),
            logistic: LogisticParams::default(),
            test_size: 0.2,
            seed: 42,
        }
    }
}

/// Hold-out metrics of a training run
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub train_rows: usize,
    pub test_rows: usize,
    pub roc_auc: Option<f64>,
    pub report: ClassificationReport,
}

/// Fitted bundle plus its evaluation
#[derive(Debug)]
pub struct TrainingOutcome {
    pub bundle: ArtifactBundle,
    pub evaluation: Evaluation,
}

/// Fit preprocessor and model on a loaded dataset
pub fn train(data: &TelcoDataset, config: &TrainingConfig) -> Result<TrainingOutcome> {
    if !(config.test_size > 0.0 && config.test_size < 1.0) {
        return Err(TrainerError::InvalidParameter(format!(
            "test_size must be in (0, 1), got {}",
            config.test_size
        )));
    }

    let preprocessor = Preprocessor::fit(&data.records)?;
    let encoded = data.encode(&preprocessor)?;
    info!(
        rows = encoded.len(),
        features = encoded.feature_count,
        churn_rate = data.churn_rate(),
        "dataset encoded"
    );
    let constant = encoded
        .feature_stats()
        .iter()
        .filter(|(min, max)| min == max)
        .count();
    if constant > 0 {
        debug!(constant, "features without variation in training data");
    }

    let (train_idx, test_idx) = stratified_split(&encoded.targets, config.test_size, config.seed);
    let train_set = encoded.subset(&train_idx);
    let test_set = encoded.subset(&test_idx);

    let model = match config.model {
        ModelKind::Gbdt => {
            let params = GbdtParams {
                seed: config.seed,
                ..config.gbdt.clone()
            };
            ChurnModel::Gbdt(GbdtTrainer::new(params).train(&train_set)?)
        }
        ModelKind::Logistic => {
            ChurnModel::Logistic(LogisticTrainer::new(config.logistic.clone()).train(&train_set)?)
        }
    };

    let evaluation = evaluate(&model, &train_set, &test_set);
    Ok(TrainingOutcome {
        bundle: ArtifactBundle::new(model, preprocessor),
        evaluation,
    })
}

/// Load `input`, train, and write the bundle to `output`
pub fn train_from_csv(input: &Path, output: &Path, config: &TrainingConfig) -> Result<TrainingOutcome> {
    let data = TelcoDataset::from_csv(input)?;
    info!(rows = data.len(), path = %input.display(), "dataset loaded");
    let outcome = train(&data, config)?;
    let manifest = outcome.bundle.save(output)?;
    for (file, hash) in &manifest.hashes {
        info!(file = %file, hash = %hash, "artifact hash");
    }
    Ok(outcome)
}

fn evaluate(model: &ChurnModel, train_set: &Dataset, test_set: &Dataset) -> Evaluation {
    let probabilities: Vec<f64> = test_set
        .features
        .iter()
        .map(|row| model.predict_proba(row))
        .collect();
    Evaluation {
        train_rows: train_set.len(),
        test_rows: test_set.len(),
        roc_auc: roc_auc(&probabilities, &test_set.targets),
        report: ClassificationReport::from_probabilities(
            &probabilities,
            &test_set.targets,
            REPORT_THRESHOLD,
        ),
    }
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
