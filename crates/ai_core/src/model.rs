//! Classifier capabilities and the persisted model enum
//!
//! The attribution cascade only sees a model through [`Classifier`]: a
//! probability plus optional access to Shapley values, linear coefficients
//! and global importances. Which accessors answer decides which attribution
//! strategy runs.

use crate::errors::Result;
use crate::gbdt::{GbdtModel, ShapError};
use crate::linear::LogisticModel;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logistic link
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Optional model internals the attribution cascade can use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ShapleyValues,
    LinearCoefficients,
    TreeImportances,
}

/// A fitted binary classifier as seen by the serving path
pub trait Classifier: Send + Sync {
    /// Probability of the positive (churn) class
    fn predict_proba(&self, features: &[f64]) -> f64;

    /// Exact per-instance attribution, if the model supports one
    fn shapley_values(&self, _features: &[f64]) -> Option<std::result::Result<Vec<f64>, ShapError>> {
        None
    }

    /// Per-feature linear coefficients
    fn coefficients(&self) -> Option<&[f64]> {
        None
    }

    /// Global per-feature importances
    fn feature_importances(&self) -> Option<Vec<f64>> {
        None
    }

    /// Capabilities this model answers for
    fn capabilities(&self) -> Vec<Capability>;
}

/// The persisted classifier, tagged by kind
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChurnModel {
    Gbdt(GbdtModel),
    Logistic(LogisticModel),
}

impl ChurnModel {
    pub fn feature_count(&self) -> usize {
        match self {
            ChurnModel::Gbdt(m) => m.feature_count,
            ChurnModel::Logistic(m) => m.feature_count(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            ChurnModel::Gbdt(m) => m.validate(),
            ChurnModel::Logistic(m) => m.validate(),
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            ChurnModel::Gbdt(_) => ModelKind::Gbdt,
            ChurnModel::Logistic(_) => ModelKind::Logistic,
        }
    }
}

/// Model family tag, also used on the trainer command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Gbdt,
    Logistic,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Gbdt => write!(f, "gbdt"),
            ModelKind::Logistic => write!(f, "logistic"),
        }
    }
}

impl Classifier for ChurnModel {
    fn predict_proba(&self, features: &[f64]) -> f64 {
        match self {
            ChurnModel::Gbdt(m) => m.predict_proba(features),
            ChurnModel::Logistic(m) => m.predict_proba(features),
        }
    }

    fn shapley_values(&self, features: &[f64]) -> Option<std::result::Result<Vec<f64>, ShapError>> {
        match self {
            ChurnModel::Gbdt(m) => Some(m.shap_values(features)),
            // No background sample is persisted for linear models.
            ChurnModel::Logistic(_) => None,
        }
    }

    fn coefficients(&self) -> Option<&[f64]> {
        match self {
            ChurnModel::Logistic(m) => Some(&m.coefficients),
            ChurnModel::Gbdt(_) => None,
        }
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        match self {
            ChurnModel::Gbdt(m) => Some(m.feature_importances()),
            ChurnModel::Logistic(_) => None,
        }
    }

    fn capabilities(&self) -> Vec<Capability> {
        match self {
            ChurnModel::Gbdt(_) => vec![Capability::ShapleyValues, Capability::TreeImportances],
            ChurnModel::Logistic(_) => vec![Capability::LinearCoefficients],
        }
    }
}
