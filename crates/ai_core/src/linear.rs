//! Logistic regression classifier
use crate::errors::{CoreError, Result};
use crate::model::sigmoid;
use serde::{Deserialize, Serialize};

/// Binary logistic regression over the encoded feature vector
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogisticModel {
    /// One coefficient per encoded feature
    pub coefficients: Vec<f64>,

    /// Intercept term in log-odds units
    pub intercept: f64,
}

impl LogisticModel {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Self {
        Self {
            coefficients,
            intercept,
        }
    }

    pub fn feature_count(&self) -> usize {
        self.coefficients.len()
    }

    pub fn validate(&self) -> Result<()> {
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(CoreError::ValidationFailed(
                "Logistic model has non-finite parameters".into(),
            ));
        }
        Ok(())
    }

    pub fn margin(&self, features: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .zip(features)
            .fold(self.intercept, |z, (c, x)| z + c * x)
    }

    pub fn predict_proba(&self, features: &[f64]) -> f64 {
        sigmoid(self.margin(features))
    }
}
