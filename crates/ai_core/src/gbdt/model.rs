//! Gradient boosted tree classifier
//!
//! The margin is `bias + Σ tree.weight · leaf(x)` in log-odds units and the
//! churn probability is its logistic transform.

use super::shap::{tree_shap, ShapError};
use super::tree::Tree;
use crate::errors::{CoreError, Result};
use crate::model::sigmoid;
use serde::{Deserialize, Serialize};

/// Current on-disk model format version
pub const FORMAT_VERSION: i32 = 1;

/// Boosted ensemble of regression trees with a logistic link
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GbdtModel {
    /// Model format version
    pub version: i32,

    /// Decision trees in the ensemble
    pub trees: Vec<Tree>,

    /// Base margin (log-odds of the training prior)
    pub bias: f64,

    /// Width of the encoded feature vector the trees were fitted on
    pub feature_count: usize,
}

impl GbdtModel {
    pub fn new(trees: Vec<Tree>, bias: f64, feature_count: usize) -> Self {
        Self {
            version: FORMAT_VERSION,
            trees,
            bias,
            feature_count,
        }
    }

    /// Validate model structure
    pub fn validate(&self) -> Result<()> {
        if self.version != FORMAT_VERSION {
            return Err(CoreError::ValidationFailed(format!(
                "Unsupported model version: {}",
                self.version
            )));
        }
        if !self.bias.is_finite() {
            return Err(CoreError::ValidationFailed("Non-finite bias".into()));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            if !tree.weight.is_finite() {
                return Err(CoreError::ValidationFailed(format!(
                    "Tree {i} has a non-finite weight"
                )));
            }
            tree.validate(self.feature_count).map_err(|e| {
                CoreError::ValidationFailed(format!("Tree {} validation failed: {}", i, e))
            })?;
        }
        Ok(())
    }

    /// Raw ensemble output in log-odds units
    pub fn margin(&self, features: &[f64]) -> f64 {
        self.trees
            .iter()
            .fold(self.bias, |sum, tree| sum + tree.weight * tree.evaluate(features))
    }

    /// Churn probability for one encoded record
    pub fn predict_proba(&self, features: &[f64]) -> f64 {
        sigmoid(self.margin(features))
    }

    /// Total split gain per feature, normalized to sum to 1
    ///
    /// Falls back to split counts when no node carries gain statistics, and
    /// to all zeros for a forest of stumps.
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut gains = vec![0.0; self.feature_count];
        let mut splits = vec![0.0; self.feature_count];

        for node in self.trees.iter().flat_map(|t| t.nodes.iter()) {
            if node.is_leaf() {
                continue;
            }
            if let Some(slot) = gains.get_mut(node.feature_idx as usize) {
                *slot += node.gain.max(0.0);
                splits[node.feature_idx as usize] += 1.0;
            }
        }

        let source = if gains.iter().any(|g| *g > 0.0) {
            gains
        } else {
            splits
        };
        normalize(source)
    }

    /// Exact per-feature Shapley values of the margin for one record
    pub fn shap_values(&self, features: &[f64]) -> std::result::Result<Vec<f64>, ShapError> {
        if features.len() != self.feature_count {
            return Err(ShapError::WidthMismatch {
                expected: self.feature_count,
                actual: features.len(),
            });
        }
        let mut phi = vec![0.0; self.feature_count];
        for (i, tree) in self.trees.iter().enumerate() {
            let contributions = tree_shap(tree, features).map_err(|e| e.in_tree(i))?;
            for (total, c) in phi.iter_mut().zip(contributions) {
                *total += tree.weight * c;
            }
        }
        if phi.iter().any(|v| !v.is_finite()) {
            return Err(ShapError::NonFinite);
        }
        Ok(phi)
    }

    /// Expected margin over the training distribution, weighted by cover
    pub fn expected_margin(&self) -> f64 {
        self.trees.iter().fold(self.bias, |sum, tree| {
            sum + tree.weight * super::shap::expected_value(tree).unwrap_or(0.0)
        })
    }
}

fn normalize(values: Vec<f64>) -> Vec<f64> {
    let total: f64 = values.iter().sum();
    if total <= 0.0 {
        return values;
    }
    values.into_iter().map(|v| v / total).collect()
}
