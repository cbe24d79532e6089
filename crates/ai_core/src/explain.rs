//! Per-prediction attribution
//!
//! `explain` turns a fitted classifier and one encoded record into the
//! `k` features that moved this prediction the most. Contributions come from
//! the first strategy the model supports:
//!
//! 1. exact Shapley values (tree ensembles)
//! 2. `x[i] * coefficient[i]`
//! 3. `x[i] * importance[i]`
//! 4. `x[i]`
//!
//! A failing Shapley computation is logged and skipped; attribution never
//! fails a prediction.

use crate::errors::{CoreError, Result};
use crate::model::Classifier;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Whether a feature pushed the churn score up or down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increase,
    Decrease,
}

impl Direction {
    /// Only a strictly positive impact counts as an increase; zero is a decrease.
    pub fn of(impact: f64) -> Self {
        if impact > 0.0 {
            Direction::Increase
        } else {
            Direction::Decrease
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Increase => write!(f, "increase"),
            Direction::Decrease => write!(f, "decrease"),
        }
    }
}

/// One feature's signed contribution to a prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    pub feature: String,
    pub impact: f64,
    pub direction: Direction,
}

impl Attribution {
    pub fn new(feature: impl Into<String>, impact: f64) -> Self {
        Self {
            feature: feature.into(),
            impact,
            direction: Direction::of(impact),
        }
    }
}

/// Which cascade step produced the contributions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionMethod {
    Shapley,
    Linear,
    Importance,
    RawValue,
}

/// Rank the top `k` features for one prediction
///
/// Returns exactly `min(k, feature_names.len())` entries sorted by
/// descending absolute impact, ties kept in feature order.
pub fn explain(
    model: &dyn Classifier,
    features: &[f64],
    feature_names: &[String],
    k: usize,
) -> Result<Vec<Attribution>> {
    explain_with_method(model, features, feature_names, k).map(|(ranked, _)| ranked)
}

/// [`explain`], also reporting which strategy was used
pub fn explain_with_method(
    model: &dyn Classifier,
    features: &[f64],
    feature_names: &[String],
    k: usize,
) -> Result<(Vec<Attribution>, AttributionMethod)> {
    if features.len() != feature_names.len() {
        return Err(CoreError::FeatureMismatch {
            vector: features.len(),
            names: feature_names.len(),
        });
    }

    let (contributions, method) = contributions(model, features);
    Ok((rank(&contributions, feature_names, k), method))
}

/// Signed per-feature contributions from the first applicable strategy
pub fn contributions(model: &dyn Classifier, features: &[f64]) -> (Vec<f64>, AttributionMethod) {
    match model.shapley_values(features) {
        Some(Ok(values)) if values.len() == features.len() => {
            return (values, AttributionMethod::Shapley)
        }
        Some(Ok(values)) => debug!(
            got = values.len(),
            expected = features.len(),
            "shapley values have the wrong width, falling back"
        ),
        Some(Err(err)) => debug!(error = %err, "shapley attribution failed, falling back"),
        None => {}
    }

    if let Some(weighted) = model.coefficients().and_then(|c| weighted(features, c)) {
        return (weighted, AttributionMethod::Linear);
    }

    if let Some(weighted) = model
        .feature_importances()
        .and_then(|imp| weighted(features, &imp))
    {
        return (weighted, AttributionMethod::Importance);
    }

    (features.to_vec(), AttributionMethod::RawValue)
}

fn weighted(features: &[f64], weights: &[f64]) -> Option<Vec<f64>> {
    if weights.len() != features.len() {
        debug!(
            weights = weights.len(),
            features = features.len(),
            "weight vector width mismatch, skipping"
        );
        return None;
    }
    Some(features.iter().zip(weights).map(|(x, w)| x * w).collect())
}

/// Stable descending sort by absolute contribution, truncated to `k`
pub fn rank(contributions: &[f64], feature_names: &[String], k: usize) -> Vec<Attribution> {
    let mut order: Vec<usize> = (0..contributions.len()).collect();
    order.sort_by(|&a, &b| contributions[b].abs().total_cmp(&contributions[a].abs()));

    order
        .into_iter()
        .take(k)
        .map(|i| Attribution::new(feature_names[i].clone(), contributions[i]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gbdt::ShapError;
    use crate::model::Capability;

    fn names(n: &[&str]) -> Vec<String> {
        n.iter().map(|s| s.to_string()).collect()
    }

    /// Test double exposing any combination of capabilities
    #[derive(Default)]
    struct Probe {
        shap: Option<std::result::Result<Vec<f64>, ()>>,
        coef: Option<Vec<f64>>,
        importances: Option<Vec<f64>>,
    }

    impl Classifier for Probe {
        fn predict_proba(&self, _features: &[f64]) -> f64 {
            0.5
        }

        fn shapley_values(&self, _f: &[f64]) -> Option<std::result::Result<Vec<f64>, ShapError>> {
            self.shap
                .clone()
                .map(|r| r.map_err(|_| ShapError::Malformed("probe".into())))
        }

        fn coefficients(&self) -> Option<&[f64]> {
            self.coef.as_deref()
        }

        fn feature_importances(&self) -> Option<Vec<f64>> {
            self.importances.clone()
        }

        fn capabilities(&self) -> Vec<Capability> {
            Vec::new()
        }
    }

    #[test]
    fn test_shapley_wins_when_available() {
        let model = Probe {
            shap: Some(Ok(vec![0.1, -0.9, 0.3])),
            coef: Some(vec![10.0, 10.0, 10.0]),
            ..Default::default()
        };
        let (ranked, method) =
            explain_with_method(&model, &[1.0, 1.0, 1.0], &names(&["a", "b", "c"]), 2).unwrap();
        assert_eq!(method, AttributionMethod::Shapley);
        assert_eq!(ranked[0], Attribution::new("b", -0.9));
        assert_eq!(ranked[0].direction, Direction::Decrease);
        assert_eq!(ranked[1], Attribution::new("c", 0.3));
    }

    #[test]
    fn test_failed_shapley_falls_through_to_linear() {
        let model = Probe {
            shap: Some(Err(())),
            coef: Some(vec![2.0, -3.0]),
            importances: Some(vec![100.0, 100.0]),
        };
        let (ranked, method) =
            explain_with_method(&model, &[1.0, 1.0], &names(&["a", "b"]), 5).unwrap();
        assert_eq!(method, AttributionMethod::Linear);
        assert_eq!(ranked, vec![Attribution::new("b", -3.0), Attribution::new("a", 2.0)]);
    }

    #[test]
    fn test_importance_only_model_uses_product_exactly() {
        let model = Probe {
            importances: Some(vec![0.25, 0.5, 0.125]),
            ..Default::default()
        };
        let x = [4.0, -3.0, 8.0];
        let (ranked, method) = explain_with_method(&model, &x, &names(&["a", "b", "c"]), 3).unwrap();
        assert_eq!(method, AttributionMethod::Importance);
        assert_eq!(ranked[0].feature, "b");
        assert_eq!(ranked[0].impact, -1.5);
        // a and c tie at 1.0; feature order breaks the tie
        assert_eq!(ranked[1], Attribution::new("a", 1.0));
        assert_eq!(ranked[2], Attribution::new("c", 1.0));
    }

    #[test]
    fn test_unrecognized_model_uses_raw_values() {
        let model = Probe::default();
        let (ranked, method) =
            explain_with_method(&model, &[0.0, -2.0, 1.0], &names(&["a", "b", "c"]), 3).unwrap();
        assert_eq!(method, AttributionMethod::RawValue);
        assert_eq!(ranked[0], Attribution::new("b", -2.0));
        assert_eq!(ranked[2], Attribution::new("a", 0.0));
        assert_eq!(ranked[2].direction, Direction::Decrease);
    }

    #[test]
    fn test_mismatched_coefficients_are_skipped() {
        let model = Probe {
            coef: Some(vec![1.0]),
            importances: Some(vec![3.0, 3.0]),
            ..Default::default()
        };
        let (_, method) = explain_with_method(&model, &[1.0, 1.0], &names(&["a", "b"]), 1).unwrap();
        assert_eq!(method, AttributionMethod::Importance);
    }

    #[test]
    fn test_k_larger_than_feature_count() {
        let ranked = explain(&Probe::default(), &[1.0, 2.0, 3.0], &names(&["a", "b", "c"]), 5).unwrap();
        assert_eq!(ranked.len(), 3);
    }

    #[test]
    fn test_k_zero_is_empty() {
        let ranked = explain(&Probe::default(), &[1.0], &names(&["a"]), 0).unwrap();
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let err = explain(&Probe::default(), &[1.0, 2.0], &names(&["a"]), 1).unwrap_err();
        assert!(matches!(err, CoreError::FeatureMismatch { vector: 2, names: 1 }));
    }

    #[test]
    fn test_zero_impact_is_decrease() {
        assert_eq!(Direction::of(0.0), Direction::Decrease);
        assert_eq!(Direction::of(-0.0), Direction::Decrease);
        assert_eq!(Direction::of(f64::MIN_POSITIVE), Direction::Increase);
    }

    #[test]
    fn test_direction_serializes_lowercase() {
        let json = serde_json::to_value(Attribution::new("tenure", 1.5)).unwrap();
        assert_eq!(json["direction"], "increase");
        assert_eq!(json["feature"], "tenure");
    }
}
