//! Churn risk core
//!
//! Scores telecom customers for churn risk and explains each score.
//!
//! Modules:
//! - `features`: Record cleaning and one-hot encoding (`Preprocessor`)
//! - `gbdt`: Gradient boosted trees with exact TreeSHAP attribution
//! - `linear`: Logistic regression
//! - `model`: The `Classifier` capability trait and persisted model enum
//! - `explain`: Ranked per-prediction attribution with fallback cascade
//! - `recommend`: Rule table mapping attributions to retention actions
//! - `risk`: Probability to risk tier
//! - `artifacts`: Hashed artifact bundle persistence
//! - `tabular`: CSV input
//! - `serde_canon`: Canonical JSON and blake3 hashing

pub mod artifacts;
pub mod errors;
pub mod explain;
pub mod features;
pub mod gbdt;
pub mod linear;
pub mod model;
pub mod recommend;
pub mod risk;
pub mod serde_canon;
pub mod tabular;

pub use artifacts::{ArtifactBundle, ArtifactError, Manifest};
pub use errors::{CoreError, Result};
pub use explain::{explain, Attribution, AttributionMethod, Direction};
pub use features::{FeatureVector, Preprocessor, RawRecord, CATEGORICAL_COLUMNS, NUMERIC_COLUMNS};
pub use gbdt::{GbdtModel, Node, ShapError, Tree};
pub use linear::LogisticModel;
pub use model::{sigmoid, Capability, ChurnModel, Classifier, ModelKind};
pub use recommend::{recommend, ActionRule, ACTION_RULES, DEFAULT_ACTIONS};
pub use risk::RiskTier;
pub use tabular::{read_table, Table};

use serde::{Deserialize, Serialize};

/// Crate version string reported by the service
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Label column of the Telco churn dataset
pub const LABEL_COLUMN: &str = "Churn";

/// Score, tier, reasons and actions for one customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnAssessment {
    pub churn_probability: f64,
    pub risk: RiskTier,
    pub top_reasons: Vec<Attribution>,
    pub recommendations: Vec<String>,
}

/// Assess an already-encoded feature vector
pub fn assess_vector(
    model: &dyn Classifier,
    features: &[f64],
    feature_names: &[String],
    top_reasons: usize,
    top_actions: usize,
) -> Result<ChurnAssessment> {
    let churn_probability = model.predict_proba(features);
    let reasons = explain(model, features, feature_names, top_reasons)?;
    let recommendations = recommend(&reasons, top_actions);
    Ok(ChurnAssessment {
        churn_probability,
        risk: RiskTier::from_probability(churn_probability),
        top_reasons: reasons,
        recommendations,
    })
}

/// Encode and assess one raw record with a loaded bundle
pub fn assess(
    bundle: &ArtifactBundle,
    record: &RawRecord,
    top_reasons: usize,
    top_actions: usize,
) -> Result<ChurnAssessment> {
    let features = bundle.preprocessor.transform(record)?;
    assess_vector(&bundle.model, &features, &bundle.feature_names, top_reasons, top_actions)
}
