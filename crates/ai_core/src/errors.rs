//! Error types for the churn core

use thiserror::Error;

/// Errors raised by preprocessing, model validation and artifact handling
#[derive(Error, Debug)]
pub enum CoreError {
    /// Required input fields are absent from a raw record
    #[error("Missing columns: {0:?}")]
    MissingColumns(Vec<String>),

    /// Feature vector and feature names disagree in length
    #[error("Feature length mismatch: {vector} values for {names} feature names")]
    FeatureMismatch { vector: usize, names: usize },

    /// Model structure failed validation
    #[error("Model validation failed: {0}")]
    ValidationFailed(String),

    /// Preprocessor could not be fitted
    #[error("Preprocessor fit failed: {0}")]
    FitFailed(String),

    /// Artifact bundle could not be read, written or verified
    #[error(transparent)]
    Artifact(#[from] crate::artifacts::ArtifactError),

    /// Tabular input could not be parsed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Canonical serialization failed
    #[error("Canonical serialization error: {0}")]
    Canonical(#[from] crate::serde_canon::CanonicalError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
