use churnlens_ai_core::CoreError;
use thiserror::Error;

/// Errors returned by the offline trainer.
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("training error: {0}")]
    Training(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for trainer operations
pub type Result<T> = std::result::Result<T, TrainerError>;
