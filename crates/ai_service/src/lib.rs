//! Churnlens serving layer
//!
//! Loads the artifact bundle once and answers churn predictions, batch
//! scoring and feature insights over HTTP.

pub mod config;
pub mod errors;
pub mod server;
pub mod store;

pub use config::ServiceConfig;
pub use errors::{ApiError, Result, ServiceError};
pub use server::{build_router, start_server, AppState, SharedState};
pub use store::{FeatureImportance, LoadedArtifacts, ModelStore};
