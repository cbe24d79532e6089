//! Load-once artifact store
//!
//! The bundle is read from disk at most once per process. Concurrent first
//! callers block on the same initialization; a failed load leaves the cell
//! empty so the next request retries.

use crate::errors::{Result, ServiceError};
use churnlens_ai_core::{ArtifactBundle, Classifier};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{error, info};

/// Global importance of one feature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// A verified bundle plus values derived from it once
#[derive(Debug)]
pub struct LoadedArtifacts {
    pub bundle: ArtifactBundle,
    /// All features, most important first
    pub importances: Vec<FeatureImportance>,
}

impl LoadedArtifacts {
    pub fn new(bundle: ArtifactBundle) -> Self {
        let importances = rank_importances(&bundle);
        Self {
            bundle,
            importances,
        }
    }
}

/// Tree importances, else absolute coefficients, else 1.0 per feature;
/// stable descending sort
fn rank_importances(bundle: &ArtifactBundle) -> Vec<FeatureImportance> {
    let names = &bundle.feature_names;
    let model = &bundle.model;
    let weights: Vec<f64> = model
        .feature_importances()
        .filter(|w| w.len() == names.len())
        .or_else(|| {
            model
                .coefficients()
                .filter(|c| c.len() == names.len())
                .map(|c| c.iter().map(|v| v.abs()).collect())
        })
        .unwrap_or_else(|| vec![1.0; names.len()]);

    let mut ranked: Vec<FeatureImportance> = names
        .iter()
        .zip(weights)
        .map(|(feature, importance)| FeatureImportance {
            feature: feature.clone(),
            importance,
        })
        .collect();
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    ranked
}

/// Owns the artifact directory and the load-once cell
#[derive(Debug)]
pub struct ModelStore {
    artifacts_dir: PathBuf,
    cell: OnceCell<Arc<LoadedArtifacts>>,
    loads: AtomicUsize,
}

impl ModelStore {
    pub fn new(artifacts_dir: impl Into<PathBuf>) -> Self {
        Self {
            artifacts_dir: artifacts_dir.into(),
            cell: OnceCell::new(),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }

    /// Whether the bundle is already in memory
    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Number of successful disk loads
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Return the bundle, reading it from disk on first use (blocking)
    pub fn get_or_load(&self) -> Result<Arc<LoadedArtifacts>> {
        self.cell
            .get_or_try_init(|| {
                let bundle = ArtifactBundle::load(&self.artifacts_dir).map_err(|err| {
                    error!(dir = %self.artifacts_dir.display(), error = %err, "artifact load failed");
                    ServiceError::Artifacts(err)
                })?;
                self.loads.fetch_add(1, Ordering::SeqCst);
                info!(
                    dir = %self.artifacts_dir.display(),
                    features = bundle.feature_names.len(),
                    "artifacts ready"
                );
                Ok(Arc::new(LoadedArtifacts::new(bundle)))
            })
            .cloned()
    }

    /// Async access; the disk read runs on the blocking pool
    pub async fn artifacts(self: &Arc<Self>) -> Result<Arc<LoadedArtifacts>> {
        if let Some(loaded) = self.cell.get() {
            return Ok(loaded.clone());
        }
        let store = Arc::clone(self);
        tokio::task::spawn_blocking(move || store.get_or_load())
            .await
            .map_err(|e| ServiceError::Task(e.to_string()))?
    }
}
