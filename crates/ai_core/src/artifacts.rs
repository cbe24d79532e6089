//! Persisted artifact bundle
//!
//! A bundle directory holds the fitted model, the preprocessor, the feature
//! names and a manifest:
//!
//! ```text
//! artifacts/
//!   model.json          {"kind":"gbdt",...} | {"kind":"logistic",...}
//!   preprocessor.json   vocabularies + training medians
//!   columns.json        {"feature_names":[...]}
//!   manifest.json       version, created_at, model_kind, feature_count, hashes
//! ```
//!
//! Every file is canonical JSON. The manifest records the blake3 hash of
//! each of the other three files, and loading refuses a bundle whose hashes
//! or widths disagree.

use crate::errors::Result;
use crate::features::Preprocessor;
use crate::model::{ChurnModel, ModelKind};
use crate::serde_canon::{hash_json_hex, to_canonical_json};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const MODEL_FILE: &str = "model.json";
pub const PREPROCESSOR_FILE: &str = "preprocessor.json";
pub const COLUMNS_FILE: &str = "columns.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Bundle layout version written to the manifest
pub const BUNDLE_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Artifact file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported bundle version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },

    #[error("Hash mismatch for {file}: manifest {expected}, actual {actual}")]
    HashMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("Width mismatch: {feature_names} feature names, preprocessor width {preprocessor}, model expects {model}")]
    WidthMismatch {
        feature_names: usize,
        preprocessor: usize,
        model: usize,
    },
}

/// `columns.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureColumns {
    pub feature_names: Vec<String>,
}

/// `manifest.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub model_kind: ModelKind,
    pub feature_count: usize,
    /// File name to blake3 hex of its bytes
    pub hashes: BTreeMap<String, String>,
}

/// Everything the serving path needs, loaded together
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactBundle {
    pub model: ChurnModel,
    pub preprocessor: Preprocessor,
    pub feature_names: Vec<String>,
}

impl ArtifactBundle {
    pub fn new(model: ChurnModel, preprocessor: Preprocessor) -> Self {
        let feature_names = preprocessor.feature_names();
        Self {
            model,
            preprocessor,
            feature_names,
        }
    }

    /// Fail unless names, preprocessor output and model input agree in width
    pub fn check_widths(&self) -> std::result::Result<(), ArtifactError> {
        let names = self.feature_names.len();
        let preprocessor = self.preprocessor.width();
        let model = self.model.feature_count();
        if names != preprocessor || names != model {
            return Err(ArtifactError::WidthMismatch {
                feature_names: names,
                preprocessor,
                model,
            });
        }
        Ok(())
    }

    /// Write the bundle into `dir`, creating it if needed
    pub fn save(&self, dir: &Path) -> Result<Manifest> {
        self.check_widths()?;
        self.model.validate()?;
        fs::create_dir_all(dir)?;

        let columns = FeatureColumns {
            feature_names: self.feature_names.clone(),
        };
        let mut hashes = BTreeMap::new();
        hashes.insert(MODEL_FILE.to_string(), write_canonical(dir, MODEL_FILE, &self.model)?);
        hashes.insert(
            PREPROCESSOR_FILE.to_string(),
            write_canonical(dir, PREPROCESSOR_FILE, &self.preprocessor)?,
        );
        hashes.insert(COLUMNS_FILE.to_string(), write_canonical(dir, COLUMNS_FILE, &columns)?);

        let manifest = Manifest {
            version: BUNDLE_VERSION,
            created_at: Utc::now(),
            model_kind: self.model.kind(),
            feature_count: self.feature_names.len(),
            hashes,
        };
        write_canonical(dir, MANIFEST_FILE, &manifest)?;

        info!(
            dir = %dir.display(),
            model_kind = %manifest.model_kind,
            feature_count = manifest.feature_count,
            "artifact bundle written"
        );
        Ok(manifest)
    }

    /// Load and verify a bundle from `dir`
    pub fn load(dir: &Path) -> Result<Self> {
        let manifest: Manifest = parse(&dir.join(MANIFEST_FILE), &read(&dir.join(MANIFEST_FILE))?)?;
        if manifest.version != BUNDLE_VERSION {
            return Err(ArtifactError::Version {
                found: manifest.version,
                expected: BUNDLE_VERSION,
            }
            .into());
        }

        let model: ChurnModel = load_verified(dir, MODEL_FILE, &manifest)?;
        let preprocessor: Preprocessor = load_verified(dir, PREPROCESSOR_FILE, &manifest)?;
        let columns: FeatureColumns = load_verified(dir, COLUMNS_FILE, &manifest)?;

        let bundle = Self {
            model,
            preprocessor,
            feature_names: columns.feature_names,
        };
        bundle.check_widths()?;
        bundle.model.validate()?;

        info!(
            dir = %dir.display(),
            model_kind = %manifest.model_kind,
            created_at = %manifest.created_at,
            "artifact bundle loaded"
        );
        Ok(bundle)
    }
}

fn write_canonical<T: Serialize>(dir: &Path, file: &str, value: &T) -> Result<String> {
    let json = to_canonical_json(value)?;
    let path = dir.join(file);
    fs::write(&path, &json)?;
    let hash = hash_json_hex(&json);
    debug!(path = %path.display(), %hash, "wrote artifact");
    Ok(hash)
}

fn read(path: &Path) -> std::result::Result<String, ArtifactError> {
    fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ArtifactError::NotFound(path.to_path_buf())
        } else {
            ArtifactError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

fn parse<T: DeserializeOwned>(path: &Path, json: &str) -> std::result::Result<T, ArtifactError> {
    serde_json::from_str(json).map_err(|source| ArtifactError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn load_verified<T: DeserializeOwned>(dir: &Path, file: &str, manifest: &Manifest) -> Result<T> {
    let path = dir.join(file);
    let json = read(&path)?;
    let actual = hash_json_hex(&json);
    let expected = manifest.hashes.get(file).cloned().unwrap_or_default();
    if actual != expected {
        return Err(ArtifactError::HashMismatch {
            file: file.to_string(),
            expected,
            actual,
        }
        .into());
    }
    Ok(parse(&path, &json)?)
}
