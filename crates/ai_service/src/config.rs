//! Service configuration
//!
//! Resolution order: built-in defaults, then an optional TOML file, then
//! `CHURNLENS_*` environment variables, then command-line flags (applied by
//! the binary).

use crate::errors::{Result, ServiceError};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "CHURNLENS_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listen address
    pub bind_addr: String,
    /// Directory holding the artifact bundle
    pub artifacts_dir: PathBuf,
    /// Load artifacts at startup instead of on first request
    pub preload: bool,
    /// Attributions returned per prediction
    pub top_reasons: usize,
    /// Recommendations returned per prediction
    pub top_actions: usize,
    /// Detailed examples in a batch response
    pub batch_examples: usize,
    /// Scored input rows echoed in a batch response
    pub preview_rows: usize,
    /// Features listed by `/insights`
    pub insights_top: usize,
    /// Request body limit in bytes
    pub max_upload_bytes: usize,
    /// Allow any origin
    pub cors_permissive: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            artifacts_dir: PathBuf::from("artifacts"),
            preload: true,
            top_reasons: 5,
            top_actions: 3,
            batch_examples: 3,
            preview_rows: 50,
            insights_top: 20,
            max_upload_bytes: 10 * 1024 * 1024,
            cors_permissive: true,
        }
    }
}

impl ServiceConfig {
    /// Defaults, overlaid by `path` when given, then by the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(env::vars());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ServiceError::Config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        toml::from_str(&content)
            .map_err(|e| ServiceError::Config(format!("Failed to parse config file: {e}")))
    }

    /// Apply `CHURNLENS_*` variables from `vars`; unparseable values are
    /// logged and ignored
    pub fn apply_env_overrides<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.trim();
            match name {
                "BIND_ADDR" => self.bind_addr = value.to_string(),
                "ARTIFACTS_DIR" => self.artifacts_dir = PathBuf::from(value),
                "PRELOAD" => set_parsed(&key, value, &mut self.preload),
                "TOP_REASONS" => set_parsed(&key, value, &mut self.top_reasons),
                "TOP_ACTIONS" => set_parsed(&key, value, &mut self.top_actions),
                "BATCH_EXAMPLES" => set_parsed(&key, value, &mut self.batch_examples),
                "PREVIEW_ROWS" => set_parsed(&key, value, &mut self.preview_rows),
                "INSIGHTS_TOP" => set_parsed(&key, value, &mut self.insights_top),
                "MAX_UPLOAD_BYTES" => set_parsed(&key, value, &mut self.max_upload_bytes),
                "CORS_PERMISSIVE" => set_parsed(&key, value, &mut self.cors_permissive),
                _ => {}
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.bind_addr.trim().is_empty() {
            return Err(ServiceError::Config("bind_addr must not be empty".into()));
        }
        if self.max_upload_bytes == 0 {
            return Err(ServiceError::Config("max_upload_bytes must be positive".into()));
        }
        Ok(())
    }
}

fn set_parsed<T: std::str::FromStr>(key: &str, value: &str, slot: &mut T) {
    match value.parse() {
        Ok(parsed) => *slot = parsed,
        Err(_) => warn!(key, value, "ignoring unparseable configuration override"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:8000");
        assert_eq!(config.top_reasons, 5);
        assert_eq!(config.top_actions, 3);
        assert_eq!(config.preview_rows, 50);
        assert!(config.preload);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "bind_addr = \"127.0.0.1:9000\"").unwrap();
        writeln!(file, "insights_top = 10").unwrap();
        file.flush().unwrap();

        let config = ServiceConfig::from_file(file.path()).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.insights_top, 10);
        assert_eq!(config.top_reasons, 5);
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "top_reasons = \"many\"").unwrap();
        file.flush().unwrap();
        assert!(matches!(
            ServiceConfig::from_file(file.path()),
            Err(ServiceError::Config(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ServiceConfig::default();
        config.apply_env_overrides(vars(&[
            ("CHURNLENS_ARTIFACTS_DIR", "/srv/models"),
            ("CHURNLENS_PRELOAD", "false"),
            ("CHURNLENS_TOP_REASONS", "8"),
            ("CHURNLENS_TOP_ACTIONS", "lots"),
            ("OTHER_TOP_REASONS", "1"),
        ]));
        assert_eq!(config.artifacts_dir, PathBuf::from("/srv/models"));
        assert!(!config.preload);
        assert_eq!(config.top_reasons, 8);
        // unparseable value leaves the default
        assert_eq!(config.top_actions, 3);
    }

    #[test]
    fn test_zero_upload_limit_is_rejected() {
        let config = ServiceConfig {
            max_upload_bytes: 0,
            ..ServiceConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
