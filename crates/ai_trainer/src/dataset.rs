//! Telco CSV loading and encoded training matrices
//!
//! [`TelcoDataset`] holds raw customer records and binary churn labels as
//! read from the CSV. After the preprocessor is fitted, [`Dataset`] holds
//! the encoded matrix the model trainers consume.

use churnlens_ai_core::{read_table, Preprocessor, RawRecord, Table, LABEL_COLUMN};
use serde_json::Value;
use std::fs::File;
use std::path::Path;

use crate::errors::{Result, TrainerError};

/// Raw records with their churn labels
#[derive(Clone, Debug)]
pub struct TelcoDataset {
    pub records: Vec<RawRecord>,
    pub labels: Vec<u8>,
}

impl TelcoDataset {
    /// Load from a headed CSV file; the label column is matched ignoring case
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| TrainerError::Dataset(format!("{}: {e}", path.display())))?;
        Self::from_table(read_table(file)?)
    }

    pub fn from_table(table: Table) -> Result<Self> {
        let label_column = table
            .find_column(LABEL_COLUMN)
            .map(str::to_string)
            .ok_or_else(|| TrainerError::Dataset(format!("no '{LABEL_COLUMN}' column")))?;

        let mut records = Vec::with_capacity(table.len());
        let mut labels = Vec::with_capacity(table.len());
        for (row, mut record) in table.records.into_iter().enumerate() {
            let raw = record.remove(&label_column).unwrap_or(Value::Null);
            let label = parse_label(&raw).ok_or_else(|| {
                TrainerError::Dataset(format!("row {}: unrecognized label {raw}", row + 1))
            })?;
            records.push(record);
            labels.push(label);
        }

        if records.is_empty() {
            return Err(TrainerError::Dataset("dataset is empty".into()));
        }
        Ok(Self { records, labels })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Share of positive labels
    pub fn churn_rate(&self) -> f64 {
        if self.labels.is_empty() {
            return 0.0;
        }
        self.labels.iter().map(|&y| y as f64).sum::<f64>() / self.labels.len() as f64
    }

    /// Encode every record with a fitted preprocessor
    pub fn encode(&self, preprocessor: &Preprocessor) -> Result<Dataset> {
        let features = preprocessor.transform_all(&self.records)?;
        Ok(Dataset {
            features,
            targets: self.labels.clone(),
            feature_count: preprocessor.width(),
        })
    }
}

/// `Yes`/`No`, `1`/`0` or `true`/`false`, any case
fn parse_label(value: &Value) -> Option<u8> {
    match value {
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "1" | "true" => Some(1),
            "no" | "0" | "false" => Some(0),
            _ => None,
        },
        Value::Number(n) => match n.as_f64() {
            Some(v) if v == 1.0 => Some(1),
            Some(v) if v == 0.0 => Some(0),
            _ => None,
        },
        Value::Bool(b) => Some(u8::from(*b)),
        _ => None,
    }
}

/// Encoded training matrix with binary targets
#[derive(Clone, Debug)]
pub struct Dataset {
    pub features: Vec<Vec<f64>>,
    pub targets: Vec<u8>,
    pub feature_count: usize,
}

impl Dataset {
    /// Get number of samples
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Check if dataset is empty
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Rows at `indices`, in that order
    pub fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset {
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            targets: indices.iter().map(|&i| self.targets[i]).collect(),
            feature_count: self.feature_count,
        }
    }

    /// Per-feature (min, max)
    pub fn feature_stats(&self) -> Vec<(f64, f64)> {
        let mut stats = vec![(f64::INFINITY, f64::NEG_INFINITY); self.feature_count];

        for row in &self.features {
            for (i, &val) in row.iter().enumerate() {
                stats[i].0 = stats[i].0.min(val);
                stats[i].1 = stats[i].1.max(val);
            }
        }

        stats
    }
}
