//! Record cleaning and one-hot encoding
//!
//! A [`Preprocessor`] is fitted once on the training records and persisted
//! with the model. Serving reuses the exact vocabulary, column order and
//! imputation medians, so encoded vectors line up with the model's feature
//! names.
//!
//! Layout of an encoded vector: one one-hot block per categorical column
//! (categories sorted), followed by the numeric columns unchanged.

use crate::errors::{CoreError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Encoded feature vector, index-aligned with the feature names
pub type FeatureVector = Vec<f64>;

/// One raw customer record as received (JSON object or CSV row)
pub type RawRecord = serde_json::Map<String, Value>;

/// Placeholder for missing categorical values
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Categorical input columns of the Telco churn dataset
pub const CATEGORICAL_COLUMNS: [&str; 16] = [
    "gender",
    "SeniorCitizen",
    "Partner",
    "Dependents",
    "PhoneService",
    "MultipleLines",
    "InternetService",
    "OnlineSecurity",
    "OnlineBackup",
    "DeviceProtection",
    "TechSupport",
    "StreamingTV",
    "StreamingMovies",
    "Contract",
    "PaperlessBilling",
    "PaymentMethod",
];

/// Numeric input columns of the Telco churn dataset
pub const NUMERIC_COLUMNS: [&str; 3] = ["tenure", "MonthlyCharges", "TotalCharges"];

/// Categorical column coerced to an integer flag before encoding
const INTEGER_FLAG_COLUMN: &str = "SeniorCitizen";

/// Fitted vocabulary of one categorical column
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoricalEncoding {
    pub column: String,
    /// Sorted, unique
    pub categories: Vec<String>,
}

/// Imputation statistic of one numeric column
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NumericImputation {
    pub column: String,
    pub median: f64,
}

/// Fitted cleaning and encoding state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Preprocessor {
    pub categorical: Vec<CategoricalEncoding>,
    pub numeric: Vec<NumericImputation>,
}

impl Preprocessor {
    /// Fit on the Telco column sets
    pub fn fit(records: &[RawRecord]) -> Result<Self> {
        Self::fit_columns(&CATEGORICAL_COLUMNS, &NUMERIC_COLUMNS, records)
    }

    /// Fit on arbitrary column sets
    pub fn fit_columns(
        categorical: &[&str],
        numeric: &[&str],
        records: &[RawRecord],
    ) -> Result<Self> {
        if records.is_empty() {
            return Err(CoreError::FitFailed("no records".into()));
        }
        let required: Vec<&str> = categorical.iter().chain(numeric).copied().collect();
        let mut missing: BTreeSet<String> = BTreeSet::new();
        for record in records {
            missing.extend(missing_in(record, &required));
        }
        if !missing.is_empty() {
            return Err(CoreError::MissingColumns(missing.into_iter().collect()));
        }

        let categorical = categorical
            .iter()
            .map(|column| {
                let categories: BTreeSet<String> = records
                    .iter()
                    .map(|r| categorical_value(column, r.get(*column)))
                    .collect();
                CategoricalEncoding {
                    column: column.to_string(),
                    categories: categories.into_iter().collect(),
                }
            })
            .collect();

        let numeric = numeric
            .iter()
            .map(|column| {
                let values: Vec<f64> = records
                    .iter()
                    .filter_map(|r| r.get(*column).and_then(numeric_value))
                    .collect();
                median(values)
                    .map(|median| NumericImputation {
                        column: column.to_string(),
                        median,
                    })
                    .ok_or_else(|| {
                        CoreError::FitFailed(format!("column {column} has no numeric values"))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            categorical,
            numeric,
        })
    }

    /// Input columns a record must provide, categorical first
    pub fn required_columns(&self) -> Vec<&str> {
        self.categorical
            .iter()
            .map(|c| c.column.as_str())
            .chain(self.numeric.iter().map(|n| n.column.as_str()))
            .collect()
    }

    /// Required columns absent from `record`, in column order
    pub fn missing_columns(&self, record: &RawRecord) -> Vec<String> {
        missing_in(record, &self.required_columns())
    }

    /// Names of the encoded features
    pub fn feature_names(&self) -> Vec<String> {
        self.categorical
            .iter()
            .flat_map(|enc| {
                enc.categories
                    .iter()
                    .map(move |cat| format!("{}_{}", enc.column, cat))
            })
            .chain(self.numeric.iter().map(|n| n.column.clone()))
            .collect()
    }

    /// Width of the encoded vector
    pub fn width(&self) -> usize {
        self.categorical.iter().map(|c| c.categories.len()).sum::<usize>() + self.numeric.len()
    }

    /// Encode one record
    ///
    /// Fails only when required columns are absent. Categories unseen at fit
    /// time encode as an all-zero block.
    pub fn transform(&self, record: &RawRecord) -> Result<FeatureVector> {
        let missing = self.missing_columns(record);
        if !missing.is_empty() {
            return Err(CoreError::MissingColumns(missing));
        }

        let mut vector = Vec::with_capacity(self.width());
        for enc in &self.categorical {
            let value = categorical_value(&enc.column, record.get(&enc.column));
            let hot = enc.categories.binary_search(&value).ok();
            vector.extend((0..enc.categories.len()).map(|i| if Some(i) == hot { 1.0 } else { 0.0 }));
        }
        for imp in &self.numeric {
            let value = record
                .get(&imp.column)
                .and_then(numeric_value)
                .unwrap_or(imp.median);
            vector.push(value);
        }
        Ok(vector)
    }

    /// Encode many records, failing on the first record with missing columns
    pub fn transform_all(&self, records: &[RawRecord]) -> Result<Vec<FeatureVector>> {
        records.iter().map(|r| self.transform(r)).collect()
    }
}

fn missing_in(record: &RawRecord, required: &[&str]) -> Vec<String> {
    required
        .iter()
        .filter(|c| !record.contains_key(**c))
        .map(|c| c.to_string())
        .collect()
}

/// Clean a categorical cell to its string category
fn categorical_value(column: &str, value: Option<&Value>) -> String {
    if column == INTEGER_FLAG_COLUMN {
        let flag = value.and_then(numeric_value).unwrap_or(0.0).trunc() as i64;
        return flag.to_string();
    }
    match value {
        None | Some(Value::Null) => UNKNOWN_CATEGORY.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(true)) => "True".to_string(),
        Some(Value::Bool(false)) => "False".to_string(),
        Some(other) => other.to_string(),
    }
}

/// Coerce a cell to a finite number; anything else counts as missing
pub fn numeric_value(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}
