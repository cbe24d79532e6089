//! Integration tests for the trainer
//!
//! Trains on a synthetic Telco-shaped CSV and checks the written bundle.

use churnlens_ai_core::{assess, ArtifactBundle, ChurnModel, ModelKind, RiskTier};
use churnlens_ai_trainer::{train_from_csv, GbdtParams, TrainingConfig};
use serde_json::Value;
use std::fmt::Write as _;
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

const HEADER: &str = "customerID,gender,SeniorCitizen,Partner,Dependents,tenure,PhoneService,MultipleLines,InternetService,OnlineSecurity,OnlineBackup,DeviceProtection,TechSupport,StreamingTV,StreamingMovies,Contract,PaperlessBilling,PaymentMethod,MonthlyCharges,TotalCharges,Churn";

/// Month-to-month fiber customers with short tenure churn; the rest stay
fn create_synthetic_csv(rows: usize) -> NamedTempFile {
    let mut body = String::new();
    writeln!(body, "{HEADER}").unwrap();
    for i in 0..rows {
        let risky = i % 3 == 0;
        let contract = if risky { "Month-to-month" } else if i % 2 == 0 { "Two year" } else { "One year" };
        let internet = if risky { "Fiber optic" } else { "DSL" };
        let tenure = if risky { 1 + i % 6 } else { 20 + i % 40 };
        let monthly = if risky { 85.0 + (i % 10) as f64 } else { 30.0 + (i % 25) as f64 };
        // blank TotalCharges exercises median imputation
        let total = if i % 17 == 0 { " ".to_string() } else { format!("{:.2}", monthly * tenure as f64) };
        let gender = if i % 2 == 0 { "Female" } else { "Male" };
        let churn = if risky { "Yes" } else { "No" };
        writeln!(
            body,
            "C{i:04},{gender},{},No,No,{tenure},Yes,No,{internet},No,No,No,No,No,No,{contract},Yes,Electronic check,{monthly:.2},{total},{churn}",
            u8::from(i % 5 == 0)
        )
        .unwrap();
    }

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn quick_config(model: ModelKind) -> TrainingConfig {
    TrainingConfig {
        model,
        gbdt: GbdtParams {
            num_trees: 30,
            max_depth: 3,
            learning_rate: 0.2,
            ..GbdtParams::default()
        },
        ..TrainingConfig::default()
    }
}

fn customer(contract: &str, internet: &str, tenure: u32, monthly: f64) -> serde_json::Map<String, Value> {
    let mut record = serde_json::Map::new();
    let fields = HEADER.split(',').filter(|c| *c != "customerID" && *c != "Churn");
    for column in fields {
        let value = match column {
            "Contract" => contract.to_string(),
            "InternetService" => internet.to_string(),
            "tenure" => tenure.to_string(),
            "MonthlyCharges" => monthly.to_string(),
            "TotalCharges" => (monthly * tenure as f64).to_string(),
            "SeniorCitizen" => "0".to_string(),
            _ => "No".to_string(),
        };
        record.insert(column.to_string(), Value::String(value));
    }
    record
}

#[test]
fn test_gbdt_training_writes_loadable_bundle() {
    let csv = create_synthetic_csv(150);
    let out = tempdir().unwrap();

    let outcome = train_from_csv(csv.path(), out.path(), &quick_config(ModelKind::Gbdt)).unwrap();
    assert_eq!(outcome.evaluation.train_rows + outcome.evaluation.test_rows, 150);
    assert_eq!(outcome.evaluation.test_rows, 30);
    assert!(outcome.evaluation.roc_auc.unwrap() > 0.95);

    let bundle = ArtifactBundle::load(out.path()).unwrap();
    assert_eq!(bundle, outcome.bundle);
    assert!(matches!(bundle.model, ChurnModel::Gbdt(_)));
    assert!(bundle.feature_names.contains(&"Contract_Month-to-month".to_string()));
    assert_eq!(bundle.feature_names.last().map(String::as_str), Some("TotalCharges"));

    let risky = assess(&bundle, &customer("Month-to-month", "Fiber optic", 2, 90.0), 5, 3).unwrap();
    assert_eq!(risky.risk, RiskTier::High);
    assert_eq!(risky.top_reasons.len(), 5);
    assert!(!risky.recommendations.is_empty());

    let loyal = assess(&bundle, &customer("Two year", "DSL", 48, 40.0), 5, 3).unwrap();
    assert_eq!(loyal.risk, RiskTier::Low);
}

#[test]
fn test_logistic_training_writes_loadable_bundle() {
    let csv = create_synthetic_csv(120);
    let out = tempdir().unwrap();

    let outcome = train_from_csv(csv.path(), out.path(), &quick_config(ModelKind::Logistic)).unwrap();
    let bundle = ArtifactBundle::load(out.path()).unwrap();
    assert!(matches!(bundle.model, ChurnModel::Logistic(_)));
    assert!(outcome.evaluation.report.accuracy > 0.9);
}

#[test]
fn test_same_seed_gives_identical_artifacts() {
    let csv = create_synthetic_csv(90);
    let a = tempdir().unwrap();
    let b = tempdir().unwrap();

    let first = train_from_csv(csv.path(), a.path(), &quick_config(ModelKind::Gbdt)).unwrap();
    let second = train_from_csv(csv.path(), b.path(), &quick_config(ModelKind::Gbdt)).unwrap();
    assert_eq!(first.bundle, second.bundle);

    for file in ["model.json", "preprocessor.json", "columns.json"] {
        let left = std::fs::read(a.path().join(file)).unwrap();
        let right = std::fs::read(b.path().join(file)).unwrap();
        assert_eq!(left, right, "{file} differs between runs");
    }
}

#[test]
fn test_missing_label_column_fails() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "tenure,Contract").unwrap();
    writeln!(file, "1,Month-to-month").unwrap();
    file.flush().unwrap();

    let out = tempdir().unwrap();
    let err = train_from_csv(file.path(), out.path(), &TrainingConfig::default()).unwrap_err();
    assert!(err.to_string().contains("Churn"));
}
