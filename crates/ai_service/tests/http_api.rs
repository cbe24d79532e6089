//! HTTP handler tests against a bundle written to a temp directory

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use churnlens_ai_core::{
    ArtifactBundle, ChurnModel, GbdtModel, Node, Preprocessor, RawRecord, Tree, ACTION_RULES,
    CATEGORICAL_COLUMNS, NUMERIC_COLUMNS,
};
use churnlens_ai_service::{build_router, AppState, ServiceConfig};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

const BOUNDARY: &str = "churnlens-test-boundary";

fn customer(contract: &str, tenure: f64, monthly: f64) -> RawRecord {
    let mut record = RawRecord::new();
    for column in CATEGORICAL_COLUMNS {
        record.insert(column.to_string(), json!("No"));
    }
    record.insert("SeniorCitizen".into(), json!(0));
    record.insert("Contract".into(), json!(contract));
    record.insert("tenure".into(), json!(tenure));
    record.insert("MonthlyCharges".into(), json!(monthly));
    record.insert("TotalCharges".into(), json!(tenure * monthly));
    record
}

/// One covered tree: month-to-month customers churn, everyone else stays
fn write_bundle(dir: &Path) {
    let records = vec![
        customer("Month-to-month", 1.0, 95.0),
        customer("One year", 20.0, 50.0),
        customer("Two year", 60.0, 25.0),
    ];
    let pre = Preprocessor::fit(&records).unwrap();
    let names = pre.feature_names();
    let mtm = names.iter().position(|n| n == "Contract_Month-to-month").unwrap() as i32;
    let charges = names.iter().position(|n| n == "MonthlyCharges").unwrap() as i32;

    let tree = Tree::new(
        vec![
            Node::internal(0, mtm, 0.5, 1, 2).with_stats(10.0, 5.0),
            Node::internal(1, charges, 60.0, 3, 4).with_stats(6.0, 0.5),
            Node::leaf(2, 2.5).with_stats(4.0, 0.0),
            Node::leaf(3, -2.0).with_stats(4.0, 0.0),
            Node::leaf(4, -1.0).with_stats(2.0, 0.0),
        ],
        1.0,
    );
    let model = ChurnModel::Gbdt(GbdtModel::new(vec![tree], 0.0, names.len()));
    ArtifactBundle::new(model, pre).save(dir).unwrap();
}

fn app_with(dir: &Path, config: ServiceConfig) -> (Router, Arc<AppState>) {
    let config = ServiceConfig {
        artifacts_dir: dir.to_path_buf(),
        ..config
    };
    let state = Arc::new(AppState::new(config));
    (build_router(Arc::clone(&state)), state)
}

fn app() -> (Router, Arc<AppState>, TempDir) {
    let dir = tempdir().unwrap();
    write_bundle(dir.path());
    let (router, state) = app_with(dir.path(), ServiceConfig::default());
    (router, state, dir)
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn send_text(router: Router, request: Request<Body>) -> (StatusCode, String) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_csv(csv: &str, field: &str) -> Request<Body> {
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"customers.csv\"\r\nContent-Type: text/csv\r\n\r\n{csv}\r\n--{BOUNDARY}--\r\n"
    );
    Request::builder()
        .method("POST")
        .uri("/predict_batch")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn csv_rows(rows: usize) -> String {
    let columns: Vec<&str> = CATEGORICAL_COLUMNS
        .iter()
        .chain(NUMERIC_COLUMNS.iter())
        .copied()
        .chain(["Churn", "customerID"])
        .collect();
    let mut csv = columns.join(",");
    for i in 0..rows {
        csv.push('\n');
        let cells: Vec<String> = columns
            .iter()
            .map(|c| match *c {
                "Contract" if i % 2 == 0 => "Month-to-month".to_string(),
                "Contract" => "Two year".to_string(),
                "SeniorCitizen" => "0".to_string(),
                "tenure" => (i + 1).to_string(),
                "MonthlyCharges" => "80.5".to_string(),
                "TotalCharges" => String::new(),
                "Churn" => "No".to_string(),
                "customerID" => format!("C{i}"),
                _ => "No".to_string(),
            })
            .collect();
        csv.push_str(&cells.join(","));
    }
    csv
}

#[tokio::test]
async fn test_ping() {
    let (router, state, _dir) = app();
    let (status, body) = send(router, get("/ping")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], churnlens_ai_core::VERSION);
    // ping never touches the artifacts
    assert!(!state.store.is_loaded());
}

#[tokio::test]
async fn test_predict_high_risk_customer() {
    let (router, _state, _dir) = app();
    let body = Value::Object(customer("Month-to-month", 2.0, 99.0));
    let (status, json) = send(router, post_json("/predict", &body)).await;

    assert_eq!(status, StatusCode::OK);
    let p = json["churn_probability"].as_f64().unwrap();
    assert!((p - 1.0 / (1.0 + (-2.5f64).exp())).abs() < 1e-9);
    assert_eq!(json["risk"], "High");

    let reasons = json["top_reasons"].as_array().unwrap();
    assert_eq!(reasons.len(), 5);
    assert_eq!(reasons[0]["feature"], "Contract_Month-to-month");
    assert_eq!(reasons[0]["direction"], "increase");

    let actions = json["recommendations"].as_array().unwrap();
    assert!(actions.len() <= 3);
    assert!(actions.contains(&json!(ACTION_RULES[1].action)));
}

#[tokio::test]
async fn test_predict_missing_columns_is_400() {
    let (router, _state, _dir) = app();
    let mut record = customer("Two year", 30.0, 20.0);
    record.remove("tenure");
    record.remove("gender");

    let (status, json) = send(router, post_json("/predict", &Value::Object(record))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], r#"Missing columns: ["gender", "tenure"]"#);
}

#[tokio::test]
async fn test_predict_rejects_non_object_body() {
    let (router, _state, _dir) = app();
    let (status, json) = send(router, post_json("/predict", &json!([1, 2, 3]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_unseen_category_still_scores() {
    let (router, _state, _dir) = app();
    let mut record = customer("Decade", 12.0, 40.0);
    record.insert("PaymentMethod".into(), Value::Null);
    let (status, json) = send(router, post_json("/predict", &Value::Object(record))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["risk"], "Low");
}

#[tokio::test]
async fn test_batch_examples_and_preview() {
    let (router, _state, _dir) = app();
    let (status, json) = send(router, post_csv(&csv_rows(5), "file")).await;
    assert_eq!(status, StatusCode::OK);

    let examples = json["summary_examples"].as_array().unwrap();
    assert_eq!(examples.len(), 3);
    for (i, example) in examples.iter().enumerate() {
        assert_eq!(example["row_index"], i);
        assert!(example["top_reasons"].is_array());
        assert!(example["recommendations"].is_array());
    }
    assert_eq!(examples[0]["risk"], "High");
    assert_eq!(examples[1]["risk"], "Low");

    let preview = json["preview_rows"].as_array().unwrap();
    assert_eq!(preview.len(), 5);
    assert_eq!(preview[0]["customerID"], "C0");
    assert_eq!(preview[0]["tenure"], "1");
    assert_eq!(preview[0]["TotalCharges"], Value::Null);
    assert_eq!(preview[0]["predicted_risk"], "High");
    assert!(preview[4]["predicted_churn_probability"].is_number());
}

#[tokio::test]
async fn test_batch_preview_keeps_csv_column_order() {
    let (router, _state, _dir) = app();
    let (status, text) = send_text(router, post_csv(&csv_rows(1), "file")).await;
    assert_eq!(status, StatusCode::OK);

    let preview = &text[text.find("\"preview_rows\"").unwrap()..];
    let position = |key: &str| preview.find(&format!("\"{key}\":")).unwrap();
    let order = [
        "gender",
        "SeniorCitizen",
        "Contract",
        "PaymentMethod",
        "tenure",
        "TotalCharges",
        "Churn",
        "customerID",
        "predicted_churn_probability",
        "predicted_risk",
    ];
    for pair in order.windows(2) {
        assert!(position(pair[0]) < position(pair[1]), "{} before {}", pair[0], pair[1]);
    }
}

#[tokio::test]
async fn test_batch_header_checked_before_artifacts_load() {
    let dir = tempdir().unwrap();
    let (router, state) = app_with(dir.path(), ServiceConfig::default());

    let csv = csv_rows(2).replacen("Churn", "Outcome", 1);
    let (status, json) = send(router, post_csv(&csv, "file")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], r#"Missing columns: ["Churn"]"#);
    assert!(!state.store.is_loaded());
}

#[tokio::test]
async fn test_batch_limits_follow_config() {
    let dir = tempdir().unwrap();
    write_bundle(dir.path());
    let config = ServiceConfig {
        batch_examples: 1,
        preview_rows: 2,
        ..ServiceConfig::default()
    };
    let (router, _state) = app_with(dir.path(), config);

    let (status, json) = send(router, post_csv(&csv_rows(6), "file")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["summary_examples"].as_array().unwrap().len(), 1);
    assert_eq!(json["preview_rows"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_batch_requires_label_column() {
    let (router, _state, _dir) = app();
    let csv = csv_rows(2).replacen("Churn", "Outcome", 1);
    let (status, json) = send(router, post_csv(&csv, "file")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], r#"Missing columns: ["Churn"]"#);
}

#[tokio::test]
async fn test_batch_rejects_empty_csv_and_wrong_field() {
    let (router, _state, _dir) = app();
    let header_only = csv_rows(0);
    let (status, _) = send(router.clone(), post_csv(&header_only, "file")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(router, post_csv(&csv_rows(1), "upload")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "missing multipart field 'file'");
}

#[tokio::test]
async fn test_insights_rank_tree_importances() {
    let (router, _state, _dir) = app();
    let (status, json) = send(router, get("/insights")).await;
    assert_eq!(status, StatusCode::OK);

    let top = json["top_features"].as_array().unwrap();
    assert_eq!(top.len(), 20);
    assert_eq!(top[0]["feature"], "Contract_Month-to-month");
    assert_eq!(top[1]["feature"], "MonthlyCharges");
    let first = top[0]["importance"].as_f64().unwrap();
    assert!((first - 5.0 / 5.5).abs() < 1e-12);
}

#[tokio::test]
async fn test_missing_artifacts_is_500_then_recovers() {
    let dir = tempdir().unwrap();
    let (router, state) = app_with(dir.path(), ServiceConfig::default());

    let (status, json) = send(router.clone(), get("/insights")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].as_str().unwrap().contains("Failed to load artifacts"));

    write_bundle(dir.path());
    let (status, _) = send(router, get("/insights")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state.store.load_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_share_one_load() {
    let (router, state, _dir) = app();
    let body = Value::Object(customer("One year", 10.0, 45.0));

    let handles: Vec<_> = (0..12)
        .map(|_| {
            let router = router.clone();
            let request = post_json("/predict", &body);
            tokio::spawn(async move { send(router, request).await.0 })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }
    assert_eq!(state.store.load_count(), 1);
}
