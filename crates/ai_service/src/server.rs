//! HTTP surface
//!
//! | Route | Method | Body |
//! |---|---|---|
//! | `/ping` | GET | |
//! | `/predict` | POST | JSON object, one raw customer record |
//! | `/predict_batch` | POST | multipart, field `file` holding a CSV |
//! | `/insights` | GET | |

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use churnlens_ai_core::{
    assess, assess_vector, read_table, ChurnAssessment, Classifier, RawRecord, RiskTier, Table,
    CATEGORICAL_COLUMNS, LABEL_COLUMN, NUMERIC_COLUMNS, VERSION,
};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::config::ServiceConfig;
use crate::errors::ApiError;
use crate::store::{FeatureImportance, LoadedArtifacts, ModelStore};

/// Multipart field carrying the CSV upload
pub const UPLOAD_FIELD: &str = "file";

/// State shared by every handler
#[derive(Debug)]
pub struct AppState {
    pub config: ServiceConfig,
    pub store: Arc<ModelStore>,
}

impl AppState {
    pub fn new(config: ServiceConfig) -> Self {
        let store = Arc::new(ModelStore::new(config.artifacts_dir.clone()));
        Self { config, store }
    }
}

pub type SharedState = Arc<AppState>;

#[derive(Debug, Serialize)]
struct PingResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct BatchExample {
    row_index: usize,
    #[serde(flatten)]
    assessment: ChurnAssessment,
}

/// One uploaded row echoed back with its score, columns in CSV header order
#[derive(Debug)]
struct PreviewRow(Vec<(String, Value)>);

impl Serialize for PreviewRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (column, value) in &self.0 {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Serialize)]
struct BatchResponse {
    summary_examples: Vec<BatchExample>,
    preview_rows: Vec<PreviewRow>,
}

#[derive(Debug, Serialize)]
struct InsightsResponse {
    top_features: Vec<FeatureImportance>,
}

pub async fn start_server(state: AppState) -> Result<()> {
    let addr = state.config.bind_addr.clone();
    let app = build_router(Arc::new(state));
    let listener = bind_listener(&addr).await?;
    info!("churnlens serving on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server terminated unexpectedly")
}

async fn bind_listener(addr: &str) -> Result<tokio::net::TcpListener> {
    if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
        tokio::net::TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("failed to bind listener on {socket_addr}"))
    } else {
        tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind listener on {addr}"))
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(err) => warn!("Unable to listen for shutdown signal: {}", err),
    }
}

pub fn build_router(state: SharedState) -> Router {
    let mut router = Router::new()
        .route("/ping", get(handle_ping))
        .route("/predict", post(handle_predict))
        .route("/predict_batch", post(handle_predict_batch))
        .route("/insights", get(handle_insights))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes));

    if state.config.cors_permissive {
        router = router.layer(CorsLayer::permissive());
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

async fn handle_ping() -> Json<PingResponse> {
    Json(PingResponse {
        status: "ok",
        version: VERSION,
    })
}

async fn loaded(state: &AppState) -> Result<Arc<LoadedArtifacts>, ApiError> {
    state.store.artifacts().await.map_err(ApiError::from)
}

async fn handle_predict(
    State(state): State<SharedState>,
    payload: Result<Json<RawRecord>, JsonRejection>,
) -> Result<Json<ChurnAssessment>, ApiError> {
    let Json(record) = payload.map_err(|rejection| {
        warn!(error = %rejection, "rejected predict body");
        ApiError::bad_request(rejection.body_text())
    })?;
    let artifacts = loaded(&state).await?;

    let assessment = assess(
        &artifacts.bundle,
        &record,
        state.config.top_reasons,
        state.config.top_actions,
    )
    .map_err(|err| {
        warn!(error = %err, "predict request rejected");
        ApiError::from(err)
    })?;

    debug!(
        probability = assessment.churn_probability,
        risk = %assessment.risk,
        "scored record"
    );
    Ok(Json(assessment))
}

async fn handle_predict_batch(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<BatchResponse>, ApiError> {
    let mut multipart =
        multipart.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {e}")))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("failed to read upload: {e}")))?;
            upload = Some(bytes);
            break;
        }
    }
    let upload = upload
        .ok_or_else(|| ApiError::bad_request(format!("missing multipart field '{UPLOAD_FIELD}'")))?;

    // Header problems are the caller's fault even when artifacts are unavailable
    let table = tokio::task::spawn_blocking(move || parse_upload(&upload))
        .await
        .map_err(|e| ApiError::internal(format!("upload parsing task failed: {e}")))??;

    let artifacts = loaded(&state).await?;
    let shared = Arc::clone(&state);
    let response = tokio::task::spawn_blocking(move || score_batch(&shared.config, &artifacts, &table))
        .await
        .map_err(|e| ApiError::internal(format!("batch scoring task failed: {e}")))??;
    Ok(Json(response))
}

/// Parse the uploaded CSV and check it carries the feature and label columns
fn parse_upload(upload: &[u8]) -> Result<Table, ApiError> {
    let table = read_table(upload).map_err(|err| {
        warn!(error = %err, "unreadable batch upload");
        ApiError::bad_request(format!("invalid CSV: {err}"))
    })?;
    if table.is_empty() {
        return Err(ApiError::bad_request("CSV contains no rows"));
    }

    let required = CATEGORICAL_COLUMNS
        .iter()
        .chain(NUMERIC_COLUMNS.iter())
        .copied()
        .chain(std::iter::once(LABEL_COLUMN));
    let missing = table.missing_columns(required);
    if !missing.is_empty() {
        warn!(?missing, "batch upload missing columns");
        return Err(ApiError::bad_request(format!("Missing columns: {missing:?}")));
    }
    Ok(table)
}

/// Score the rows the response needs
fn score_batch(
    config: &ServiceConfig,
    artifacts: &LoadedArtifacts,
    table: &Table,
) -> Result<BatchResponse, ApiError> {
    let bundle = &artifacts.bundle;
    let needed = config.batch_examples.max(config.preview_rows).min(table.len());
    let mut summary_examples = Vec::with_capacity(config.batch_examples.min(needed));
    let mut preview_rows = Vec::with_capacity(config.preview_rows.min(needed));

    for (row_index, record) in table.records.iter().take(needed).enumerate() {
        let features = bundle.preprocessor.transform(record)?;

        if row_index < config.batch_examples {
            let assessment = assess_vector(
                &bundle.model,
                &features,
                &bundle.feature_names,
                config.top_reasons,
                config.top_actions,
            )?;
            summary_examples.push(BatchExample {
                row_index,
                assessment,
            });
        }

        if row_index < config.preview_rows {
            let probability = bundle.model.predict_proba(&features);
            preview_rows.push(preview_row(&table.headers, record, probability));
        }
    }

    info!(
        rows = table.len(),
        examples = summary_examples.len(),
        previews = preview_rows.len(),
        "batch scored"
    );
    Ok(BatchResponse {
        summary_examples,
        preview_rows,
    })
}

fn preview_row(headers: &[String], record: &RawRecord, probability: f64) -> PreviewRow {
    let mut cells: Vec<(String, Value)> = headers
        .iter()
        .map(|h| (h.clone(), record.get(h).cloned().unwrap_or(Value::Null)))
        .collect();
    cells.push((
        "predicted_churn_probability".into(),
        serde_json::Number::from_f64(probability).map_or(Value::Null, Value::Number),
    ));
    cells.push((
        "predicted_risk".into(),
        Value::String(RiskTier::from_probability(probability).to_string()),
    ));
    PreviewRow(cells)
}

async fn handle_insights(
    State(state): State<SharedState>,
) -> Result<Json<InsightsResponse>, ApiError> {
    let artifacts = loaded(&state).await?;
    let top_features = artifacts
        .importances
        .iter()
        .take(state.config.insights_top)
        .cloned()
        .collect();
    Ok(Json(InsightsResponse { top_features }))
}
