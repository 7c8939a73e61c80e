//! HTTP API for the dashboard workflows, health checks and Prometheus metrics

use aqi_lib::{
    dataset::{DatasetStore, PREVIEW_ROWS},
    error::{DatasetError, PredictionError, ReportError, MISSING_DATASET_ADVISORY},
    health::{components, ComponentStatus, HealthRegistry},
    models::{DatasetPreview, PredictionInput, PredictionOutcome, PredictionTarget},
    observability::{DashboardMetrics, StructuredLogger},
    predictor::{CategoryBand, FeatureSchema, PredictionService, CATEGORY_BANDS},
    report::{render_svg, Reporter, Visualization, DEFAULT_HEIGHT, DEFAULT_WIDTH},
};
use crate::config::DEFAULT_MAX_UPLOAD_BYTES;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

/// Shared application state
pub struct AppState {
    pub service: PredictionService,
    pub reporter: Reporter,
    pub store: DatasetStore,
    pub health_registry: HealthRegistry,
    pub metrics: DashboardMetrics,
    pub logger: StructuredLogger,
    max_upload_bytes: usize,
    /// Held for the whole of each upload, visualize or predict interaction
    interaction: Mutex<()>,
}

impl AppState {
    pub fn new(
        service: PredictionService,
        health_registry: HealthRegistry,
        metrics: DashboardMetrics,
        logger: StructuredLogger,
    ) -> Self {
        let store = service.store().clone();
        Self {
            reporter: Reporter::new(store.clone()),
            store,
            service,
            health_registry,
            metrics,
            logger,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            interaction: Mutex::new(()),
        }
    }

    /// Cap the size of an uploaded dataset body
    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }
}

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Library errors mapped onto HTTP statuses
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn new(status: StatusCode, error: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.into(),
                details,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.body.error, "Request failed");
        }
        (self.status, Json(self.body)).into_response()
    }
}

impl From<DatasetError> for ApiError {
    fn from(e: DatasetError) -> Self {
        match e {
            DatasetError::NotFound => {
                ApiError::new(StatusCode::NOT_FOUND, MISSING_DATASET_ADVISORY, None)
            }
            DatasetError::Csv(_) | DatasetError::Empty => ApiError::new(
                StatusCode::BAD_REQUEST,
                "Uploaded file is not a readable CSV dataset",
                Some(e.to_string()),
            ),
            DatasetError::Io(_) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Dataset storage failed",
                Some(e.to_string()),
            ),
        }
    }
}

impl From<PredictionError> for ApiError {
    fn from(e: PredictionError) -> Self {
        match e {
            PredictionError::Dataset(d) => d.into(),
            PredictionError::UnknownSchema(_) => {
                ApiError::new(StatusCode::NOT_FOUND, e.to_string(), None)
            }
            PredictionError::MissingColumn(_)
            | PredictionError::InvalidInput { .. }
            | PredictionError::ImplausibleAqi(_) => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string(), None)
            }
            PredictionError::Model(_) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("An error occurred: {}", e),
                None,
            ),
        }
    }
}

impl From<ReportError> for ApiError {
    fn from(e: ReportError) -> Self {
        match e {
            ReportError::Dataset(d) => d.into(),
            ReportError::MissingColumn(_) => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string(), None)
            }
            ReportError::Render(_) => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), None)
            }
        }
    }
}

/// Response to a successful upload
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub rows: usize,
    pub size_bytes: usize,
    pub checksum: String,
    pub uploaded_at: i64,
    pub preview: DatasetPreview,
}

async fn upload_dataset(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<UploadResponse>, ApiError> {
    let _guard = state.interaction.lock().await;

    let stored = match state.store.save(&body) {
        Ok(stored) => stored,
        Err(e) => {
            // Uploads cannot be kept at all
            if matches!(e, DatasetError::Io(_)) {
                state
                    .health_registry
                    .set_unhealthy(components::DATASET_STORE, e.to_string())
                    .await;
            }
            return Err(e.into());
        }
    };

    let rows = stored.dataset.len();
    state.metrics.inc_uploads();
    state.metrics.set_dataset_rows(rows as i64);
    state
        .logger
        .log_dataset_uploaded(rows, stored.size_bytes, &stored.checksum);
    state
        .health_registry
        .set_healthy(components::DATASET_STORE)
        .await;

    Ok(Json(UploadResponse {
        message: "Dataset uploaded successfully!".to_string(),
        rows,
        size_bytes: stored.size_bytes,
        checksum: stored.checksum,
        uploaded_at: chrono::Utc::now().timestamp(),
        preview: stored.dataset.preview(PREVIEW_ROWS),
    }))
}

async fn dataset_preview(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DatasetPreview>, ApiError> {
    let _guard = state.interaction.lock().await;
    let dataset = state.store.load()?;
    Ok(Json(dataset.preview(PREVIEW_ROWS)))
}

async fn visualize(State(state): State<Arc<AppState>>) -> Result<Json<Visualization>, ApiError> {
    let _guard = state.interaction.lock().await;
    Ok(Json(state.reporter.visualize()?))
}

async fn visualize_svg(
    State(state): State<Arc<AppState>>,
    Path(file): Path<String>,
) -> Result<Response, ApiError> {
    let chart_id = file
        .strip_suffix(".svg")
        .filter(|id| matches!(*id, "timeseries" | "distribution"))
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::NOT_FOUND,
                format!("Unknown chart '{}'", file),
                Some("Expected timeseries.svg or distribution.svg".to_string()),
            )
        })?;

    let _guard = state.interaction.lock().await;
    let report = match state.reporter.visualize()? {
        Visualization::Ready(report) => report,
        Visualization::Advisory { message } => {
            return Err(ApiError::new(StatusCode::NOT_FOUND, message, None))
        }
    };

    let chart = if chart_id == "timeseries" {
        &report.time_series
    } else {
        &report.distribution
    };
    let svg = render_svg(chart, DEFAULT_WIDTH, DEFAULT_HEIGHT)?;

    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response())
}

/// A schema as presented to clients
#[derive(Debug, Serialize)]
struct SchemaView {
    #[serde(flatten)]
    schema: FeatureSchema,
    /// Column names the model sees, in order
    columns: Vec<String>,
}

async fn schemas(State(state): State<Arc<AppState>>) -> Json<Vec<SchemaView>> {
    let mapping = state.service.mapping();
    Json(
        state
            .service
            .schemas()
            .iter()
            .map(|schema| SchemaView {
                columns: schema.columns(mapping),
                schema: schema.clone(),
            })
            .collect(),
    )
}

async fn categories() -> Json<&'static [CategoryBand]> {
    Json(&CATEGORY_BANDS[..])
}

/// Body of a prediction request
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictRequest {
    pub values: BTreeMap<String, f64>,
}

/// Prediction outcome plus the line shown to the user
#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub message: String,
    #[serde(flatten)]
    pub outcome: PredictionOutcome,
}

impl From<PredictionOutcome> for PredictResponse {
    fn from(outcome: PredictionOutcome) -> Self {
        let message = match outcome.target {
            PredictionTarget::Aqi => format!("Predicted AQI: {}", outcome.display),
            PredictionTarget::Concentration => {
                format!("Predicted concentration: {}", outcome.display)
            }
        };
        Self { message, outcome }
    }
}

async fn predict(
    State(state): State<Arc<AppState>>,
    Path(schema): Path<String>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, ApiError> {
    let _guard = state.interaction.lock().await;
    let input = PredictionInput {
        values: request.values,
    };
    let result = state.service.predict(&schema, &input);

    // A prediction may have loaded a model that failed at startup
    state
        .health_registry
        .record_model_loads(&state.service.model_statuses())
        .await;

    Ok(Json(result?.into()))
}

#[derive(Debug, Deserialize)]
struct SuggestQuery {
    pollutant: String,
}

async fn suggest_lag_inputs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SuggestQuery>,
) -> Result<Json<PredictionInput>, ApiError> {
    let _guard = state.interaction.lock().await;
    Ok(Json(state.service.suggest_lag_inputs(&query.pollutant)?))
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Result<impl IntoResponse, ApiError> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| {
            ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics",
                Some(e.to_string()),
            )
        })?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        buffer,
    ))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        .route(
            "/api/v1/dataset",
            post(upload_dataset).get(dataset_preview).layer(upload_limit),
        )
        .route("/api/v1/visualize", get(visualize))
        .route("/api/v1/visualize/:file", get(visualize_svg))
        .route("/api/v1/schemas", get(schemas))
        .route("/api/v1/categories", get(categories))
        .route("/api/v1/predict/:schema", post(predict))
        .route("/api/v1/predict/lagged/suggest", get(suggest_lag_inputs))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
