//! Integration tests for the dashboard API endpoints

use aqi_dashboard::{
    api::{create_router, AppState},
    config::DEFAULT_MAX_UPLOAD_BYTES,
};
use aqi_lib::{
    dataset::DatasetStore,
    health::{components, HealthRegistry},
    models::FeatureRow,
    observability::{DashboardMetrics, StructuredLogger},
    predictor::{
        FeatureMapping, FeatureSchema, ModelProvider, OutputFormatter, PredictionService,
        Regressor,
    },
};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const POLLUTANT_CSV: &str = "date,pollutant,concentration
2024-05-01,PM2.5,10
2024-05-02,PM2.5,20
2024-05-03,PM2.5,60
2024-05-01,O3,30
2024-05-02,O3,35
2024-05-03,O3,28
";

struct ConstantRegressor(f64);

impl Regressor for ConstantRegressor {
    fn predict(&self, _row: &FeatureRow) -> anyhow::Result<Vec<f64>> {
        Ok(vec![self.0])
    }

    fn kind(&self) -> &'static str {
        "constant"
    }
}

struct BrokenRegressor;

impl Regressor for BrokenRegressor {
    fn predict(&self, _row: &FeatureRow) -> anyhow::Result<Vec<f64>> {
        anyhow::bail!("Feature names must match those seen at fit time")
    }

    fn kind(&self) -> &'static str {
        "broken"
    }
}

struct TestApp {
    state: Arc<AppState>,
    _dir: TempDir,
}

impl TestApp {
    fn router(&self) -> Router {
        create_router(self.state.clone())
    }
}

async fn setup_test_app_with(pollutant_model: Arc<dyn Regressor>) -> TestApp {
    setup_in(
        TempDir::new().unwrap(),
        ModelProvider::preloaded("pollutants", pollutant_model),
        DEFAULT_MAX_UPLOAD_BYTES,
    )
    .await
}

async fn setup_in(dir: TempDir, pollutants: ModelProvider, max_upload_bytes: usize) -> TestApp {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::DATASET_STORE).await;
    health_registry.register(components::MODEL_PROVIDER).await;

    let logger = StructuredLogger::new("test");
    let service = PredictionService::new(
        DatasetStore::new(dir.path().join("uploaded_data.csv")),
        FeatureMapping::default(),
        OutputFormatter::new(),
        logger.clone(),
    )
    .with_schema(FeatureSchema::pollutants(), Arc::new(pollutants))
    .with_schema(
        FeatureSchema::lagged(),
        Arc::new(ModelProvider::preloaded(
            "lagged",
            Arc::new(ConstantRegressor(17.456)),
        )),
    );

    let state = Arc::new(
        AppState::new(service, health_registry, DashboardMetrics::new(), logger)
            .with_max_upload_bytes(max_upload_bytes),
    );

    TestApp { state, _dir: dir }
}

async fn setup_test_app() -> TestApp {
    setup_test_app_with(Arc::new(ConstantRegressor(45.3))).await
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, value)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// CSV body of at least `min_bytes` bytes
fn large_csv(min_bytes: usize) -> String {
    let mut csv = String::from("date,pollutant,concentration\n");
    let mut day = 0u32;
    while csv.len() < min_bytes {
        csv.push_str(&format!("2024-05-{:02},PM2.5,{}.5\n", day % 28 + 1, day % 90));
        day += 1;
    }
    csv
}

fn upload(csv: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/dataset")
        .header(header::CONTENT_TYPE, "text/csv")
        .body(Body::from(csv.to_string()))
        .unwrap()
}

fn predict(schema: &str, values: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/api/v1/predict/{}", schema))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "values": values }).to_string()))
        .unwrap()
}

fn pollutant_values() -> Value {
    json!({"CO": 0.4, "NO2": 18.0, "O3": 22.0, "PM10": 40.0, "PM2.5": 21.0, "SO2": 3.0})
}

fn lagged_values() -> Value {
    json!({"year": 2024, "month": 5, "day": 4, "lag_1": 60.0, "lag_2": 20.0, "rolling_mean_3": 30.0})
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let app = setup_test_app().await;

    let (status, health) = send(&app, get("/healthz")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert!(health["components"]["dataset_store"].is_object());
    assert!(health["components"]["model_provider"].is_object());
}

#[tokio::test]
async fn test_healthz_returns_ok_when_model_missing() {
    let app = setup_test_app().await;
    app.state
        .health_registry
        .record_model_loads(&[("lagged", Err("concentration_model.onnx not found"))])
        .await;

    let (status, health) = send(&app, get("/healthz")).await;

    // Degraded still returns 200 (operational)
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let app = setup_test_app().await;
    app.state
        .health_registry
        .set_unhealthy(components::DATASET_STORE, "Data directory not writable")
        .await;

    let (status, health) = send(&app, get("/healthz")).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_lifecycle() {
    let app = setup_test_app().await;

    let (status, readiness) = send(&app, get("/readyz")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(readiness["ready"], false);

    app.state.health_registry.set_ready(true).await;
    let (status, readiness) = send(&app, get("/readyz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_visualize_before_upload_is_advisory() {
    let app = setup_test_app().await;

    let (status, body) = send(&app, get("/api/v1/visualize")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "advisory");
    assert_eq!(
        body["message"],
        "Please upload a dataset first in the 'Upload Dataset' section."
    );
}

#[tokio::test]
async fn test_dataset_preview_before_upload_is_404() {
    let app = setup_test_app().await;

    let (status, body) = send(&app, get("/api/v1/dataset")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("Please upload a dataset first"));
}

#[tokio::test]
async fn test_upload_returns_preview() {
    let app = setup_test_app().await;

    let (status, body) = send(&app, upload(POLLUTANT_CSV)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Dataset uploaded successfully!");
    assert_eq!(body["rows"], 6);
    assert_eq!(body["preview"]["rows"].as_array().unwrap().len(), 5);
    assert_eq!(body["checksum"].as_str().unwrap().len(), 64);

    let (status, preview) = send(&app, get("/api/v1/dataset")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        preview["columns"],
        json!(["date", "pollutant", "concentration"])
    );
    assert_eq!(preview["total_rows"], 6);
}

#[tokio::test]
async fn test_upload_larger_than_axum_default_limit() {
    let app = setup_test_app().await;
    let csv = large_csv(3 * 1024 * 1024);

    let (status, body) = send(&app, upload(&csv)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["size_bytes"], csv.len());
    assert_eq!(body["rows"], csv.lines().count() - 1);
}

#[tokio::test]
async fn test_upload_over_configured_limit_is_rejected() {
    let dir = TempDir::new().unwrap();
    let pollutants = ModelProvider::preloaded("pollutants", Arc::new(ConstantRegressor(45.3)));
    let app = setup_in(dir, pollutants, 1024).await;

    let response = app
        .router()
        .oneshot(upload(&large_csv(4096)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let (_, preview) = send(&app, get("/api/v1/dataset")).await;
    assert!(preview["error"]
        .as_str()
        .unwrap()
        .contains("Please upload a dataset first"));
}

#[tokio::test]
async fn test_unwritable_dataset_store_is_unhealthy() {
    let dir = TempDir::new().unwrap();
    let health_registry = HealthRegistry::new();
    health_registry.register(components::DATASET_STORE).await;

    let logger = StructuredLogger::new("test");
    // The dataset path is an existing directory, so writing the file fails
    let service = PredictionService::new(
        DatasetStore::new(dir.path()),
        FeatureMapping::default(),
        OutputFormatter::new(),
        logger.clone(),
    );
    let app = TestApp {
        state: Arc::new(AppState::new(
            service,
            health_registry,
            DashboardMetrics::new(),
            logger,
        )),
        _dir: dir,
    };

    let (status, body) = send(&app, upload(POLLUTANT_CSV)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Dataset storage failed");

    let (status, health) = send(&app, get("/healthz")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["components"]["dataset_store"]["status"], "unhealthy");
}

#[tokio::test]
async fn test_empty_upload_is_rejected() {
    let app = setup_test_app().await;

    let (status, body) = send(&app, upload("")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"].is_string());
}

#[tokio::test]
async fn test_second_upload_replaces_first() {
    let app = setup_test_app().await;

    send(&app, upload(POLLUTANT_CSV)).await;
    let (status, _) = send(&app, upload("date,pollutant,concentration\n2024-06-01,CO,1.2\n")).await;
    assert_eq!(status, StatusCode::OK);

    let (_, preview) = send(&app, get("/api/v1/dataset")).await;
    assert_eq!(preview["total_rows"], 1);
    assert_eq!(preview["rows"][0][1], "CO");
}

#[tokio::test]
async fn test_visualize_after_upload() {
    let app = setup_test_app().await;
    send(&app, upload(POLLUTANT_CSV)).await;

    let (status, body) = send(&app, get("/api/v1/visualize")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["time_series"]["x_axis"], "date");
    assert_eq!(body["time_series"]["series"].as_array().unwrap().len(), 2);
    assert_eq!(body["distribution"]["series"][0]["name"], "PM2.5");
    assert_eq!(body["summaries"][0]["count"], 3);
}

#[tokio::test]
async fn test_svg_charts() {
    let app = setup_test_app().await;

    let (status, _) = send(&app, get("/api/v1/visualize/timeseries.svg")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    send(&app, upload(POLLUTANT_CSV)).await;

    let response = app
        .router()
        .oneshot(get("/api/v1/visualize/distribution.svg"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/svg+xml"
    );
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(String::from_utf8(body.to_vec()).unwrap().contains("<svg"));

    let (status, _) = send(&app, get("/api/v1/visualize/heatmap.svg")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_predict_pollutants_good() {
    let app = setup_test_app().await;

    let (status, body) = send(&app, predict("pollutants", pollutant_values())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Predicted AQI: 45.3");
    assert_eq!(body["category"]["label"], "Good");
    assert_eq!(
        body["category"]["description"],
        "Air quality is satisfactory and poses little or no risk."
    );
}

#[tokio::test]
async fn test_predict_pollutants_unhealthy() {
    let app = setup_test_app_with(Arc::new(ConstantRegressor(150.0))).await;

    let (status, body) = send(&app, predict("pollutants", pollutant_values())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["category"]["label"], "Unhealthy");
}

#[tokio::test]
async fn test_predict_rejects_negative_concentration() {
    let app = setup_test_app().await;
    let mut values = pollutant_values();
    values["CO"] = json!(-1.0);

    let (status, body) = send(&app, predict("pollutants", values)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("CO"));
}

#[tokio::test]
async fn test_predict_lagged_names_missing_column() {
    let app = setup_test_app().await;
    send(
        &app,
        upload("year,month,day,lag_1,rolling_mean_3\n2024,5,1,17.0,16.0\n"),
    )
    .await;

    let (status, body) = send(&app, predict("lagged", lagged_values())).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body["error"],
        "Column 'lag_2' is missing from the uploaded dataset"
    );
}

#[tokio::test]
async fn test_predict_lagged_without_dataset() {
    let app = setup_test_app().await;

    let (status, body) = send(&app, predict("lagged", lagged_values())).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("Please upload a dataset first"));
}

#[tokio::test]
async fn test_predict_lagged_concentration() {
    let app = setup_test_app().await;
    send(
        &app,
        upload("year,month,day,lag_1,lag_2,rolling_mean_3\n2024,5,1,17.0,16.0,16.5\n"),
    )
    .await;

    let (status, body) = send(&app, predict("lagged", lagged_values())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Predicted concentration: 17.46");
    assert!(body.get("category").is_none());
}

#[tokio::test]
async fn test_model_failure_is_500() {
    let app = setup_test_app_with(Arc::new(BrokenRegressor)).await;

    let (status, body) = send(&app, predict("pollutants", pollutant_values())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body["error"],
        "An error occurred: Feature names must match those seen at fit time"
    );
}

#[tokio::test]
async fn test_model_health_recovers_after_lazy_load() {
    let dir = TempDir::new().unwrap();
    let model_path = dir.path().join("pollutants.json");
    let pollutants = ModelProvider::new("pollutants", &model_path, 6);
    assert!(pollutants.get().is_err());

    let app = setup_in(dir, pollutants, DEFAULT_MAX_UPLOAD_BYTES).await;
    app.state
        .health_registry
        .record_model_loads(&app.state.service.model_statuses())
        .await;

    let (_, health) = send(&app, get("/healthz")).await;
    assert_eq!(health["components"]["model_provider"]["status"], "degraded");
    assert!(health["components"]["model_provider"]["message"]
        .as_str()
        .unwrap()
        .contains("pollutants model unavailable"));

    let (status, _) = send(&app, predict("pollutants", pollutant_values())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    std::fs::write(
        &model_path,
        json!({
            "features": ["CO", "NO2", "O3", "PM 10", "PM 2.5", "SO2"],
            "intercept": 0.0,
            "coefficients": [0.0, 0.0, 0.0, 0.0, 1.0, 0.0]
        })
        .to_string(),
    )
    .unwrap();

    let (status, body) = send(&app, predict("pollutants", pollutant_values())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Predicted AQI: 21.0");

    let (status, health) = send(&app, get("/healthz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["components"]["model_provider"]["status"], "healthy");
}

#[tokio::test]
async fn test_unknown_schema_is_404() {
    let app = setup_test_app().await;

    let (status, _) = send(&app, predict("weather", json!({}))).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_suggest_lag_inputs() {
    let app = setup_test_app().await;
    send(&app, upload(POLLUTANT_CSV)).await;

    let (status, body) = send(&app, get("/api/v1/predict/lagged/suggest?pollutant=PM2.5")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["values"]["lag_1"], 60.0);
    assert_eq!(body["values"]["lag_2"], 20.0);
    assert_eq!(body["values"]["rolling_mean_3"], 30.0);
    assert_eq!(body["values"]["day"], 4.0);
}

#[tokio::test]
async fn test_categories_and_schemas() {
    let app = setup_test_app().await;

    let (status, bands) = send(&app, get("/api/v1/categories")).await;
    assert_eq!(status, StatusCode::OK);
    let bands = bands.as_array().unwrap();
    assert_eq!(bands.len(), 5);
    assert_eq!(bands[3]["label"], "Very Unhealthy");

    let (status, schemas) = send(&app, get("/api/v1/schemas")).await;
    assert_eq!(status, StatusCode::OK);
    let pollutants = schemas
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["name"] == "pollutants")
        .unwrap();
    assert_eq!(
        pollutants["columns"],
        json!(["CO", "NO2", "O3", "PM 10", "PM 2.5", "SO2"])
    );
    assert_eq!(pollutants["target"], "aqi");
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let app = setup_test_app().await;
    send(&app, upload(POLLUTANT_CSV)).await;
    send(&app, predict("pollutants", pollutant_values())).await;

    let response = app.router().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("aqi_dashboard_predictions_total"));
    assert!(metrics_text.contains("aqi_dashboard_uploads_total"));
    assert!(metrics_text.contains("aqi_dashboard_prediction_latency_seconds_bucket"));
}
