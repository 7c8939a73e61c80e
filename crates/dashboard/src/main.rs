//! AQI Dashboard - air quality dataset upload, charts and AQI prediction
//!
//! Serves the upload, visualize and predict workflows over HTTP, together
//! with health probes and Prometheus metrics.

use anyhow::Result;
use aqi_dashboard::{api, config::DashboardConfig};
use aqi_lib::{
    dataset::DatasetStore,
    health::{components, HealthRegistry},
    observability::{DashboardMetrics, StructuredLogger},
    predictor::{FeatureSchema, ModelProvider, OutputConfig, OutputFormatter, PredictionService},
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DASHBOARD_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting aqi-dashboard");

    let config = DashboardConfig::load()?;
    info!(
        instance = %config.instance,
        data_path = %config.data_path.display(),
        max_upload_bytes = config.max_upload_bytes,
        "Dashboard configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::DATASET_STORE).await;
    health_registry.register(components::MODEL_PROVIDER).await;

    let metrics = DashboardMetrics::new();
    let logger = StructuredLogger::new(&config.instance);

    let store = DatasetStore::new(&config.data_path);
    if store.exists() {
        match store.load() {
            Ok(dataset) => metrics.set_dataset_rows(dataset.len() as i64),
            Err(e) => warn!(error = %e, "Existing dataset could not be read"),
        }
    }

    let formatter = OutputFormatter::with_config(OutputConfig {
        reject_implausible_aqi: config.reject_negative_aqi,
        ..OutputConfig::default()
    });
    let mut service =
        PredictionService::new(store, config.feature_mapping(), formatter, logger.clone());

    // Load every model up front so a missing artifact shows in /healthz;
    // a failed load is retried on the next prediction
    for schema in FeatureSchema::builtin() {
        let Some(path) = config.schemas.model_path(schema.name) else {
            continue;
        };
        let provider = Arc::new(ModelProvider::new(schema.name, path, schema.len()));

        match provider.get() {
            Ok(model) => {
                let checksum = provider.info().and_then(|i| i.checksum);
                logger.log_model_loaded(schema.name, model.kind(), checksum.as_deref());
            }
            Err(e) => logger.log_model_load_failure(schema.name, &format!("{:#}", e)),
        }
        service = service.with_schema(schema, provider);
    }
    health_registry
        .record_model_loads(&service.model_statuses())
        .await;

    let app_state = Arc::new(
        api::AppState::new(service, health_registry.clone(), metrics, logger.clone())
            .with_max_upload_bytes(config.max_upload_bytes),
    );

    health_registry.set_ready(true).await;
    logger.log_startup(DASHBOARD_VERSION, &format!("0.0.0.0:{}", config.api_port));

    tokio::select! {
        result = api::serve(config.api_port, app_state) => {
            if let Err(e) = result {
                logger.log_shutdown(&format!("API server failed: {:#}", e));
                return Err(e);
            }
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
        }
    }

    info!("Shutting down");
    Ok(())
}
