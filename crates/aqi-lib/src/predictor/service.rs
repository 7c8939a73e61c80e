//! Schema-driven prediction request handling
//!
//! Validates a single set of user inputs against a `FeatureSchema`, runs the
//! schema's model once and categorizes AQI outputs. Every failure is terminal
//! for the request; nothing is retried.

use super::features::{self, FeatureMapping, FeatureSchema};
use super::output::OutputFormatter;
use super::provider::ModelProvider;
use crate::dataset::DatasetStore;
use crate::error::{PredictionError, ReportError};
use crate::models::{PredictionInput, PredictionOutcome};
use crate::observability::{DashboardMetrics, StructuredLogger};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Prediction request handler shared by every schema
pub struct PredictionService {
    schemas: Vec<FeatureSchema>,
    providers: HashMap<&'static str, Arc<ModelProvider>>,
    mapping: FeatureMapping,
    store: DatasetStore,
    formatter: OutputFormatter,
    metrics: DashboardMetrics,
    logger: StructuredLogger,
}

impl PredictionService {
    pub fn new(
        store: DatasetStore,
        mapping: FeatureMapping,
        formatter: OutputFormatter,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            schemas: Vec::new(),
            providers: HashMap::new(),
            mapping,
            store,
            formatter,
            metrics: DashboardMetrics::new(),
            logger,
        }
    }

    /// Register a schema together with the provider of its model
    pub fn with_schema(mut self, schema: FeatureSchema, provider: Arc<ModelProvider>) -> Self {
        self.providers.insert(schema.name, provider);
        self.schemas.retain(|s| s.name != schema.name);
        self.schemas.push(schema);
        self
    }

    pub fn schemas(&self) -> &[FeatureSchema] {
        &self.schemas
    }

    pub fn schema(&self, name: &str) -> Result<&FeatureSchema, PredictionError> {
        self.schemas
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| PredictionError::UnknownSchema(name.to_string()))
    }

    /// Load state of each registered schema's model, in registration order
    pub fn model_statuses(&self) -> Vec<(&'static str, Result<(), String>)> {
        self.schemas
            .iter()
            .filter_map(|schema| {
                self.providers
                    .get(schema.name)
                    .map(|provider| (schema.name, provider.status()))
            })
            .collect()
    }

    pub fn mapping(&self) -> &FeatureMapping {
        &self.mapping
    }

    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    /// Run one prediction for `schema_name`
    pub fn predict(
        &self,
        schema_name: &str,
        input: &PredictionInput,
    ) -> Result<PredictionOutcome, PredictionError> {
        let start = Instant::now();
        let result = self.run(schema_name, input);
        self.metrics
            .observe_prediction_latency(start.elapsed().as_secs_f64());

        match &result {
            Ok(outcome) => {
                self.metrics.inc_predictions(schema_name);
                self.logger.log_prediction(
                    schema_name,
                    outcome.value,
                    outcome.category.as_ref().map(|c| c.label.as_str()),
                );
            }
            Err(e) => {
                self.metrics.inc_prediction_errors(schema_name);
                self.logger.log_prediction_failure(schema_name, &e.to_string());
            }
        }

        result
    }

    fn run(
        &self,
        schema_name: &str,
        input: &PredictionInput,
    ) -> Result<PredictionOutcome, PredictionError> {
        let schema = self.schema(schema_name)?;

        if schema.checks_dataset_columns {
            // Inspects the historical data shape only, not the input record
            let dataset = self.store.load()?;
            if let Some(missing) = dataset.first_missing(schema.field_names()) {
                return Err(PredictionError::MissingColumn(missing.to_string()));
            }
        }

        let row = schema.build_row(input, &self.mapping)?;
        debug!(schema = schema.name, columns = ?row.columns, "Feature row assembled");

        let provider = self
            .providers
            .get(schema.name)
            .ok_or_else(|| PredictionError::UnknownSchema(schema.name.to_string()))?;
        let model = provider.get().map_err(PredictionError::Model)?;
        let outputs = model.predict(&row).map_err(PredictionError::Model)?;
        let value = *outputs
            .first()
            .ok_or_else(|| PredictionError::Model(anyhow::anyhow!("Model returned no predictions")))?;

        self.formatter.format(schema.name, schema.target, value)
    }

    /// Derive lag inputs for `pollutant` from the uploaded dataset
    pub fn suggest_lag_inputs(&self, pollutant: &str) -> Result<PredictionInput, PredictionError> {
        let dataset = self.store.load()?;
        let readings = dataset.readings().map_err(|e| match e {
            ReportError::MissingColumn(col) => PredictionError::MissingColumn(col),
            ReportError::Dataset(d) => PredictionError::Dataset(d),
            ReportError::Render(msg) => PredictionError::Model(anyhow::anyhow!(msg)),
        })?;
        features::suggest_lag_inputs(&readings, pollutant)
    }
}
