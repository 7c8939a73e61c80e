//! Dashboard configuration

use aqi_lib::predictor::{FeatureMapping, FeatureSchema, LAGGED_SCHEMA, POLLUTANTS_SCHEMA};
use aqi_lib::dataset::DEFAULT_DATASET_PATH;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Config file read when `AQI_CONFIG` is not set
pub const DEFAULT_CONFIG_FILE: &str = "aqi-dashboard.toml";

/// Largest accepted dataset upload, in bytes
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;

/// Model artifact settings for one schema
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaConfig {
    pub model_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchemasConfig {
    #[serde(default = "default_pollutants_schema")]
    pub pollutants: SchemaConfig,

    #[serde(default = "default_lagged_schema")]
    pub lagged: SchemaConfig,
}

impl Default for SchemasConfig {
    fn default() -> Self {
        Self {
            pollutants: default_pollutants_schema(),
            lagged: default_lagged_schema(),
        }
    }
}

impl SchemasConfig {
    pub fn model_path(&self, schema: &str) -> Option<&PathBuf> {
        match schema {
            POLLUTANTS_SCHEMA => Some(&self.pollutants.model_path),
            LAGGED_SCHEMA => Some(&self.lagged.model_path),
            _ => None,
        }
    }
}

/// Dashboard configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// Name attached to structured log records
    #[serde(default = "default_instance")]
    pub instance: String,

    /// Port of the HTTP API
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Where the uploaded CSV is kept
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    #[serde(default)]
    pub schemas: SchemasConfig,

    /// Field name to model column overrides, merged over the defaults
    #[serde(default)]
    pub feature_mapping: BTreeMap<String, String>,

    /// Reject negative or non-finite AQI predictions
    #[serde(default = "default_reject_negative_aqi")]
    pub reject_negative_aqi: bool,
}

fn default_instance() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "aqi-dashboard".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_data_path() -> PathBuf {
    PathBuf::from(DEFAULT_DATASET_PATH)
}

fn default_max_upload_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}

fn default_pollutants_schema() -> SchemaConfig {
    SchemaConfig {
        model_path: PathBuf::from("aqi_model.onnx"),
    }
}

fn default_lagged_schema() -> SchemaConfig {
    SchemaConfig {
        model_path: PathBuf::from("concentration_model.onnx"),
    }
}

fn default_reject_negative_aqi() -> bool {
    true
}

impl DashboardConfig {
    /// Load from the optional config file, then `AQI_*` environment variables.
    ///
    /// Nested keys use `__`, e.g. `AQI_SCHEMAS__LAGGED__MODEL_PATH`.
    pub fn load() -> Result<Self> {
        let path = std::env::var("AQI_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let builder = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(
                config::Environment::with_prefix("AQI")
                    .prefix_separator("_")
                    .separator("__"),
            );
        Self::from_builder(builder).with_context(|| format!("Invalid configuration (file {})", path))
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        Ok(builder.build()?.try_deserialize()?)
    }

    /// Default mapping with configured overrides applied.
    ///
    /// Override keys match schema fields case-insensitively, since config
    /// sources may lowercase them.
    pub fn feature_mapping(&self) -> FeatureMapping {
        let fields: Vec<&'static str> = FeatureSchema::builtin()
            .iter()
            .flat_map(|s| s.field_names().collect::<Vec<_>>())
            .collect();

        self.feature_mapping
            .iter()
            .fold(FeatureMapping::default(), |mapping, (key, column)| {
                let field = fields
                    .iter()
                    .find(|f| f.eq_ignore_ascii_case(key))
                    .map(|f| f.to_string())
                    .unwrap_or_else(|| key.clone());
                mapping.with(field, column.as_str())
            })
    }
}
