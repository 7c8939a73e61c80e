//! Lazily loaded, process-lifetime model cache
//!
//! A `ModelProvider` owns one artifact path. The first successful `get()`
//! deserializes the artifact; every later call returns the same instance.
//! There is no invalidation and no reload when the file changes. A failed
//! load is not cached; its message is kept for health reporting until a
//! later load succeeds.

use super::inference::{LinearRegressor, OnnxRegressor};
use super::Regressor;
use crate::dataset::compute_checksum;
use crate::observability::DashboardMetrics;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::{debug, info};

/// Artifact encoding, chosen from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    Onnx,
    Linear,
}

impl ArtifactFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ArtifactFormat::Linear,
            _ => ArtifactFormat::Onnx,
        }
    }
}

/// Description of a loaded model
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub schema: String,
    pub path: String,
    pub kind: String,
    pub checksum: Option<String>,
    pub loaded_at: i64,
}

struct LoadedModel {
    regressor: Arc<dyn Regressor>,
    info: ModelInfo,
}

/// Memoized model loader for one schema
pub struct ModelProvider {
    schema: String,
    path: PathBuf,
    num_features: usize,
    slot: RwLock<Option<LoadedModel>>,
    last_error: RwLock<Option<String>>,
    metrics: DashboardMetrics,
}

impl ModelProvider {
    pub fn new(schema: impl Into<String>, path: impl Into<PathBuf>, num_features: usize) -> Self {
        Self {
            schema: schema.into(),
            path: path.into(),
            num_features,
            slot: RwLock::new(None),
            last_error: RwLock::new(None),
            metrics: DashboardMetrics::new(),
        }
    }

    /// Provider that starts with an already constructed model
    pub fn preloaded(schema: impl Into<String>, regressor: Arc<dyn Regressor>) -> Self {
        let schema = schema.into();
        let info = ModelInfo {
            schema: schema.clone(),
            path: String::new(),
            kind: regressor.kind().to_string(),
            checksum: None,
            loaded_at: chrono::Utc::now().timestamp(),
        };
        Self {
            schema,
            path: PathBuf::new(),
            num_features: 0,
            slot: RwLock::new(Some(LoadedModel { regressor, info })),
            last_error: RwLock::new(None),
            metrics: DashboardMetrics::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.read().map(|s| s.is_some()).unwrap_or(false)
    }

    /// `Ok` once a model is cached, otherwise the reason it is not
    pub fn status(&self) -> Result<(), String> {
        if self.is_loaded() {
            return Ok(());
        }
        let last_error = self.last_error.read().ok().and_then(|e| e.clone());
        Err(last_error.unwrap_or_else(|| "model not loaded yet".to_string()))
    }

    /// Info about the cached model, if one has been loaded
    pub fn info(&self) -> Option<ModelInfo> {
        self.slot
            .read()
            .ok()
            .and_then(|s| s.as_ref().map(|m| m.info.clone()))
    }

    /// Return the cached model, loading it on first use
    pub fn get(&self) -> Result<Arc<dyn Regressor>> {
        {
            let slot = self
                .slot
                .read()
                .map_err(|e| anyhow::anyhow!("Lock poisoned: {}", e))?;
            if let Some(loaded) = slot.as_ref() {
                return Ok(loaded.regressor.clone());
            }
        }

        let mut slot = self
            .slot
            .write()
            .map_err(|e| anyhow::anyhow!("Lock poisoned: {}", e))?;

        // Another caller may have loaded it while we waited for the write lock
        if let Some(loaded) = slot.as_ref() {
            return Ok(loaded.regressor.clone());
        }

        let loaded = match self.load() {
            Ok(loaded) => loaded,
            Err(e) => {
                self.set_last_error(Some(format!("{:#}", e)));
                return Err(e);
            }
        };
        let regressor = loaded.regressor.clone();
        *slot = Some(loaded);
        self.set_last_error(None);
        Ok(regressor)
    }

    fn set_last_error(&self, error: Option<String>) {
        if let Ok(mut last) = self.last_error.write() {
            *last = error;
        }
    }

    fn load(&self) -> Result<LoadedModel> {
        let start = Instant::now();
        debug!(schema = %self.schema, path = %self.path.display(), "Loading model artifact");

        let bytes = std::fs::read(&self.path)
            .with_context(|| format!("Failed to read model artifact {}", self.path.display()))?;
        let checksum = compute_checksum(&bytes);

        let regressor: Arc<dyn Regressor> = match ArtifactFormat::from_path(&self.path) {
            ArtifactFormat::Onnx => Arc::new(OnnxRegressor::new(&bytes, self.num_features)?),
            ArtifactFormat::Linear => Arc::new(LinearRegressor::from_json(&bytes)?),
        };

        let elapsed = start.elapsed();
        self.metrics.observe_model_load_latency(elapsed.as_secs_f64());
        self.metrics.set_model_info(&self.schema, &checksum);

        info!(
            schema = %self.schema,
            path = %self.path.display(),
            kind = regressor.kind(),
            checksum = %checksum,
            elapsed_ms = elapsed.as_millis(),
            "Model loaded"
        );

        Ok(LoadedModel {
            info: ModelInfo {
                schema: self.schema.clone(),
                path: self.path.display().to_string(),
                kind: regressor.kind().to_string(),
                checksum: Some(checksum),
                loaded_at: chrono::Utc::now().timestamp(),
            },
            regressor,
        })
    }
}
