//! Regression model inference
//!
//! Two artifact formats are supported: ONNX graphs run with tract, and a
//! plain JSON linear model. Both take a single feature row and return the
//! model's output values.

use super::Regressor;
use crate::models::FeatureRow;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tract_onnx::prelude::*;
use tracing::{debug, warn};

/// Inference latency above which a warning is logged
const MAX_INFERENCE_MS: u128 = 50;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

fn log_latency(started: Instant) {
    let elapsed = started.elapsed();
    if elapsed.as_millis() > MAX_INFERENCE_MS {
        warn!(elapsed_ms = elapsed.as_millis(), "Inference exceeded {}ms target", MAX_INFERENCE_MS);
    } else {
        debug!(elapsed_us = elapsed.as_micros(), "Inference completed");
    }
}

/// ONNX regressor run with tract
pub struct OnnxRegressor {
    model: TractModel,
    num_features: usize,
}

impl OnnxRegressor {
    /// Parse and optimize an ONNX model taking `f32[1, num_features]`
    pub fn new(model_bytes: &[u8], num_features: usize) -> Result<Self> {
        let proto = tract_onnx::onnx()
            .proto_model_for_read(&mut std::io::Cursor::new(model_bytes))
            .context("Failed to parse ONNX model")?;
        Self::from_proto(&proto, num_features)
    }

    fn from_proto(proto: &tract_onnx::pb::ModelProto, num_features: usize) -> Result<Self> {
        let model = tract_onnx::onnx()
            .model_for_proto_model(proto)
            .context("Failed to build ONNX graph")?
            .with_input_fact(0, f32::fact([1, num_features]).into())
            .context("Failed to set input shape")?
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")?;

        Ok(Self {
            model,
            num_features,
        })
    }

    fn row_to_tensor(&self, row: &FeatureRow) -> Result<Tensor> {
        if row.len() != self.num_features {
            anyhow::bail!(
                "Model expects {} features, got {}",
                self.num_features,
                row.len()
            );
        }
        let data: Vec<f32> = row.values.iter().map(|v| *v as f32).collect();
        let array = tract_ndarray::Array2::from_shape_vec((1, self.num_features), data)
            .context("Failed to shape feature row")?;
        Ok(array.into())
    }
}

impl Regressor for OnnxRegressor {
    fn predict(&self, row: &FeatureRow) -> Result<Vec<f64>> {
        let start = Instant::now();
        let input = self.row_to_tensor(row)?;

        let result = self.model.run(tvec!(input.into()))?;
        let output = result.first().context("No output from model")?;
        let values: Vec<f64> = output
            .to_array_view::<f32>()
            .context("Model output is not a float tensor")?
            .iter()
            .map(|v| *v as f64)
            .collect();

        log_latency(start);
        Ok(values)
    }

    fn kind(&self) -> &'static str {
        "onnx"
    }
}

/// Linear regression serialized as JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    /// Column names the model was fitted on, in order
    pub features: Vec<String>,
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

/// Linear regressor with a strict feature-name check
#[derive(Debug)]
pub struct LinearRegressor {
    model: LinearModel,
}

impl LinearRegressor {
    pub fn new(model: LinearModel) -> Result<Self> {
        if model.features.len() != model.coefficients.len() {
            anyhow::bail!(
                "Linear model has {} features but {} coefficients",
                model.features.len(),
                model.coefficients.len()
            );
        }
        Ok(Self { model })
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let model: LinearModel =
            serde_json::from_slice(bytes).context("Failed to parse linear model")?;
        Self::new(model)
    }

    pub fn features(&self) -> &[String] {
        &self.model.features
    }
}

impl Regressor for LinearRegressor {
    fn predict(&self, row: &FeatureRow) -> Result<Vec<f64>> {
        let start = Instant::now();

        if row.columns != self.model.features {
            anyhow::bail!(
                "Feature names must match those seen at fit time: expected {:?}, got {:?}",
                self.model.features,
                row.columns
            );
        }

        let value = self.model.intercept
            + row
                .values
                .iter()
                .zip(&self.model.coefficients)
                .map(|(x, w)| x * w)
                .sum::<f64>();

        log_latency(start);
        Ok(vec![value])
    }

    fn kind(&self) -> &'static str {
        "linear"
    }
}
