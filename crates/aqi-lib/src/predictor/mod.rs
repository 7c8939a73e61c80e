//! AQI prediction engine

mod features;
mod inference;
mod output;
mod provider;
mod service;

pub use features::{
    suggest_lag_inputs, FeatureMapping, FeatureSchema, FieldSpec, LAGGED_SCHEMA,
    POLLUTANTS_SCHEMA, ROLLING_WINDOW,
};
pub use inference::{LinearModel, LinearRegressor, OnnxRegressor};
pub use output::{
    categorize, CategoryBand, OutputConfig, OutputFormatter, AQI_DECIMALS, CATEGORY_BANDS,
    CONCENTRATION_DECIMALS,
};
pub use provider::{ArtifactFormat, ModelInfo, ModelProvider};
pub use service::PredictionService;

use crate::models::FeatureRow;
use anyhow::Result;

/// Trait for regression model implementations
pub trait Regressor: Send + Sync {
    /// Run the model on a single feature row, returning its output values
    fn predict(&self, row: &FeatureRow) -> Result<Vec<f64>>;

    /// Short name of the model implementation
    fn kind(&self) -> &'static str;
}
