//! Error taxonomy for the dashboard workflows

use thiserror::Error;

/// Advisory shown when a workflow needs a dataset that was never uploaded
pub const MISSING_DATASET_ADVISORY: &str =
    "Please upload a dataset first in the 'Upload Dataset' section.";

/// Errors raised by the dataset slot
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("{}", MISSING_DATASET_ADVISORY)]
    NotFound,

    #[error("Failed to read dataset: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Uploaded dataset is empty")]
    Empty,
}

/// Errors raised by a prediction interaction
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("Unknown feature schema '{0}'")]
    UnknownSchema(String),

    #[error("Column '{0}' is missing from the uploaded dataset")]
    MissingColumn(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Model predicted an implausible AQI value {0}")]
    ImplausibleAqi(f64),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("{0:#}")]
    Model(anyhow::Error),
}

impl PredictionError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        PredictionError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True for failures the user fixes by uploading a dataset
    pub fn is_missing_dataset(&self) -> bool {
        matches!(self, PredictionError::Dataset(DatasetError::NotFound))
    }
}

/// Errors raised while building charts
#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("Column '{0}' is missing from the uploaded dataset")]
    MissingColumn(String),

    #[error("Failed to render chart: {0}")]
    Render(String),
}
