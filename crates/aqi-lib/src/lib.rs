//! Core library for the AQI dashboard
//!
//! This crate provides:
//! - Dataset upload storage and CSV parsing
//! - Pollutant trend and distribution charts
//! - AQI and concentration prediction from pre-trained models
//! - AQI categorization using Malaysian thresholds
//! - Health checks and observability

pub mod dataset;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod report;

pub use dataset::{Dataset, DatasetStore, StoredDataset};
pub use error::{DatasetError, PredictionError, ReportError, MISSING_DATASET_ADVISORY};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{DashboardMetrics, StructuredLogger};
pub use predictor::{categorize, PredictionService};
pub use report::{Reporter, Visualization};
