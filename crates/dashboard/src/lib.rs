//! AQI dashboard service: HTTP API over the dataset, chart and prediction
//! workflows

pub mod api;
pub mod config;
