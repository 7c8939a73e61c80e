//! Core data models for the AQI dashboard

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single pollutant observation from the uploaded dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollutantReading {
    pub pollutant: String,
    /// Advisory only: negative concentrations are not rejected
    pub concentration: f64,
    pub date: Option<NaiveDate>,
}

/// Raw user-supplied values for one prediction, keyed by input field name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictionInput {
    pub values: BTreeMap<String, f64>,
}

impl PredictionInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: f64) -> Self {
        self.values.insert(field.into(), value);
        self
    }

    pub fn get(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied()
    }
}

/// A single-row feature record in model column order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRow {
    pub columns: Vec<String>,
    pub values: Vec<f64>,
}

impl FeatureRow {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// What a schema's model predicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionTarget {
    /// Air Quality Index, categorized after prediction
    Aqi,
    /// Pollutant concentration estimate, shown as-is
    Concentration,
}

/// Malaysia AQI category label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AqiLabel {
    Good,
    Moderate,
    Unhealthy,
    #[serde(rename = "Very Unhealthy")]
    VeryUnhealthy,
    Hazardous,
}

impl AqiLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AqiLabel::Good => "Good",
            AqiLabel::Moderate => "Moderate",
            AqiLabel::Unhealthy => "Unhealthy",
            AqiLabel::VeryUnhealthy => "Very Unhealthy",
            AqiLabel::Hazardous => "Hazardous",
        }
    }
}

impl std::fmt::Display for AqiLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category derived from a numeric AQI value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AqiCategory {
    pub label: AqiLabel,
    pub description: &'static str,
}

/// Result of one prediction interaction
#[derive(Debug, Clone, Serialize)]
pub struct PredictionOutcome {
    pub schema: String,
    pub target: PredictionTarget,
    pub value: f64,
    /// Value formatted for display
    pub display: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<AqiCategory>,
    pub generated_at: i64,
}

/// First rows of a dataset, for preview
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetPreview {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub total_rows: usize,
}
