//! Prediction output categorization and formatting
//!
//! Maps raw model outputs to the Malaysia AQI scale and formats them for
//! display.

use crate::error::PredictionError;
use crate::models::{AqiCategory, AqiLabel, PredictionOutcome, PredictionTarget};
use serde::Serialize;

/// Decimal places shown for a predicted AQI
pub const AQI_DECIMALS: usize = 1;

/// Decimal places shown for a predicted concentration
pub const CONCENTRATION_DECIMALS: usize = 2;

/// One band of the Malaysia AQI scale
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CategoryBand {
    pub label: AqiLabel,
    /// Inclusive upper bound; `None` for the open-ended top band
    pub upper_bound: Option<f64>,
    pub range: &'static str,
    pub description: &'static str,
}

/// Malaysia AQI bands in ascending order
pub const CATEGORY_BANDS: [CategoryBand; 5] = [
    CategoryBand {
        label: AqiLabel::Good,
        upper_bound: Some(50.0),
        range: "0–50",
        description: "Air quality is satisfactory and poses little or no risk.",
    },
    CategoryBand {
        label: AqiLabel::Moderate,
        upper_bound: Some(100.0),
        range: "51–100",
        description: "Air quality is acceptable; some pollutants may be a concern for sensitive individuals.",
    },
    CategoryBand {
        label: AqiLabel::Unhealthy,
        upper_bound: Some(200.0),
        range: "101–200",
        description: "Air quality may cause adverse health effects for sensitive groups.",
    },
    CategoryBand {
        label: AqiLabel::VeryUnhealthy,
        upper_bound: Some(300.0),
        range: "201–300",
        description: "Health alert: everyone may experience serious health effects.",
    },
    CategoryBand {
        label: AqiLabel::Hazardous,
        upper_bound: None,
        range: "301–500",
        description: "Emergency conditions: health warnings for all population groups.",
    },
];

/// Classify an AQI value. Total over all inputs: values at or below 50
/// (including negatives) are Good; NaN falls through to Hazardous.
pub fn categorize(value: f64) -> AqiCategory {
    let band = if value <= 50.0 {
        &CATEGORY_BANDS[0]
    } else if value <= 100.0 {
        &CATEGORY_BANDS[1]
    } else if value <= 200.0 {
        &CATEGORY_BANDS[2]
    } else if value <= 300.0 {
        &CATEGORY_BANDS[3]
    } else {
        &CATEGORY_BANDS[4]
    };

    AqiCategory {
        label: band.label,
        description: band.description,
    }
}

/// Configuration for output formatting
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Reject negative or non-finite AQI predictions instead of labelling them
    pub reject_implausible_aqi: bool,
    pub aqi_decimals: usize,
    pub concentration_decimals: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            reject_implausible_aqi: true,
            aqi_decimals: AQI_DECIMALS,
            concentration_decimals: CONCENTRATION_DECIMALS,
        }
    }
}

/// Turns a raw model output into a `PredictionOutcome`
#[derive(Debug, Clone, Default)]
pub struct OutputFormatter {
    config: OutputConfig,
}

impl OutputFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn format(
        &self,
        schema: &str,
        target: PredictionTarget,
        value: f64,
    ) -> Result<PredictionOutcome, PredictionError> {
        let (display, category) = match target {
            PredictionTarget::Aqi => {
                if self.config.reject_implausible_aqi && !(value.is_finite() && value >= 0.0) {
                    return Err(PredictionError::ImplausibleAqi(value));
                }
                (
                    format!("{:.*}", self.config.aqi_decimals, value),
                    Some(categorize(value)),
                )
            }
            PredictionTarget::Concentration => (
                format!("{:.*}", self.config.concentration_decimals, value),
                None,
            ),
        };

        Ok(PredictionOutcome {
            schema: schema.to_string(),
            target,
            value,
            display,
            category,
            generated_at: chrono::Utc::now().timestamp(),
        })
    }
}
