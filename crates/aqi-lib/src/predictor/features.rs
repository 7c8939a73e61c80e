//! Feature schemas and single-row feature assembly
//!
//! A `FeatureSchema` lists the scalar inputs a model was trained on, in
//! training order. A `FeatureMapping` translates input field names to the
//! column names the model artifact expects, which for the pollutant model
//! contain literal whitespace ("PM 10", "PM 2.5").

use crate::error::PredictionError;
use crate::models::{FeatureRow, PollutantReading, PredictionInput, PredictionTarget};
use chrono::{Datelike, Duration};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema name of the pollutant-concentration model
pub const POLLUTANTS_SCHEMA: &str = "pollutants";

/// Schema name of the lag/time-feature model
pub const LAGGED_SCHEMA: &str = "lagged";

/// Number of trailing observations averaged into `rolling_mean_3`
pub const ROLLING_WINDOW: usize = 3;

/// A single scalar input of a schema
#[derive(Debug, Clone, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub unit: Option<&'static str>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub integer: bool,
}

impl FieldSpec {
    const fn concentration(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            unit: Some("µg/m³"),
            min: Some(0.0),
            max: None,
            integer: false,
        }
    }

    const fn integer(name: &'static str, description: &'static str, min: f64, max: f64) -> Self {
        Self {
            name,
            description,
            unit: None,
            min: Some(min),
            max: Some(max),
            integer: true,
        }
    }

    const fn real(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            unit: None,
            min: None,
            max: None,
            integer: false,
        }
    }

    /// Check a supplied value against the declared constraints
    pub fn validate(&self, value: f64) -> Result<(), PredictionError> {
        if !value.is_finite() {
            return Err(PredictionError::invalid(self.name, "must be a finite number"));
        }
        if self.integer && value.fract() != 0.0 {
            return Err(PredictionError::invalid(self.name, "must be a whole number"));
        }
        if let Some(min) = self.min {
            if value < min {
                return Err(PredictionError::invalid(
                    self.name,
                    format!("{} is below the minimum {}", value, min),
                ));
            }
        }
        if let Some(max) = self.max {
            if value > max {
                return Err(PredictionError::invalid(
                    self.name,
                    format!("{} is above the maximum {}", value, max),
                ));
            }
        }
        Ok(())
    }
}

/// Ordered list of model inputs plus what the model predicts
#[derive(Debug, Clone, Serialize)]
pub struct FeatureSchema {
    pub name: &'static str,
    pub target: PredictionTarget,
    pub fields: Vec<FieldSpec>,
    /// Require every field to also be a column of the uploaded dataset
    pub checks_dataset_columns: bool,
}

impl FeatureSchema {
    /// Pollutant-concentration form, predicting AQI
    pub fn pollutants() -> Self {
        Self {
            name: POLLUTANTS_SCHEMA,
            target: PredictionTarget::Aqi,
            fields: vec![
                FieldSpec::concentration("CO", "Carbon Monoxide"),
                FieldSpec::concentration("NO2", "Nitrogen Dioxide"),
                FieldSpec::concentration("O3", "Ozone"),
                FieldSpec::concentration("PM10", "Particulate Matter 10"),
                FieldSpec::concentration("PM2.5", "Particulate Matter 2.5"),
                FieldSpec::concentration("SO2", "Sulfur Dioxide"),
            ],
            checks_dataset_columns: false,
        }
    }

    /// Time/lag form, predicting a concentration
    pub fn lagged() -> Self {
        Self {
            name: LAGGED_SCHEMA,
            target: PredictionTarget::Concentration,
            fields: vec![
                FieldSpec::integer("year", "Year", 2000.0, 2100.0),
                FieldSpec::integer("month", "Month", 1.0, 12.0),
                FieldSpec::integer("day", "Day of month", 1.0, 31.0),
                FieldSpec::real("lag_1", "Concentration one day earlier"),
                FieldSpec::real("lag_2", "Concentration two days earlier"),
                FieldSpec::real("rolling_mean_3", "Mean of the last three days"),
            ],
            checks_dataset_columns: true,
        }
    }

    /// All built-in schemas
    pub fn builtin() -> Vec<Self> {
        vec![Self::pollutants(), Self::lagged()]
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Model-facing column names in schema order
    pub fn columns(&self, mapping: &FeatureMapping) -> Vec<String> {
        self.field_names()
            .map(|f| mapping.column_for(f).to_string())
            .collect()
    }

    /// Validate an input and assemble the single feature row for the model
    pub fn build_row(
        &self,
        input: &PredictionInput,
        mapping: &FeatureMapping,
    ) -> Result<FeatureRow, PredictionError> {
        if let Some(unknown) = input
            .values
            .keys()
            .find(|k| !self.fields.iter().any(|f| f.name == k.as_str()))
        {
            return Err(PredictionError::invalid(
                unknown.as_str(),
                format!("not a field of schema '{}'", self.name),
            ));
        }

        let mut values = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let value = input
                .get(field.name)
                .ok_or_else(|| PredictionError::invalid(field.name, "value is required"))?;
            field.validate(value)?;
            values.push(value);
        }

        Ok(FeatureRow {
            columns: self.columns(mapping),
            values,
        })
    }
}

/// Input field name to model column name translation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureMapping {
    columns: BTreeMap<String, String>,
}

impl Default for FeatureMapping {
    /// Column names the pollutant model was trained with
    fn default() -> Self {
        Self::identity()
            .with("PM10", "PM 10")
            .with("PM2.5", "PM 2.5")
    }
}

impl FeatureMapping {
    /// Mapping that uses every field name unchanged
    pub fn identity() -> Self {
        Self {
            columns: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field: impl Into<String>, column: impl Into<String>) -> Self {
        self.columns.insert(field.into(), column.into());
        self
    }

    pub fn column_for<'a>(&'a self, field: &'a str) -> &'a str {
        self.columns.get(field).map(String::as_str).unwrap_or(field)
    }
}

/// Derive lag inputs for the day after the latest dated reading of `pollutant`
pub fn suggest_lag_inputs(
    readings: &[PollutantReading],
    pollutant: &str,
) -> Result<PredictionInput, PredictionError> {
    let mut history: Vec<_> = readings
        .iter()
        .filter(|r| r.pollutant == pollutant)
        .filter_map(|r| r.date.map(|d| (d, r.concentration)))
        .collect();

    if history.len() < ROLLING_WINDOW {
        return Err(PredictionError::invalid(
            "pollutant",
            format!(
                "'{}' has {} dated readings, at least {} are needed",
                pollutant,
                history.len(),
                ROLLING_WINDOW
            ),
        ));
    }

    // Stable sort keeps file order for readings sharing a date
    history.sort_by_key(|(date, _)| *date);
    let recent: Vec<f64> = history
        .iter()
        .rev()
        .take(ROLLING_WINDOW)
        .map(|(_, v)| *v)
        .collect();
    let rolling_mean = recent.iter().sum::<f64>() / recent.len() as f64;

    let (last_date, _) = history[history.len() - 1];
    let next = last_date + Duration::days(1);

    Ok(PredictionInput::new()
        .with("year", next.year() as f64)
        .with("month", next.month() as f64)
        .with("day", next.day() as f64)
        .with("lag_1", recent[0])
        .with("lag_2", recent[1])
        .with("rolling_mean_3", rolling_mean))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn pollutant_input() -> PredictionInput {
        PredictionInput::new()
            .with("CO", 0.5)
            .with("NO2", 20.0)
            .with("O3", 30.0)
            .with("PM10", 45.0)
            .with("PM2.5", 25.0)
            .with("SO2", 5.0)
    }

    #[test]
    fn test_pollutant_row_uses_trained_column_names() {
        let schema = FeatureSchema::pollutants();
        let row = schema
            .build_row(&pollutant_input(), &FeatureMapping::default())
            .unwrap();

        assert_eq!(row.columns, vec!["CO", "NO2", "O3", "PM 10", "PM 2.5", "SO2"]);
        assert_eq!(row.values, vec![0.5, 20.0, 30.0, 45.0, 25.0, 5.0]);
    }

    #[test]
    fn test_mapping_override() {
        let mapping = FeatureMapping::default().with("PM10", "pm10");
        assert_eq!(mapping.column_for("PM10"), "pm10");
        assert_eq!(mapping.column_for("PM2.5"), "PM 2.5");
        assert_eq!(mapping.column_for("CO"), "CO");
    }

    #[test]
    fn test_missing_field_rejected() {
        let schema = FeatureSchema::pollutants();
        let mut input = pollutant_input();
        input.values.remove("SO2");

        match schema.build_row(&input, &FeatureMapping::default()) {
            Err(PredictionError::InvalidInput { field, .. }) => assert_eq!(field, "SO2"),
            other => panic!("expected invalid input, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_field_rejected() {
        let schema = FeatureSchema::pollutants();
        let input = pollutant_input().with("PM 10", 3.0);
        match schema.build_row(&input, &FeatureMapping::default()) {
            Err(PredictionError::InvalidInput { field, .. }) => assert_eq!(field, "PM 10"),
            other => panic!("expected invalid input, got {:?}", other),
        }
    }

    #[test]
    fn test_negative_concentration_rejected() {
        let schema = FeatureSchema::pollutants();
        let input = pollutant_input().with("O3", -0.1);
        assert!(schema.build_row(&input, &FeatureMapping::default()).is_err());
    }

    #[test]
    fn test_lagged_ranges() {
        let schema = FeatureSchema::lagged();
        let base = PredictionInput::new()
            .with("year", 2024.0)
            .with("month", 6.0)
            .with("day", 15.0)
            .with("lag_1", 10.0)
            .with("lag_2", -1.0)
            .with("rolling_mean_3", 9.5);
        let mapping = FeatureMapping::default();

        assert!(schema.build_row(&base, &mapping).is_ok());
        assert!(schema.build_row(&base.clone().with("month", 13.0), &mapping).is_err());
        assert!(schema.build_row(&base.clone().with("day", 0.0), &mapping).is_err());
        assert!(schema.build_row(&base.clone().with("year", 1999.0), &mapping).is_err());
        assert!(schema.build_row(&base.clone().with("year", 2024.5), &mapping).is_err());
        assert!(schema.build_row(&base.with("lag_1", f64::NAN), &mapping).is_err());
    }

    #[test]
    fn test_builtin_schemas() {
        let schemas = FeatureSchema::builtin();
        assert_eq!(schemas.len(), 2);
        assert!(!schemas[0].checks_dataset_columns);
        assert!(schemas[1].checks_dataset_columns);
        assert_eq!(
            schemas[1].field_names().collect::<Vec<_>>(),
            vec!["year", "month", "day", "lag_1", "lag_2", "rolling_mean_3"]
        );
    }

    fn reading(day: u32, value: f64) -> PollutantReading {
        PollutantReading {
            pollutant: "PM2.5".to_string(),
            concentration: value,
            date: NaiveDate::from_ymd_opt(2024, 12, day),
        }
    }

    #[test]
    fn test_suggest_lag_inputs() {
        let readings = vec![
            reading(31, 40.0),
            reading(28, 10.0),
            reading(29, 20.0),
            reading(30, 30.0),
            PollutantReading {
                pollutant: "NO2".to_string(),
                concentration: 999.0,
                date: NaiveDate::from_ymd_opt(2025, 1, 5),
            },
        ];

        let input = suggest_lag_inputs(&readings, "PM2.5").unwrap();
        assert_eq!(input.get("year"), Some(2025.0));
        assert_eq!(input.get("month"), Some(1.0));
        assert_eq!(input.get("day"), Some(1.0));
        assert_eq!(input.get("lag_1"), Some(40.0));
        assert_eq!(input.get("lag_2"), Some(30.0));
        assert_eq!(input.get("rolling_mean_3"), Some(30.0));
    }

    #[test]
    fn test_suggest_requires_history() {
        let readings = vec![reading(1, 1.0), reading(2, 2.0)];
        assert!(suggest_lag_inputs(&readings, "PM2.5").is_err());
        assert!(suggest_lag_inputs(&readings, "CO").is_err());
    }
}
