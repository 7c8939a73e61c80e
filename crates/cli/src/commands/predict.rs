//! Prediction commands

use anyhow::Result;
use colored::Colorize;
use std::collections::BTreeMap;
use tabled::Tabled;

use crate::client::{ApiClient, LagSuggestion, PredictRequest, PredictResponse};
use crate::output::{color_category, print_info, print_json, print_table, OutputFormat};

/// Pollutant concentrations for an AQI prediction
pub struct PollutantInputs {
    pub co: f64,
    pub no2: f64,
    pub o3: f64,
    pub pm10: f64,
    pub pm25: f64,
    pub so2: f64,
}

impl PollutantInputs {
    fn into_values(self) -> BTreeMap<String, f64> {
        [
            ("CO", self.co),
            ("NO2", self.no2),
            ("O3", self.o3),
            ("PM10", self.pm10),
            ("PM2.5", self.pm25),
            ("SO2", self.so2),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

/// Date and lag features for a concentration prediction
pub struct LaggedInputs {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub lag_1: f64,
    pub lag_2: f64,
    pub rolling_mean_3: f64,
}

impl LaggedInputs {
    fn into_values(self) -> BTreeMap<String, f64> {
        [
            ("year", self.year as f64),
            ("month", self.month as f64),
            ("day", self.day as f64),
            ("lag_1", self.lag_1),
            ("lag_2", self.lag_2),
            ("rolling_mean_3", self.rolling_mean_3),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

async fn run(
    client: &ApiClient,
    schema: &str,
    values: BTreeMap<String, f64>,
    format: OutputFormat,
) -> Result<()> {
    let result: PredictResponse = client
        .post(
            &format!("api/v1/predict/{}", schema),
            &PredictRequest { values },
        )
        .await?;

    match format {
        OutputFormat::Json => print_json(&result),
        OutputFormat::Table => {
            println!("{}", result.message.bold());
            if let Some(category) = &result.category {
                println!("AQI Category: {}", color_category(&category.label));
                println!("{}", category.description);
            }
        }
    }

    Ok(())
}

/// Predict the AQI from pollutant concentrations
pub async fn pollutants(
    client: &ApiClient,
    inputs: PollutantInputs,
    format: OutputFormat,
) -> Result<()> {
    run(client, "pollutants", inputs.into_values(), format).await
}

/// Predict a concentration from date and lag features
pub async fn lagged(client: &ApiClient, inputs: LaggedInputs, format: OutputFormat) -> Result<()> {
    run(client, "lagged", inputs.into_values(), format).await
}

#[derive(Tabled, serde::Serialize)]
struct InputRow {
    #[tabled(rename = "Input")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Field order used when printing lag suggestions
const LAGGED_ORDER: [&str; 6] = ["year", "month", "day", "lag_1", "lag_2", "rolling_mean_3"];

/// Show lag inputs derived from the uploaded dataset
pub async fn suggest(client: &ApiClient, pollutant: &str, format: OutputFormat) -> Result<()> {
    let result: LagSuggestion = client
        .get_with_query("api/v1/predict/lagged/suggest", &[("pollutant", pollutant)])
        .await?;

    if format == OutputFormat::Json {
        print_json(&result);
        return Ok(());
    }

    let rows: Vec<InputRow> = LAGGED_ORDER
        .iter()
        .filter_map(|name| {
            result.values.get(*name).map(|v| InputRow {
                name: name.to_string(),
                value: format!("{}", v),
            })
        })
        .collect();
    print_table(&rows, format);

    let flag = |name: &str| {
        result
            .values
            .get(name)
            .map(|v| format!("{}", v))
            .unwrap_or_default()
    };
    print_info(&format!(
        "aqi predict lagged --year {} --month {} --day {} --lag-1 {} --lag-2 {} --rolling-mean-3 {}",
        flag("year"),
        flag("month"),
        flag("day"),
        flag("lag_1"),
        flag("lag_2"),
        flag("rolling_mean_3"),
    ));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pollutant_field_names() {
        let values = PollutantInputs {
            co: 0.4,
            no2: 18.0,
            o3: 22.0,
            pm10: 40.0,
            pm25: 21.0,
            so2: 3.0,
        }
        .into_values();

        assert_eq!(
            values.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["CO", "NO2", "O3", "PM10", "PM2.5", "SO2"]
        );
        assert_eq!(values["PM2.5"], 21.0);
    }

    #[test]
    fn test_lagged_field_names() {
        let values = LaggedInputs {
            year: 2024,
            month: 5,
            day: 4,
            lag_1: 60.0,
            lag_2: 20.0,
            rolling_mean_3: 30.0,
        }
        .into_values();

        assert_eq!(values.len(), 6);
        assert_eq!(values["year"], 2024.0);
        assert_eq!(values["rolling_mean_3"], 30.0);
    }
}
