//! Dataset upload and visualization commands

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use tabled::Tabled;

use crate::client::{ApiClient, PollutantSummary, UploadResponse, VisualizeResponse};
use crate::output::{
    format_bytes, print_grid, print_info, print_json, print_success, print_table, print_warning,
    OutputFormat,
};

/// Charts the dashboard can render as SVG
const CHARTS: [&str; 2] = ["timeseries", "distribution"];

/// Row for the pollutant summary table
#[derive(Tabled, serde::Serialize)]
struct SummaryRow {
    #[tabled(rename = "Pollutant")]
    pollutant: String,
    #[tabled(rename = "Readings")]
    count: usize,
    #[tabled(rename = "Min")]
    min: String,
    #[tabled(rename = "Mean")]
    mean: String,
    #[tabled(rename = "Max")]
    max: String,
    #[tabled(rename = "From")]
    from: String,
    #[tabled(rename = "To")]
    to: String,
}

impl From<&PollutantSummary> for SummaryRow {
    fn from(s: &PollutantSummary) -> Self {
        let date = |d: Option<chrono::NaiveDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string());
        Self {
            pollutant: s.pollutant.clone(),
            count: s.count,
            min: format!("{:.2}", s.min),
            mean: format!("{:.2}", s.mean),
            max: format!("{:.2}", s.max),
            from: date(s.first_date),
            to: date(s.last_date),
        }
    }
}

/// Upload a CSV file as the current dataset
pub async fn upload(client: &ApiClient, file: &Path, format: OutputFormat) -> Result<()> {
    let bytes = std::fs::read(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let result: UploadResponse = client.post_csv("api/v1/dataset", bytes).await?;

    match format {
        OutputFormat::Json => print_json(&result),
        OutputFormat::Table => {
            print_success(&result.message);
            print_info(&format!(
                "{} rows, {}, sha256 {}",
                result.rows,
                format_bytes(result.size_bytes),
                &result.checksum[..result.checksum.len().min(12)]
            ));
            println!();
            println!("{}", "Dataset Preview".bold());
            print_grid(&result.preview.columns, &result.preview.rows);
        }
    }

    Ok(())
}

/// Show pollutant summaries and optionally save the rendered charts
pub async fn visualize(
    client: &ApiClient,
    svg_dir: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let result: VisualizeResponse = client.get("api/v1/visualize").await?;

    let (preview, summaries) = match result {
        VisualizeResponse::Advisory { message } => {
            match format {
                OutputFormat::Json => print_json(&serde_json::json!({ "message": message })),
                OutputFormat::Table => print_warning(&message),
            }
            return Ok(());
        }
        VisualizeResponse::Ready { preview, summaries } => (preview, summaries),
    };

    let rows: Vec<SummaryRow> = summaries.iter().map(SummaryRow::from).collect();
    if format == OutputFormat::Table {
        println!("{}", "Dataset Preview".bold());
        print_grid(&preview.columns, &preview.rows);
        println!();
        println!("{}", "Pollutant Summary".bold());
    }
    print_table(&rows, format);

    if let Some(dir) = svg_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        for chart in CHARTS {
            let svg = client
                .get_text(&format!("api/v1/visualize/{}.svg", chart))
                .await?;
            let path = dir.join(format!("{}.svg", chart));
            std::fs::write(&path, svg)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if format == OutputFormat::Table {
                print_success(&format!("Saved {}", path.display()));
            }
        }
    }

    Ok(())
}
