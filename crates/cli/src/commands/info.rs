//! Informational listings: feature schemas and AQI categories

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, CategoryBand, SchemaInfo};
use crate::output::{color_category, format_bound, print_json, print_table, OutputFormat};

#[derive(Tabled, serde::Serialize)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Model Column")]
    column: String,
    #[tabled(rename = "Unit")]
    unit: String,
    #[tabled(rename = "Min")]
    min: String,
    #[tabled(rename = "Max")]
    max: String,
    #[tabled(rename = "Description")]
    description: String,
}

#[derive(Tabled, serde::Serialize)]
struct CategoryRow {
    #[tabled(rename = "Category")]
    label: String,
    #[tabled(rename = "AQI")]
    range: String,
    #[tabled(rename = "Description")]
    description: String,
}

/// List the prediction schemas and their inputs
pub async fn schemas(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let result: Vec<SchemaInfo> = client.get("api/v1/schemas").await?;

    if format == OutputFormat::Json {
        print_json(&result);
        return Ok(());
    }

    for schema in &result {
        println!(
            "{} {}",
            schema.name.bold(),
            format!("(predicts {})", schema.target).dimmed()
        );
        let rows: Vec<FieldRow> = schema
            .fields
            .iter()
            .zip(&schema.columns)
            .map(|(field, column)| FieldRow {
                field: field.name.clone(),
                column: format!("{:?}", column),
                unit: field.unit.clone().unwrap_or_else(|| "-".to_string()),
                min: format_bound(field.min),
                max: format_bound(field.max),
                description: field.description.clone(),
            })
            .collect();
        print_table(&rows, format);
        println!();
    }

    Ok(())
}

/// List the Malaysia AQI category bands
pub async fn categories(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let result: Vec<CategoryBand> = client.get("api/v1/categories").await?;

    if format == OutputFormat::Json {
        print_json(&result);
        return Ok(());
    }

    let rows: Vec<CategoryRow> = result
        .iter()
        .map(|band| CategoryRow {
            label: color_category(&band.label),
            range: band.range.clone(),
            description: band.description.clone(),
        })
        .collect();
    print_table(&rows, format);

    Ok(())
}
