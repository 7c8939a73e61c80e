//! AQI Dashboard CLI
//!
//! A command-line client for uploading air-quality datasets, summarizing
//! pollutant trends and requesting AQI predictions from the dashboard.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use commands::{dataset, info, predict};
use std::path::PathBuf;

/// AQI Dashboard CLI
#[derive(Parser)]
#[command(name = "aqi")]
#[command(author, version, about = "CLI for the AQI Dashboard", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via AQI_API_URL env var)
    #[arg(long, env = "AQI_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short)]
    pub format: Option<output::OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload a CSV dataset, replacing the current one
    Upload {
        /// Path to the CSV file
        file: PathBuf,
    },

    /// Summarize pollutant trends in the uploaded dataset
    Visualize {
        /// Also save the time-series and distribution charts as SVG here
        #[arg(long)]
        svg_dir: Option<PathBuf>,
    },

    /// Request a prediction
    #[command(subcommand)]
    Predict(PredictCommands),

    /// List prediction schemas and their inputs
    Schemas,

    /// List AQI category bands
    Categories,
}

#[derive(Subcommand)]
pub enum PredictCommands {
    /// Predict the AQI from pollutant concentrations (µg/m³)
    Pollutants {
        #[arg(long)]
        co: f64,
        #[arg(long)]
        no2: f64,
        #[arg(long)]
        o3: f64,
        #[arg(long)]
        pm10: f64,
        /// PM2.5 concentration
        #[arg(long)]
        pm25: f64,
        #[arg(long)]
        so2: f64,
    },

    /// Predict a pollutant concentration from date and lag features
    Lagged {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: u32,
        #[arg(long)]
        day: u32,
        /// Previous day's concentration
        #[arg(long)]
        lag_1: f64,
        /// Concentration two days before
        #[arg(long)]
        lag_2: f64,
        /// Mean of the last three concentrations
        #[arg(long)]
        rolling_mean_3: f64,
    },

    /// Derive lagged inputs for a pollutant from the uploaded dataset
    Suggest {
        /// Pollutant name as it appears in the dataset
        #[arg(long)]
        pollutant: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let file_config = config::Config::load()?;

    let api_url = cli
        .api_url
        .or(file_config.api_url)
        .unwrap_or_else(|| config::DEFAULT_API_URL.to_string());
    let format = cli
        .format
        .or_else(|| {
            file_config
                .default_format
                .and_then(|f| output::OutputFormat::from_str(&f, true).ok())
        })
        .unwrap_or_default();

    // Initialize client
    let client = client::ApiClient::new(&api_url)?;

    // Execute command
    match cli.command {
        Commands::Upload { file } => {
            dataset::upload(&client, &file, format).await?;
        }
        Commands::Visualize { svg_dir } => {
            dataset::visualize(&client, svg_dir.as_deref(), format).await?;
        }
        Commands::Predict(predict_cmd) => match predict_cmd {
            PredictCommands::Pollutants {
                co,
                no2,
                o3,
                pm10,
                pm25,
                so2,
            } => {
                let inputs = predict::PollutantInputs {
                    co,
                    no2,
                    o3,
                    pm10,
                    pm25,
                    so2,
                };
                predict::pollutants(&client, inputs, format).await?;
            }
            PredictCommands::Lagged {
                year,
                month,
                day,
                lag_1,
                lag_2,
                rolling_mean_3,
            } => {
                let inputs = predict::LaggedInputs {
                    year,
                    month,
                    day,
                    lag_1,
                    lag_2,
                    rolling_mean_3,
                };
                predict::lagged(&client, inputs, format).await?;
            }
            PredictCommands::Suggest { pollutant } => {
                predict::suggest(&client, &pollutant, format).await?;
            }
        },
        Commands::Schemas => {
            info::schemas(&client, format).await?;
        }
        Commands::Categories => {
            info::categories(&client, format).await?;
        }
    }

    Ok(())
}
