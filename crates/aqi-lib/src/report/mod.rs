//! Pollutant visualization reports
//!
//! Builds a time-series chart and a distribution chart with one series per
//! pollutant from the uploaded dataset. Charts are plain data; `render`
//! turns them into SVG.

mod density;
mod render;

pub use density::{gaussian_kde, scott_bandwidth, CUT, GRID_SIZE};
pub use render::{render_svg, DEFAULT_HEIGHT, DEFAULT_WIDTH};

use crate::dataset::{DatasetStore, PREVIEW_ROWS};
use crate::error::{DatasetError, ReportError, MISSING_DATASET_ADVISORY};
use crate::models::{DatasetPreview, PollutantReading};
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use tracing::{debug, warn};

/// Meaning of a chart's x values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisKind {
    /// Unix timestamp in seconds at midnight UTC
    Date,
    /// Position of the reading within its pollutant group
    Index,
    /// Concentration value
    Value,
}

/// One named series of (x, y) points
#[derive(Debug, Clone, Serialize)]
pub struct Series {
    pub name: String,
    pub points: Vec<(f64, f64)>,
}

/// Chart data ready for rendering
#[derive(Debug, Clone, Serialize)]
pub struct Chart {
    pub id: &'static str,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub x_axis: AxisKind,
    pub series: Vec<Series>,
}

impl Chart {
    /// Bounds over every point of every series, if any
    pub fn bounds(&self) -> Option<((f64, f64), (f64, f64))> {
        let mut points = self.series.iter().flat_map(|s| s.points.iter());
        let first = points.next()?;
        let init = ((first.0, first.0), (first.1, first.1));
        Some(points.fold(init, |((x0, x1), (y0, y1)), (x, y)| {
            ((x0.min(*x), x1.max(*x)), (y0.min(*y), y1.max(*y)))
        }))
    }
}

/// Per-pollutant statistics shown next to the charts
#[derive(Debug, Clone, Serialize)]
pub struct PollutantSummary {
    pub pollutant: String,
    pub count: usize,
    pub min: f64,
    pub mean: f64,
    pub max: f64,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

/// Everything the visualize workflow shows
#[derive(Debug, Clone, Serialize)]
pub struct ChartReport {
    pub preview: DatasetPreview,
    pub summaries: Vec<PollutantSummary>,
    pub time_series: Chart,
    pub distribution: Chart,
}

/// Result of the visualize workflow
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Visualization {
    Ready(Box<ChartReport>),
    /// Nothing to show; the message tells the user what to do
    Advisory { message: String },
}

/// Builds visualization reports from the dataset slot
#[derive(Debug, Clone)]
pub struct Reporter {
    store: DatasetStore,
}

impl Reporter {
    pub fn new(store: DatasetStore) -> Self {
        Self { store }
    }

    /// Build the charts, or an advisory when no dataset was uploaded
    pub fn visualize(&self) -> Result<Visualization, ReportError> {
        let dataset = match self.store.load() {
            Ok(ds) => ds,
            Err(DatasetError::NotFound) => {
                return Ok(Visualization::Advisory {
                    message: MISSING_DATASET_ADVISORY.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let readings = dataset.readings()?;
        let groups = group_by_pollutant(&readings);
        debug!(
            pollutants = groups.len(),
            readings = readings.len(),
            "Building visualization"
        );

        Ok(Visualization::Ready(Box::new(ChartReport {
            preview: dataset.preview(PREVIEW_ROWS),
            summaries: groups.iter().map(|(name, rs)| summarize(name, rs)).collect(),
            time_series: time_series_chart(&groups),
            distribution: distribution_chart(&groups),
        })))
    }
}

/// Group readings by pollutant, in order of first appearance
pub fn group_by_pollutant(readings: &[PollutantReading]) -> Vec<(String, Vec<&PollutantReading>)> {
    let mut groups: Vec<(String, Vec<&PollutantReading>)> = Vec::new();
    for reading in readings {
        match groups.iter_mut().find(|(name, _)| *name == reading.pollutant) {
            Some((_, members)) => members.push(reading),
            None => groups.push((reading.pollutant.clone(), vec![reading])),
        }
    }
    groups
}

fn date_to_x(date: NaiveDate) -> f64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp() as f64
}

/// Concentration over time, one line per pollutant.
///
/// Uses dates on the x axis only when every reading has one; otherwise
/// falls back to the reading's position within its group.
pub fn time_series_chart(groups: &[(String, Vec<&PollutantReading>)]) -> Chart {
    let all_dated = groups
        .iter()
        .flat_map(|(_, rs)| rs.iter())
        .all(|r| r.date.is_some());

    let series = groups
        .iter()
        .map(|(name, rs)| {
            let mut points: Vec<(f64, f64)> = if all_dated {
                rs.iter()
                    .filter_map(|r| r.date.map(|d| (date_to_x(d), r.concentration)))
                    .collect()
            } else {
                rs.iter()
                    .enumerate()
                    .map(|(i, r)| (i as f64, r.concentration))
                    .collect()
            };
            points.sort_by(|a, b| a.0.total_cmp(&b.0));
            Series {
                name: name.clone(),
                points,
            }
        })
        .collect();

    Chart {
        id: "timeseries",
        title: "Pollutant Concentrations Over Time".to_string(),
        x_label: if all_dated { "Date" } else { "Observation" }.to_string(),
        y_label: "Concentration".to_string(),
        x_axis: if all_dated { AxisKind::Date } else { AxisKind::Index },
        series,
    }
}

/// Kernel density of concentrations, one curve per pollutant.
///
/// Groups with fewer than two readings or no spread are left out.
pub fn distribution_chart(groups: &[(String, Vec<&PollutantReading>)]) -> Chart {
    let series = groups
        .iter()
        .filter_map(|(name, rs)| {
            let values: Vec<f64> = rs.iter().map(|r| r.concentration).collect();
            match gaussian_kde(&values, GRID_SIZE) {
                Some(points) => Some(Series {
                    name: name.clone(),
                    points,
                }),
                None => {
                    warn!(pollutant = %name, samples = values.len(), "Not enough variance for a density estimate");
                    None
                }
            }
        })
        .collect();

    Chart {
        id: "distribution",
        title: "Distribution of Pollutant Concentrations".to_string(),
        x_label: "Concentration".to_string(),
        y_label: "Density".to_string(),
        x_axis: AxisKind::Value,
        series,
    }
}

fn summarize(name: &str, readings: &[&PollutantReading]) -> PollutantSummary {
    let values: Vec<f64> = readings.iter().map(|r| r.concentration).collect();
    let count = values.len();
    PollutantSummary {
        pollutant: name.to_string(),
        count,
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        mean: values.iter().sum::<f64>() / count.max(1) as f64,
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        first_date: readings.iter().filter_map(|r| r.date).min(),
        last_date: readings.iter().filter_map(|r| r.date).max(),
    }
}
