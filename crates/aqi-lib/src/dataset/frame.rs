//! In-memory view of an uploaded CSV dataset

use crate::error::{DatasetError, ReportError};
use crate::models::{DatasetPreview, PollutantReading};
use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use std::io::Read;
use tracing::debug;

/// Column holding the pollutant name
pub const POLLUTANT_COLUMN: &str = "pollutant";

/// Column holding the measured concentration
pub const CONCENTRATION_COLUMN: &str = "concentration";

/// Optional column holding the observation date
pub const DATE_COLUMN: &str = "date";

/// Number of rows shown in a preview
pub const PREVIEW_ROWS: usize = 5;

/// Parsed tabular dataset
#[derive(Debug, Clone)]
pub struct Dataset {
    columns: Vec<String>,
    records: Vec<StringRecord>,
}

impl Dataset {
    /// Parse a dataset from CSV text. The first line is the header.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DatasetError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);

        let columns: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        if columns.is_empty() || columns.iter().all(|c| c.is_empty()) {
            return Err(DatasetError::Empty);
        }

        let records = reader.records().collect::<Result<Vec<_>, _>>()?;
        Ok(Self { columns, records })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DatasetError> {
        Self::from_reader(bytes)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Return the first name in `required` that is not a column
    pub fn first_missing<'a>(&self, required: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
        required.into_iter().find(|name| !self.has_column(name))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn preview(&self, rows: usize) -> DatasetPreview {
        DatasetPreview {
            columns: self.columns.clone(),
            rows: self
                .records
                .iter()
                .take(rows)
                .map(|r| r.iter().map(String::from).collect())
                .collect(),
            total_rows: self.records.len(),
        }
    }

    /// Extract pollutant readings in file order.
    ///
    /// Rows whose concentration does not parse are skipped. The date is
    /// `None` when the column is absent or the value is not a recognised date.
    pub fn readings(&self) -> Result<Vec<PollutantReading>, ReportError> {
        let pollutant_idx = self
            .column_index(POLLUTANT_COLUMN)
            .ok_or_else(|| ReportError::MissingColumn(POLLUTANT_COLUMN.to_string()))?;
        let concentration_idx = self
            .column_index(CONCENTRATION_COLUMN)
            .ok_or_else(|| ReportError::MissingColumn(CONCENTRATION_COLUMN.to_string()))?;
        let date_idx = self.column_index(DATE_COLUMN);

        let mut readings = Vec::with_capacity(self.records.len());
        let mut skipped = 0usize;

        for record in &self.records {
            let concentration = match record
                .get(concentration_idx)
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite())
            {
                Some(v) => v,
                None => {
                    skipped += 1;
                    continue;
                }
            };

            readings.push(PollutantReading {
                pollutant: record.get(pollutant_idx).unwrap_or_default().to_string(),
                concentration,
                date: date_idx.and_then(|i| record.get(i)).and_then(parse_date),
            });
        }

        if skipped > 0 {
            debug!(skipped, "Skipped rows with non-numeric concentration");
        }

        Ok(readings)
    }
}

/// Parse the date formats commonly found in air-quality exports
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y"];
    const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.date_naive())
        })
}
