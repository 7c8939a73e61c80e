//! API client for communicating with the AQI dashboard

use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// API client for the AQI dashboard
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let mut base_url = Url::parse(base_url).context("Invalid API URL")?;
        // `join` replaces the last segment unless the path ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("Invalid path")
    }

    /// Turn a non-success response into an error carrying the server's message
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(err) => match err.details {
                Some(details) => anyhow::bail!("{} ({})", err.error, details),
                None => anyhow::bail!("{}", err.error),
            },
            Err(_) => anyhow::bail!("API error ({}): {}", status, body),
        }
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get_with_query(path, &[]).await
    }

    /// Make a GET request with query parameters
    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let response = self
            .client
            .get(self.url(path)?)
            .query(query)
            .send()
            .await
            .context("Failed to send request")?;

        Self::check(response)
            .await?
            .json()
            .await
            .context("Failed to parse response")
    }

    /// Make a GET request for a text document
    pub async fn get_text(&self, path: &str) -> Result<String> {
        let response = self
            .client
            .get(self.url(path)?)
            .send()
            .await
            .context("Failed to send request")?;

        Self::check(response)
            .await?
            .text()
            .await
            .context("Failed to read response")
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let response = self
            .client
            .post(self.url(path)?)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        Self::check(response)
            .await?
            .json()
            .await
            .context("Failed to parse response")
    }

    /// Make a POST request with a CSV body
    pub async fn post_csv<T: DeserializeOwned>(&self, path: &str, body: Vec<u8>) -> Result<T> {
        let response = self
            .client
            .post(self.url(path)?)
            .header(reqwest::header::CONTENT_TYPE, "text/csv")
            .body(body)
            .send()
            .await
            .context("Failed to send request")?;

        Self::check(response)
            .await?
            .json()
            .await
            .context("Failed to parse response")
    }
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetPreview {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub total_rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub rows: usize,
    pub size_bytes: u64,
    pub checksum: String,
    pub uploaded_at: i64,
    pub preview: DatasetPreview,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollutantSummary {
    pub pollutant: String,
    pub count: usize,
    pub min: f64,
    pub mean: f64,
    pub max: f64,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VisualizeResponse {
    Ready {
        preview: DatasetPreview,
        summaries: Vec<PollutantSummary>,
    },
    Advisory {
        message: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    pub values: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub label: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub message: String,
    pub schema: String,
    pub target: String,
    pub value: f64,
    pub display: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    pub generated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LagSuggestion {
    pub values: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    pub description: String,
    pub unit: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub integer: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub name: String,
    pub target: String,
    pub fields: Vec<FieldInfo>,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryBand {
    pub label: String,
    pub upper_bound: Option<f64>,
    pub range: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
