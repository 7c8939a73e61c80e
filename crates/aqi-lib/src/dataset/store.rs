//! Single-slot persistence for the most recently uploaded dataset
//!
//! The slot is one file at a fixed path. Each upload overwrites it verbatim;
//! there is no versioning and no protection against concurrent writers.

use super::frame::Dataset;
use crate::error::DatasetError;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default location of the persisted dataset, relative to the working directory
pub const DEFAULT_DATASET_PATH: &str = "uploaded_data.csv";

/// Summary of a successful upload
#[derive(Debug, Clone)]
pub struct StoredDataset {
    pub dataset: Dataset,
    pub size_bytes: usize,
    pub checksum: String,
}

/// Dataset slot backed by a single CSV file
#[derive(Debug, Clone)]
pub struct DatasetStore {
    path: PathBuf,
}

impl Default for DatasetStore {
    fn default() -> Self {
        Self::new(DEFAULT_DATASET_PATH)
    }
}

impl DatasetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Validate and persist an uploaded CSV, replacing any previous upload.
    ///
    /// The bytes are parsed first so a malformed upload leaves the previous
    /// dataset in place.
    pub fn save(&self, bytes: &[u8]) -> Result<StoredDataset, DatasetError> {
        let dataset = Dataset::from_bytes(bytes)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, bytes)?;

        let checksum = compute_checksum(bytes);
        info!(
            path = %self.path.display(),
            rows = dataset.len(),
            size = bytes.len(),
            checksum = %checksum,
            "Dataset persisted"
        );

        Ok(StoredDataset {
            dataset,
            size_bytes: bytes.len(),
            checksum,
        })
    }

    /// Read back the persisted dataset
    pub fn load(&self) -> Result<Dataset, DatasetError> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No dataset uploaded yet");
                return Err(DatasetError::NotFound);
            }
            Err(e) => return Err(e.into()),
        };
        Dataset::from_bytes(&bytes)
    }
}

/// SHA-256 hex digest of a byte slice
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
