//! Uploaded dataset handling

mod frame;
mod store;

pub use frame::{
    parse_date, Dataset, CONCENTRATION_COLUMN, DATE_COLUMN, POLLUTANT_COLUMN, PREVIEW_ROWS,
};
pub use store::{compute_checksum, DatasetStore, StoredDataset, DEFAULT_DATASET_PATH};
