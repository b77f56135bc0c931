//! Error types surfaced by the root crate

use jobfilter_core_types::FilterError;
use thiserror::Error;

pub type FilterResult<T> = Result<T, FilterError>;

/// Persisted settings could not be read or written.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings io: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings document: {0}")]
    Format(#[from] serde_json::Error),
}

impl From<SettingsError> for FilterError {
    fn from(err: SettingsError) -> Self {
        FilterError::StorageUnavailable(err.to_string())
    }
}
