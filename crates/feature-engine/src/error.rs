//! Feature Engineering Error Types

use std::path::PathBuf;
use thiserror::Error;

/// Errors while reading, labeling or writing sensor tables
#[derive(Debug, Error)]
pub enum FeatureError {
    /// Input does not have the expected shape or contains unparsable cells
    #[error("Invalid data format: {0}")]
    DataFormat(String),

    /// Filesystem failure on a specific path
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV reader or writer failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl FeatureError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
