//! Storage Layer
//!
//! Append-only audit trail of scored requests. [`PredictionLog`] writes
//! one JSON line per prediction to disk; [`MemoryLog`] keeps a bounded
//! window in memory. Both plug into the inference engine as a
//! [`inference_engine::PredictionSink`].

mod entry;
mod file;
mod memory;

pub use entry::LogEntry;
pub use file::{read_entries, PredictionLog};
pub use memory::{MemoryLog, DEFAULT_MAX_ENTRIES};

use std::path::PathBuf;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Lock error: {0}")]
    Lock(String),
}
