//! JSON-lines prediction log on disk

use crate::entry::{next_timestamp, LogEntry, LogLine};
use crate::StorageError;
use chrono::{DateTime, Utc};
use feature_engine::FeatureVector;
use inference_engine::{PredictionResult, PredictionSink};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

struct LogState {
    file: File,
    last_timestamp: Option<DateTime<Utc>>,
}

/// Append-only prediction log.
///
/// Writers are serialized by an internal mutex and every record is a
/// single `write_all` of one complete line, so lines from concurrent
/// requests never interleave.
pub struct PredictionLog {
    path: PathBuf,
    state: Mutex<LogState>,
}

impl PredictionLog {
    /// Open `path` for appending, creating it and its parent directory
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })?;

        info!("Prediction log opened at {}", path.display());
        Ok(Self {
            path,
            state: Mutex::new(LogState {
                file,
                last_timestamp: None,
            }),
        })
    }

    /// Append one record and return the timestamp it was stamped with
    pub fn append(
        &self,
        input: &FeatureVector,
        output: &PredictionResult,
    ) -> Result<DateTime<Utc>, StorageError> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;

        let timestamp = next_timestamp(state.last_timestamp, Utc::now());
        let mut line = serde_json::to_vec(&LogLine {
            timestamp,
            input,
            output,
        })?;
        line.push(b'\n');

        state
            .file
            .write_all(&line)
            .map_err(|source| StorageError::Io {
                path: self.path.clone(),
                source,
            })?;
        state.last_timestamp = Some(timestamp);

        debug!("Logged prediction at {}", timestamp.to_rfc3339());
        Ok(timestamp)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PredictionSink for PredictionLog {
    fn record(
        &self,
        input: &FeatureVector,
        output: &PredictionResult,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.append(input, output)?;
        Ok(())
    }
}

/// Parse every record of a log file, oldest first. Blank lines are
/// skipped; a malformed line is an error.
pub fn read_entries(path: impl AsRef<Path>) -> Result<Vec<LogEntry>, StorageError> {
    let path = path.as_ref();
    let io_error = |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    };

    let reader = BufReader::new(File::open(path).map_err(io_error)?);
    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(io_error)?;
        if line.trim().is_empty() {
            continue;
        }
        entries.push(serde_json::from_str(&line)?);
    }
    Ok(entries)
}
