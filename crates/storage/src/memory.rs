//! In-memory prediction log with bounded retention

use crate::entry::{next_timestamp, LogEntry};
use crate::StorageError;
use chrono::{DateTime, Utc};
use feature_engine::FeatureVector;
use inference_engine::{PredictionResult, PredictionSink};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::{debug, info};

/// Default number of entries kept before the oldest are dropped
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

struct MemoryState {
    entries: VecDeque<LogEntry>,
    last_timestamp: Option<DateTime<Utc>>,
}

/// Prediction log kept in memory (tests and embedding)
pub struct MemoryLog {
    state: Mutex<MemoryState>,
    max_entries: usize,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_MAX_ENTRIES)
    }

    /// Keep at most `max_entries` records (minimum one)
    pub fn with_retention(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        info!("Creating in-memory prediction log (retention {})", max_entries);
        Self {
            state: Mutex::new(MemoryState {
                entries: VecDeque::with_capacity(max_entries.min(1024)),
                last_timestamp: None,
            }),
            max_entries,
        }
    }

    /// Append a record, evicting the oldest once retention is reached
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
        while state.entries.len() >= self.max_entries {
            state.entries.pop_front();
        }
        state.entries.push_back(LogEntry::new(timestamp, input, output));
        state.last_timestamp = Some(timestamp);

        debug!("Stored prediction, {} entries retained", state.entries.len());
        Ok(timestamp)
    }

    /// Most recent entries, newest first
    pub fn recent(&self, limit: usize) -> Result<Vec<LogEntry>, StorageError> {
        let state = self
            .state
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;
        Ok(state.entries.iter().rev().take(limit).cloned().collect())
    }

    /// Entries stamped at or after `since`, oldest first
    pub fn since(&self, since: DateTime<Utc>) -> Result<Vec<LogEntry>, StorageError> {
        let state = self
            .state
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;
        Ok(state
            .entries
            .iter()
            .filter(|e| e.timestamp >= since)
            .cloned()
            .collect())
    }

    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.entries.clear();
        }
    }
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictionSink for MemoryLog {
    fn record(
        &self,
        input: &FeatureVector,
        output: &PredictionResult,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.append(input, output)?;
        Ok(())
    }
}
