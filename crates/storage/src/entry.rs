//! Log record layout

use chrono::{DateTime, Duration, Utc};
use feature_engine::FeatureVector;
use inference_engine::PredictionResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One audited prediction as read back from a log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    /// The defaulted, ordered feature mapping that was scored
    pub input: Map<String, Value>,
    pub output: PredictionResult,
}

impl LogEntry {
    pub(crate) fn new(
        timestamp: DateTime<Utc>,
        input: &FeatureVector,
        output: &PredictionResult,
    ) -> Self {
        Self {
            timestamp,
            input: input
                .iter()
                .map(|(name, value)| (name.to_string(), Value::from(value)))
                .collect(),
            output: *output,
        }
    }

    /// Scored value of one feature
    pub fn feature(&self, name: &str) -> Option<f64> {
        self.input.get(name).and_then(Value::as_f64)
    }
}

/// Borrowed form written to disk; keeps the feature order of the vector
#[derive(Serialize)]
pub(crate) struct LogLine<'a> {
    pub timestamp: DateTime<Utc>,
    pub input: &'a FeatureVector,
    pub output: &'a PredictionResult,
}

/// Wall-clock time, nudged forward so it is strictly after `last`
pub(crate) fn next_timestamp(last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match last {
        Some(last) if now <= last => last + Duration::nanoseconds(1),
        _ => now,
    }
}
