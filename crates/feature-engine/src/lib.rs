//! Feature Engineering Engine
//!
//! Turns raw per-cycle turbofan sensor logs into labeled training tables
//! and maps arbitrary feature dictionaries onto the canonical, fixed-order
//! feature vector consumed by the classifier.

mod config;
mod error;
mod features;
mod labels;
mod table;

pub use config::PipelineConfig;
pub use error::FeatureError;
pub use features::{FeatureSchema, FeatureVector};
pub use labels::{
    create_features, derive_labels, LabelSummary, LabeledRow, LabeledTable, DEFAULT_RUL_THRESHOLD,
};
pub use table::{NumericTable, SensorReading, SensorTable};

/// Label column produced by the deriver and required by the trainer
pub const LABEL_COLUMN: &str = "fail_soon";
/// Remaining useful life column
pub const RUL_COLUMN: &str = "RUL";
/// Last recorded cycle of the engine
pub const MAX_CYCLE_COLUMN: &str = "max_cycle";
/// Engine identifier column
pub const ENGINE_ID_COLUMN: &str = "engine_id";
/// Operating cycle column
pub const CYCLE_COLUMN: &str = "cycle";

/// Name of the `index`-th sensor column (1-based)
pub fn sensor_column(index: usize) -> String {
    format!("sensor_{index}")
}
