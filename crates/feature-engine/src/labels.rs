//! Remaining Useful Life Labeling

use crate::error::FeatureError;
use crate::table::{write_atomically, NumericTable, SensorReading, SensorTable};
use crate::{LABEL_COLUMN, MAX_CYCLE_COLUMN, RUL_COLUMN};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

/// Cycles-to-end at or below which a reading is labeled as failing soon
pub const DEFAULT_RUL_THRESHOLD: u32 = 30;

/// A reading augmented with its engine's last cycle, RUL and label
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledRow {
    pub reading: SensorReading,
    pub max_cycle: i64,
    pub rul: i64,
    pub fail_soon: u8,
}

/// Output of the label deriver
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabeledTable {
    sensor_count: usize,
    threshold: u32,
    rows: Vec<LabeledRow>,
}

/// Counts reported after a labeling run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelSummary {
    pub rows: usize,
    pub engines: usize,
    pub failing_rows: usize,
}

/// Label every reading with RUL = max_cycle - cycle and fail_soon = RUL <= threshold.
///
/// Engines are grouped by `engine_id` only; rows keep their input order.
pub fn derive_labels(table: &SensorTable, threshold: u32) -> LabeledTable {
    let mut max_cycles: HashMap<i64, i64> = HashMap::new();
    for reading in table.readings() {
        max_cycles
            .entry(reading.engine_id)
            .and_modify(|max| *max = (*max).max(reading.cycle))
            .or_insert(reading.cycle);
    }

    let rows = table
        .readings()
        .iter()
        .map(|reading| {
            let max_cycle = max_cycles
                .get(&reading.engine_id)
                .copied()
                .unwrap_or(reading.cycle);
            let rul = max_cycle - reading.cycle;
            LabeledRow {
                reading: reading.clone(),
                max_cycle,
                rul,
                fail_soon: u8::from(rul <= i64::from(threshold)),
            }
        })
        .collect();

    debug!(
        "Labeled {} readings across {} engines (threshold={})",
        table.len(),
        max_cycles.len(),
        threshold
    );

    LabeledTable {
        sensor_count: table.sensor_count(),
        threshold,
        rows,
    }
}

impl LabeledTable {
    pub fn rows(&self) -> &[LabeledRow] {
        &self.rows
    }

    pub fn sensor_count(&self) -> usize {
        self.sensor_count
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header of the persisted table
    pub fn column_names(&self) -> Vec<String> {
        let mut names = SensorTable::column_names(self.sensor_count);
        names.push(MAX_CYCLE_COLUMN.to_string());
        names.push(RUL_COLUMN.to_string());
        names.push(LABEL_COLUMN.to_string());
        names
    }

    pub fn summary(&self) -> LabelSummary {
        let engines: HashSet<i64> = self.rows.iter().map(|r| r.reading.engine_id).collect();
        LabelSummary {
            rows: self.rows.len(),
            engines: engines.len(),
            failing_rows: self.rows.iter().filter(|r| r.fail_soon == 1).count(),
        }
    }

    /// Render as CSV bytes
    pub fn to_csv(&self) -> Result<Vec<u8>, FeatureError> {
        let mut buffer = Vec::new();
        let mut wtr = csv::Writer::from_writer(&mut buffer);
        wtr.write_record(self.column_names())?;

        for row in &self.rows {
            let mut record = Vec::with_capacity(self.sensor_count + 5);
            record.push(row.reading.engine_id.to_string());
            record.push(row.reading.cycle.to_string());
            record.extend(row.reading.sensors.iter().map(f64::to_string));
            record.push(row.max_cycle.to_string());
            record.push(row.rul.to_string());
            record.push(row.fail_soon.to_string());
            wtr.write_record(&record)?;
        }

        wtr.flush()
            .map_err(|e| FeatureError::io("<csv buffer>", e))?;
        drop(wtr);
        Ok(buffer)
    }

    /// Persist as CSV, creating intermediate directories; nothing is written on failure
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<(), FeatureError> {
        let bytes = self.to_csv()?;
        write_atomically(path.as_ref(), &bytes)
    }

    /// View as an all-numeric table, as the trainer would read it back
    pub fn to_numeric(&self) -> Result<NumericTable, FeatureError> {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut values = Vec::with_capacity(self.sensor_count + 5);
                values.push(row.reading.engine_id as f64);
                values.push(row.reading.cycle as f64);
                values.extend_from_slice(&row.reading.sensors);
                values.push(row.max_cycle as f64);
                values.push(row.rul as f64);
                values.push(f64::from(row.fail_soon));
                values
            })
            .collect();
        NumericTable::new(self.column_names(), rows)
    }
}

/// Read a raw sensor CSV, label it and write the processed CSV.
pub fn create_features(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    threshold: u32,
) -> Result<LabelSummary, FeatureError> {
    let input_path = input_path.as_ref();
    let output_path = output_path.as_ref();

    info!("Reading raw sensor data from {}", input_path.display());
    let raw = SensorTable::read_csv(input_path)?;
    let labeled = derive_labels(&raw, threshold);
    labeled.write_csv(output_path)?;

    let summary = labeled.summary();
    info!(
        "Saved processed features to {} ({} rows, {} engines, {} failing soon)",
        output_path.display(),
        summary.rows,
        summary.engines,
        summary.failing_rows
    );
    Ok(summary)
}
