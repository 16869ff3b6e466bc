//! Sensor Table I/O

use crate::error::FeatureError;
use crate::{sensor_column, CYCLE_COLUMN, ENGINE_ID_COLUMN};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// One recorded operating cycle of one engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub engine_id: i64,
    pub cycle: i64,
    pub sensors: Vec<f64>,
}

/// Raw per-cycle sensor log, columns renamed positionally
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorTable {
    sensor_count: usize,
    readings: Vec<SensorReading>,
}

impl SensorTable {
    /// Build a table from readings that all carry `sensor_count` sensors
    pub fn new(sensor_count: usize, readings: Vec<SensorReading>) -> Result<Self, FeatureError> {
        if let Some(bad) = readings.iter().find(|r| r.sensors.len() != sensor_count) {
            return Err(FeatureError::DataFormat(format!(
                "engine {} cycle {} has {} sensors, expected {}",
                bad.engine_id,
                bad.cycle,
                bad.sensors.len(),
                sensor_count
            )));
        }
        Ok(Self {
            sensor_count,
            readings,
        })
    }

    /// Read a raw CSV file; the header row is consumed but its names are ignored
    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self, FeatureError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| FeatureError::io(path, e))?;
        let table = Self::parse_csv(file)?;
        debug!(
            "Read {} readings with {} sensors from {}",
            table.len(),
            table.sensor_count,
            path.display()
        );
        Ok(table)
    }

    /// Parse raw CSV from any reader
    pub fn parse_csv<R: Read>(reader: R) -> Result<Self, FeatureError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        // Column count decides everything else, so check it before naming columns
        let width = rdr.headers()?.len();
        if width < 2 {
            return Err(FeatureError::DataFormat(format!(
                "expected at least 2 columns ({ENGINE_ID_COLUMN}, {CYCLE_COLUMN}), found {width}"
            )));
        }
        let sensor_count = width - 2;
        let columns = Self::column_names(sensor_count);

        let mut readings = Vec::new();
        for result in rdr.records() {
            let record = result?;
            let line = record.position().map_or(0, |p| p.line());
            let cell = |idx: usize| record.get(idx).unwrap_or_default();

            let engine_id = parse_integer(cell(0), &columns[0], line)?;
            let cycle = parse_integer(cell(1), &columns[1], line)?;
            let sensors = (2..width)
                .map(|idx| parse_float(cell(idx), &columns[idx], line))
                .collect::<Result<Vec<_>, _>>()?;

            readings.push(SensorReading {
                engine_id,
                cycle,
                sensors,
            });
        }

        Ok(Self {
            sensor_count,
            readings,
        })
    }

    /// Canonical column names for a table with `sensor_count` sensors
    pub fn column_names(sensor_count: usize) -> Vec<String> {
        let mut names = Vec::with_capacity(sensor_count + 2);
        names.push(ENGINE_ID_COLUMN.to_string());
        names.push(CYCLE_COLUMN.to_string());
        names.extend((1..=sensor_count).map(sensor_column));
        names
    }

    pub fn sensor_count(&self) -> usize {
        self.sensor_count
    }

    pub fn readings(&self) -> &[SensorReading] {
        &self.readings
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

/// All-numeric table with named columns, e.g. the processed training data
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumericTable {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl NumericTable {
    /// Build a table, checking every row has one value per column
    pub fn new(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self, FeatureError> {
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(FeatureError::DataFormat(format!(
                "row {} has {} values, expected {}",
                idx,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self, FeatureError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| FeatureError::io(path, e))?;
        Self::parse_csv(file)
    }

    /// Parse a headed CSV whose cells are all numeric
    pub fn parse_csv<R: Read>(reader: R) -> Result<Self, FeatureError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result?;
            let line = record.position().map_or(0, |p| p.line());
            let row = record
                .iter()
                .zip(&columns)
                .map(|(cell, column)| parse_float(cell, column, line))
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Write `bytes` to `path` via a temporary sibling, creating parent directories
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), FeatureError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| FeatureError::io(parent, e))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = Path::new(&tmp);

    if let Err(e) = fs::write(tmp, bytes) {
        let _ = fs::remove_file(tmp);
        return Err(FeatureError::io(tmp, e));
    }
    fs::rename(tmp, path).map_err(|e| FeatureError::io(path, e))
}

fn parse_integer(cell: &str, column: &str, line: u64) -> Result<i64, FeatureError> {
    if let Ok(value) = cell.parse::<i64>() {
        return Ok(value);
    }
    match cell.parse::<f64>() {
        Ok(value) if value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e15 => {
            Ok(value as i64)
        }
        _ => Err(FeatureError::DataFormat(format!(
            "line {line}: column '{column}' expects an integer, found '{cell}'"
        ))),
    }
}

fn parse_float(cell: &str, column: &str, line: u64) -> Result<f64, FeatureError> {
    match cell.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(FeatureError::DataFormat(format!(
            "line {line}: column '{column}' expects a number, found '{cell}'"
        ))),
    }
}
