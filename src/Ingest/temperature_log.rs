//! Thermocouple logger export: headerless `Date, Time, T1, T2, T3, T4` rows. An open
//! thermocouple reads `OL`; channels that never read anything are dropped before the merge.
use crate::Ingest::ingest_error::IngestError;
use crate::Ingest::reactor_log::MERGE_TOLERANCE_S;
use crate::Ingest::timestamps::parse_timestamp;
use crate::Sorption::run_table::RunTable;
use chrono::TimeDelta;
use log::info;
use std::path::Path;

pub const TEMPERATURE_COLUMNS: [&str; 4] = ["T1", "T2", "T3", "T4"];
/// Reading of an open thermocouple
pub const OPEN_LOOP: &str = "OL";

#[derive(Debug, Clone)]
pub struct TemperatureMerge {
    pub table: RunTable,
    /// temperature channels that carried at least one reading
    pub temperature_columns: Vec<String>,
}

fn parse_reading(text: &str) -> Result<f64, IngestError> {
    let text = text.trim();
    if text.is_empty() || text == OPEN_LOOP {
        return Ok(f64::NAN);
    }
    text.parse::<f64>()
        .map_err(|_| IngestError::InvalidSchema(format!("temperature reading '{}'", text)))
}

/// Reads the logger file into a table of the non-empty temperature channels
pub fn read_temperature_log(path: &Path) -> Result<RunTable, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut stamps = Vec::new();
    let mut readings: Vec<Vec<f64>> = vec![Vec::new(); TEMPERATURE_COLUMNS.len()];
    for record in reader.records() {
        let record = record?;
        let (Some(date), Some(time)) = (record.get(0), record.get(1)) else {
            continue;
        };
        if date.trim().is_empty() {
            continue;
        }
        stamps.push(parse_timestamp(&format!("{} {}", date.trim(), time.trim()))?);
        for (k, column) in readings.iter_mut().enumerate() {
            column.push(match record.get(k + 2) {
                Some(text) => parse_reading(text)?,
                None => f64::NAN,
            });
        }
    }

    // the logger does not guarantee ordered rows after a clock adjustment
    let mut order: Vec<usize> = (0..stamps.len()).collect();
    order.sort_by_key(|&i| stamps[i]);
    let mut table = RunTable::new(order.iter().map(|&i| stamps[i]).collect());
    for (name, column) in TEMPERATURE_COLUMNS.iter().zip(readings) {
        if column.iter().all(|v| v.is_nan()) {
            continue;
        }
        table.insert_column(name, order.iter().map(|&i| column[i]).collect())?;
    }
    Ok(table)
}

/// Merges the logger file onto `table` by nearest timestamp
pub fn merge_temperature_log(table: &RunTable, path: &Path) -> Result<TemperatureMerge, IngestError> {
    let log = read_temperature_log(path)?;
    let temperature_columns = log.column_names().to_vec();
    info!(
        "temperature log: {} samples, channels {:?}",
        log.len(),
        temperature_columns
    );
    let mut merged = table.clone();
    merged.merge_asof_nearest(&log, TimeDelta::seconds(MERGE_TOLERANCE_S));
    Ok(TemperatureMerge {
        table: merged,
        temperature_columns,
    })
}
