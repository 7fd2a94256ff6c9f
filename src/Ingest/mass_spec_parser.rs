//! # Mass-Spectrometer Export Parser
//!
//! The QMS software writes a small preamble before the data block:
//!
//! ```text
//! line 0:  <name>,scans,...            marker, anything else is not a QMS export
//! line 1:  <label>,<n>,...             the column header sits on line n + 1
//! line 2:  <label>,<date>,<label>,<time>,...
//! ...
//! line n+1: Time,ms,N2,O2,CO2,...
//! ```
//!
//! Each data row carries the offset from the start datetime in the `ms` column. `Time` and `ms`
//! are dropped, every other column is a compound signal. The whole file is one cycle.
use crate::Ingest::ingest_error::IngestError;
use crate::Ingest::timestamps::{parse_cell, parse_timestamp};
use crate::Sorption::cycle_windows::CycleSpan;
use crate::Sorption::run_table::RunTable;
use chrono::{NaiveDateTime, TimeDelta};
use log::{error, info};
use std::fs;
use std::path::Path;

pub const SCANS_MARKER: &str = "scans";
pub const OFFSET_COLUMN: &str = "ms";
pub const CLOCK_COLUMN: &str = "Time";

/// Parsed mass-spectrometer run
#[derive(Debug, Clone)]
pub struct MassSpecRun {
    pub table: RunTable,
    /// compound columns in file order
    pub compounds: Vec<String>,
    pub start: NaiveDateTime,
    pub cycles: Vec<CycleSpan>,
}

fn field(line: Option<&str>, index: usize) -> Option<&str> {
    line.and_then(|l| l.split(',').nth(index)).map(str::trim)
}

fn invalid() -> IngestError {
    IngestError::InvalidSchema("Invalid - Try Another CSV".to_string())
}

/// Parses the text of a QMS export
pub fn parse_mass_spec(text: &str) -> Result<MassSpecRun, IngestError> {
    let mut lines = text.lines();
    let (line0, line1, line2) = (lines.next(), lines.next(), lines.next());
    if field(line0, 1) != Some(SCANS_MARKER) {
        return Err(invalid());
    }
    let header_line = field(line1, 1)
        .and_then(|n| n.parse::<usize>().ok())
        .map(|n| n + 1)
        .ok_or_else(|| IngestError::InvalidSchema("header row number not found".to_string()))?;
    let (date, time) = match (field(line2, 1), field(line2, 3)) {
        (Some(d), Some(t)) => (d, t),
        _ => return Err(IngestError::InvalidSchema("start date and time not found".to_string())),
    };
    let start = parse_timestamp(&format!("{} {}", date, time))?;

    let data: String = text
        .lines()
        .skip(header_line)
        .collect::<Vec<_>>()
        .join("\n");
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data.as_bytes());
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let offset_idx = headers
        .iter()
        .position(|h| h == OFFSET_COLUMN)
        .ok_or_else(|| IngestError::InvalidSchema(format!("column '{}' not found", OFFSET_COLUMN)))?;
    let compound_idx: Vec<usize> = (0..headers.len())
        .filter(|&i| i != offset_idx && headers[i] != CLOCK_COLUMN && !headers[i].is_empty())
        .collect();

    let mut stamps = Vec::new();
    let mut values: Vec<Vec<f64>> = vec![Vec::new(); compound_idx.len()];
    for record in reader.records() {
        let record = record?;
        let Some(offset) = record.get(offset_idx).map(parse_cell) else {
            continue;
        };
        if !offset.is_finite() {
            continue;
        }
        let Some(stamp) =
            start.checked_add_signed(TimeDelta::microseconds((offset * 1000.0).round() as i64))
        else {
            return Err(IngestError::InvalidSchema(format!(
                "offset {} ms out of range",
                offset
            )));
        };
        if stamps.last().is_some_and(|last| stamp < *last) {
            return Err(IngestError::InvalidSchema(format!(
                "sample at {} ms goes back in time",
                offset
            )));
        }
        stamps.push(stamp);
        for (column, &i) in values.iter_mut().zip(&compound_idx) {
            column.push(record.get(i).map_or(f64::NAN, parse_cell));
        }
    }
    let (Some(&first), Some(&last)) = (stamps.first(), stamps.last()) else {
        return Err(IngestError::InvalidSchema("no data rows".to_string()));
    };

    let compounds: Vec<String> = compound_idx.iter().map(|&i| headers[i].clone()).collect();
    let mut table = RunTable::new(stamps);
    for (name, column) in compounds.iter().zip(values) {
        table.insert_column(name, column)?;
    }
    info!(
        "mass-spec run from {}: {} samples, compounds {:?}",
        start,
        table.len(),
        compounds
    );
    Ok(MassSpecRun {
        table,
        compounds,
        start,
        cycles: vec![CycleSpan {
            cycle: 1,
            start: first,
            end: last,
        }],
    })
}

/// Reads and parses a QMS export file. Bytes that are not UTF-8 are replaced.
pub fn load_mass_spec(path: &Path) -> Result<MassSpecRun, IngestError> {
    let bytes = fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    parse_mass_spec(&text).inspect_err(|e| error!("{}: {}", path.display(), e))
}
