//! # Reactor-Controller Log Merge
//!
//! The controller writes one `data_YYYY-MM-DD.csv` per day, sampled every few seconds. For a
//! mass-spec run every day it touches is read, plus the day before it (cycles started before
//! midnight), and merged onto the mass-spec samples by nearest timestamp within 10 s.
//!
//! The merged `No Completed Cycles` counter then defines the cycles: one per distinct counter
//! value in order of appearance, spanning the first to the last sample carrying it.
use crate::Ingest::ingest_error::IngestError;
use crate::Ingest::timestamps::{parse_cell, parse_reactor_timestamp};
use crate::Sorption::cycle_windows::{CYCLE_COUNTER_COLUMN, CycleSpan};
use crate::Sorption::run_table::RunTable;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use log::{error, info};
use std::path::{Path, PathBuf};

pub const TIMESTAMP_COLUMN: &str = "Timestamp";
/// Controller columns without analytical value
pub const DROPPED_COLUMNS: [&str; 5] = ["MFC1.ID", "MFC2.ID", "MFC3.ID", "MFC4.ID", "MFC5.ID"];
/// Mass-flow readings whose gaps mean "no flow"
pub const ZERO_FILLED_COLUMNS: [&str; 4] = [
    "MFC1.Massflow",
    "MFC2.Massflow",
    "MFC3.Massflow",
    "MFC4.Massflow",
];
/// As-of merge tolerance in seconds
pub const MERGE_TOLERANCE_S: i64 = 10;

#[derive(Debug, Clone)]
pub struct ReactorMerge {
    /// mass-spec table with the controller channels added
    pub table: RunTable,
    /// controller channel names
    pub parameters: Vec<String>,
    pub cycles: Vec<CycleSpan>,
    pub files: Vec<PathBuf>,
}

/// Daily file names covering the samples of `table`, the day before the first one included
pub fn daily_file_names(table: &RunTable) -> Vec<String> {
    let mut dates: Vec<NaiveDate> = table.timestamps().iter().map(|t| t.date()).collect();
    dates.sort();
    dates.dedup();
    if let Some(before) = dates.first().and_then(|d| d.pred_opt()) {
        dates.insert(0, before);
    }
    dates
        .iter()
        .map(|d| format!("data_{}.csv", d.format("%Y-%m-%d")))
        .collect()
}

/// Rows of the concatenated daily files, before they become a run table
#[derive(Default)]
struct LogRows {
    columns: Vec<String>,
    rows: Vec<(NaiveDateTime, Vec<f64>)>,
}

impl LogRows {
    fn column_index(&mut self, name: &str) -> usize {
        match self.columns.iter().position(|c| c == name) {
            Some(i) => i,
            None => {
                self.columns.push(name.to_string());
                self.columns.len() - 1
            }
        }
    }

    fn read_file(&mut self, path: &Path) -> Result<(), IngestError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
        let stamp_idx = headers
            .iter()
            .position(|h| h == TIMESTAMP_COLUMN)
            .ok_or_else(|| {
                IngestError::InvalidSchema(format!(
                    "{}: column '{}' not found",
                    path.display(),
                    TIMESTAMP_COLUMN
                ))
            })?;
        // file column -> table column
        let mapping: Vec<(usize, usize)> = headers
            .iter()
            .enumerate()
            .filter(|(i, h)| {
                *i != stamp_idx && !h.is_empty() && !DROPPED_COLUMNS.contains(&h.as_str())
            })
            .map(|(i, h)| (i, self.column_index(h)))
            .collect();

        for record in reader.records() {
            let record = record?;
            let Some(text) = record.get(stamp_idx).filter(|t| !t.trim().is_empty()) else {
                continue;
            };
            let stamp = parse_reactor_timestamp(text)?;
            let mut values = vec![f64::NAN; self.columns.len()];
            for &(from, to) in &mapping {
                values[to] = record.get(from).map_or(f64::NAN, parse_cell);
            }
            self.rows.push((stamp, values));
        }
        Ok(())
    }

    fn into_table(mut self) -> Result<RunTable, IngestError> {
        self.rows.sort_by_key(|(t, _)| *t);
        let width = self.columns.len();
        let mut columns = vec![Vec::with_capacity(self.rows.len()); width];
        let mut stamps = Vec::with_capacity(self.rows.len());
        for (stamp, values) in self.rows {
            stamps.push(stamp);
            for (j, column) in columns.iter_mut().enumerate() {
                column.push(values.get(j).copied().unwrap_or(f64::NAN));
            }
        }
        let mut table = RunTable::new(stamps);
        for (name, mut values) in self.columns.into_iter().zip(columns) {
            if ZERO_FILLED_COLUMNS.contains(&name.as_str()) {
                values.iter_mut().filter(|v| v.is_nan()).for_each(|v| *v = 0.0);
            }
            table.insert_column(&name, values)?;
        }
        Ok(table)
    }
}

/// Reads and concatenates the given daily controller files
pub fn read_reactor_files(paths: &[PathBuf]) -> Result<RunTable, IngestError> {
    let mut rows = LogRows::default();
    for path in paths {
        rows.read_file(path)?;
    }
    rows.into_table()
}

/// One cycle per distinct completed-cycle counter value, renumbered 1..n
pub fn cycles_from_counter(table: &RunTable) -> Result<Vec<CycleSpan>, IngestError> {
    let counter = table
        .column(CYCLE_COUNTER_COLUMN)
        .ok_or(IngestError::NoCycles)?;
    let mut seen: Vec<f64> = Vec::new();
    for v in counter.iter().filter(|v| !v.is_nan()) {
        if !seen.contains(v) {
            seen.push(*v);
        }
    }
    if seen.is_empty() {
        return Err(IngestError::NoCycles);
    }
    let stamps = table.timestamps();
    let cycles = seen
        .iter()
        .enumerate()
        .filter_map(|(k, value)| {
            let mut rows = counter
                .iter()
                .enumerate()
                .filter(|(_, v)| *v == value)
                .map(|(i, _)| stamps[i]);
            let first = rows.next()?;
            let (start, end) = rows.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));
            Some(CycleSpan {
                cycle: k + 1,
                start,
                end,
            })
        })
        .collect();
    Ok(cycles)
}

/// Merges the reactor-controller log from `folder` onto the mass-spec table
pub fn merge_reactor_log(table: &RunTable, folder: &Path) -> Result<ReactorMerge, IngestError> {
    let files: Vec<PathBuf> = daily_file_names(table)
        .iter()
        .map(|name| folder.join(name))
        .collect();
    if let Some(missing) = files.iter().find(|p| !p.exists()) {
        error!("reactor log {} not found", missing.display());
        return Err(IngestError::FileNotFound("Matching CSV Not Found".to_string()));
    }
    let backend = read_reactor_files(&files)?;
    let parameters = backend.column_names().to_vec();
    info!(
        "reactor log: {} samples from {} files, channels {:?}",
        backend.len(),
        files.len(),
        parameters
    );

    let mut merged = table.clone();
    merged.merge_asof_nearest(&backend, TimeDelta::seconds(MERGE_TOLERANCE_S));
    let cycles = cycles_from_counter(&merged)?;
    info!("{} cycles found in the merged run", cycles.len());
    Ok(ReactorMerge {
        table: merged,
        parameters,
        cycles,
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Sorption::cycle_windows::PHASE_COLUMN;
    use std::fs;
    use tempfile::tempdir;

    fn at(day: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    /// mass-spec samples every 30 s across midnight
    fn qms_table() -> RunTable {
        let stamps: Vec<_> = (0..6)
            .map(|i| at(1, 23, 58, 30) + TimeDelta::seconds(30 * i))
            .collect();
        let mut table = RunTable::new(stamps);
        table.insert_column("CO2", vec![0.01; 6]).unwrap();
        table
    }

    const HEADER: &str =
        "Timestamp,MFC1.ID,MFC1.Massflow,MFC2.ID,MFC2.Massflow,MFC3.ID,MFC4.ID,MFC5.ID,Cycle Identifier,No Completed Cycles";

    fn write_day(dir: &Path, name: &str, rows: &[&str]) {
        let mut text = String::from(HEADER);
        for r in rows {
            text.push('\n');
            text.push_str(r);
        }
        fs::write(dir.join(name), text).unwrap();
    }

    fn folder() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        write_day(dir.path(), "data_2024-04-30.csv", &[]);
        write_day(
            dir.path(),
            "data_2024-05-01.csv",
            &[
                "05/01/2024 11:58:28 PM,a,100,b,,c,d,e,3,5",
                "05/01/2024 11:59:02 PM,a,100,b,,c,d,e,3,5",
                "05/01/2024 11:59:29 PM,a,100,b,20,c,d,e,4,5",
            ],
        );
        write_day(
            dir.path(),
            "data_2024-05-02.csv",
            &[
                "05/02/2024 12:00:01 AM,a,,b,20,c,d,e,3,6",
                "05/02/2024 12:00:31 AM,a,100,b,20,c,d,e,3,6",
            ],
        );
        dir
    }

    #[test]
    fn test_daily_file_names_include_previous_day() {
        assert_eq!(
            daily_file_names(&qms_table()),
            vec!["data_2024-04-30.csv", "data_2024-05-01.csv", "data_2024-05-02.csv"]
        );
    }

    #[test]
    fn test_merge_and_cycles() {
        let dir = folder();
        let merge = merge_reactor_log(&qms_table(), dir.path()).unwrap();
        assert_eq!(
            merge.parameters,
            vec!["MFC1.Massflow", "MFC2.Massflow", PHASE_COLUMN, CYCLE_COUNTER_COLUMN]
        );
        assert!(!merge.table.has_column("MFC1.ID"));
        assert!(!merge.table.has_column(TIMESTAMP_COLUMN));

        let counter = merge.table.column(CYCLE_COUNTER_COLUMN).unwrap();
        // 23:58:30 <- 23:58:28, 23:59:00 <- 23:59:02, 23:59:30 <- 23:59:29,
        // 00:00:00 <- 00:00:01, 00:00:30 <- 00:00:31, 00:01:00 has nothing within 10 s
        assert_eq!(&counter[..5], &[5.0, 5.0, 5.0, 6.0, 6.0]);
        assert!(counter[5].is_nan());

        // gaps in mass flows read as zero flow
        let mfc2 = merge.table.column("MFC2.Massflow").unwrap();
        assert_eq!(mfc2[0], 0.0);
        assert_eq!(merge.table.column("MFC1.Massflow").unwrap()[3], 0.0);

        assert_eq!(merge.cycles.len(), 2);
        assert_eq!(merge.cycles[0].cycle, 1);
        assert_eq!(merge.cycles[0].start, at(1, 23, 58, 30));
        assert_eq!(merge.cycles[0].end, at(1, 23, 59, 30));
        assert_eq!(merge.cycles[1].cycle, 2);
        assert_eq!(merge.cycles[1].start, at(2, 0, 0, 0));
        assert_eq!(merge.cycles[1].end, at(2, 0, 0, 30));
        assert_eq!(merge.files.len(), 3);
    }

    #[test]
    fn test_missing_daily_file() {
        let dir = folder();
        fs::remove_file(dir.path().join("data_2024-04-30.csv")).unwrap();
        match merge_reactor_log(&qms_table(), dir.path()) {
            Err(IngestError::FileNotFound(msg)) => assert_eq!(msg, "Matching CSV Not Found"),
            other => panic!("unexpected {:?}", other.map(|m| m.cycles)),
        }
    }

    #[test]
    fn test_no_counter_means_no_cycles() {
        let table = qms_table();
        assert!(matches!(cycles_from_counter(&table), Err(IngestError::NoCycles)));
        let mut table = qms_table();
        table
            .insert_column(CYCLE_COUNTER_COLUMN, vec![f64::NAN; 6])
            .unwrap();
        assert!(matches!(cycles_from_counter(&table), Err(IngestError::NoCycles)));
    }

    #[test]
    fn test_bad_timestamp_is_reported() {
        let dir = tempdir().unwrap();
        write_day(dir.path(), "data_2024-05-01.csv", &["2024-05-01 10:00:00,a,1,b,1,c,d,e,3,1"]);
        let err = read_reactor_files(&[dir.path().join("data_2024-05-01.csv")]).unwrap_err();
        assert!(matches!(err, IngestError::Timestamp(_)));
    }
}
