//! # Run Table
//!
//! Time-indexed table of one sorption run: one row per mass-spectrometer sample, a monotonic
//! (but not necessarily uniform) timestamp index and any number of named `f64` columns.
//! Missing values are stored as `f64::NAN`, so "not computed" is always distinguishable from
//! a genuine zero.
//!
//! Columns keep their insertion order, which is the order the viewer offers them in.
use crate::Sorption::analysis_error::AnalysisError;
use chrono::{NaiveDateTime, TimeDelta};
use std::collections::HashMap;
use std::ops::Range;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunTable {
    timestamps: Vec<NaiveDateTime>,
    column_order: Vec<String>,
    columns: HashMap<String, Vec<f64>>,
}

impl RunTable {
    /// Creates an empty table over the given (sorted) timestamp index
    pub fn new(timestamps: Vec<NaiveDateTime>) -> Self {
        Self {
            timestamps,
            column_order: Vec::new(),
            columns: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_order
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(|v| v.as_slice())
    }

    pub fn require_column(&self, name: &str) -> Result<&[f64], AnalysisError> {
        self.column(name)
            .ok_or_else(|| AnalysisError::MissingColumn(name.to_string()))
    }

    /// Inserts or replaces a column. Replacing keeps the original position.
    pub fn insert_column(&mut self, name: &str, values: Vec<f64>) -> Result<(), AnalysisError> {
        if values.len() != self.len() {
            return Err(AnalysisError::LengthMismatch {
                column: name.to_string(),
                expected: self.len(),
                found: values.len(),
            });
        }
        if !self.columns.contains_key(name) {
            self.column_order.push(name.to_string());
        }
        self.columns.insert(name.to_string(), values);
        Ok(())
    }

    pub fn remove_column(&mut self, name: &str) -> Option<Vec<f64>> {
        self.column_order.retain(|c| c != name);
        self.columns.remove(name)
    }

    /// Seconds elapsed since the previous sample; the first sample has no predecessor (NaN)
    pub fn seconds_since_previous(&self) -> Vec<f64> {
        let mut dt = Vec::with_capacity(self.len());
        for i in 0..self.len() {
            if i == 0 {
                dt.push(f64::NAN);
            } else {
                dt.push(seconds_between(self.timestamps[i - 1], self.timestamps[i]));
            }
        }
        dt
    }

    /// Row range with `start <= t <= end`, found by bisection on the sorted index
    pub fn rows_between(&self, start: NaiveDateTime, end: NaiveDateTime) -> Range<usize> {
        let lo = self.timestamps.partition_point(|t| *t < start);
        let hi = self.timestamps.partition_point(|t| *t <= end);
        lo..hi.max(lo)
    }

    /// Minutes of row `i` relative to `origin`
    pub fn minutes_from(&self, origin: NaiveDateTime, i: usize) -> f64 {
        seconds_between(origin, self.timestamps[i]) / 60.0
    }

    /// Nearest-timestamp as-of join: for each row of `self`, takes the row of `other` whose
    /// timestamp is closest (ties go to the earlier one) when it lies within `tolerance`.
    /// Unmatched rows get NaN. `other` must be sorted.
    pub fn merge_asof_nearest(&mut self, other: &RunTable, tolerance: TimeDelta) {
        let matches: Vec<Option<usize>> = self
            .timestamps
            .iter()
            .map(|t| nearest_row(&other.timestamps, *t, tolerance))
            .collect();
        for name in other.column_names() {
            let source = &other.columns[name];
            let merged: Vec<f64> = matches
                .iter()
                .map(|m| m.map_or(f64::NAN, |j| source[j]))
                .collect();
            if !self.columns.contains_key(name) {
                self.column_order.push(name.clone());
            }
            self.columns.insert(name.clone(), merged);
        }
    }
}

pub fn seconds_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    let delta = to - from;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1e6,
        None => delta.num_milliseconds() as f64 / 1e3,
    }
}

fn nearest_row(index: &[NaiveDateTime], t: NaiveDateTime, tolerance: TimeDelta) -> Option<usize> {
    let pos = index.partition_point(|x| *x < t);
    let mut best: Option<(usize, TimeDelta)> = None;
    for j in [pos.checked_sub(1), Some(pos)].into_iter().flatten() {
        if j >= index.len() {
            continue;
        }
        let dist = (index[j] - t).abs();
        if dist <= tolerance && best.is_none_or(|(_, d)| dist < d) {
            best = Some((j, dist));
        }
    }
    best.map(|(j, _)| j)
}
