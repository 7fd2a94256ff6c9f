//! # Cycle Window Resolver
//!
//! For every cycle four window edges are resolved, all stored as minutes from the cycle's raw
//! start so they survive re-ingestion of the same file:
//!
//! ```text
//! raw start                                                          raw end
//!   |--- sorption_start ---- regression_start ---- regression_end ---- sorption_end ---|
//! ```
//!
//! Automatic values come from breakthrough crossings of `yCO2` over the sorption phase:
//! - `sorption_start_auto`: first sample above the regression-start threshold
//! - `sorption_end_auto`: first later sample above the regression-end threshold
//!
//! and the resolution is
//!
//! | edge | manual cut set | auto |
//! |------|----------------|------|
//! | sorption start | cut | 0 (raw start) |
//! | sorption end | cut | `sorption_end_auto` |
//! | regression start | cut | `sorption_start_auto` clamped to [sorption start, sorption end] |
//! | regression end | cut | `sorption_end_auto` clamped to [regression start, sorption end] |
//!
//! A manual cut is accepted only strictly inside the cycle's raw span; anything else is
//! discarded and the edge goes back to automatic resolution.
use crate::Sorption::analysis_error::AnalysisError;
use crate::Sorption::run_parameters::RunParameters;
use crate::Sorption::run_table::{RunTable, seconds_between};
use crate::Sorption::signal_derivation::MOLE_FRACTION;
use chrono::NaiveDateTime;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reactor-controller phase identifier column
pub const PHASE_COLUMN: &str = "Cycle Identifier";
/// Completed-cycle counter column
pub const CYCLE_COUNTER_COLUMN: &str = "No Completed Cycles";
/// Phase identifier value of the sorption step
pub const SORPTION_PHASE: f64 = 3.0;
/// Phase identifier value of the desorption step
pub const DESORPTION_PHASE: f64 = 4.0;

/// Raw boundaries of one cycle as delivered by ingest
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleSpan {
    /// 1-based cycle number
    pub cycle: usize,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl CycleSpan {
    pub fn duration_minutes(&self) -> f64 {
        seconds_between(self.start, self.end) / 60.0
    }

    /// true when `minutes` after the raw start lies strictly inside the raw span
    pub fn contains_offset(&self, minutes: f64) -> bool {
        minutes.is_finite() && minutes > 0.0 && minutes < self.duration_minutes()
    }
}

/// One window edge: automatic or manually cut at some minute offset
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Cut {
    #[default]
    Auto,
    Overridden(f64),
}

impl Cut {
    pub fn or_auto(self, auto: f64) -> f64 {
        match self {
            Cut::Auto => auto,
            Cut::Overridden(minutes) => minutes,
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, Cut::Auto)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Boundary {
    SorptionStart,
    SorptionEnd,
    RegressionStart,
    RegressionEnd,
}

impl Boundary {
    pub const ALL: [Boundary; 4] = [
        Boundary::SorptionStart,
        Boundary::SorptionEnd,
        Boundary::RegressionStart,
        Boundary::RegressionEnd,
    ];
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Boundary::SorptionStart => "Sorption Start",
            Boundary::SorptionEnd => "Sorption End",
            Boundary::RegressionStart => "Regression Start",
            Boundary::RegressionEnd => "Regression End",
        };
        write!(f, "{}", name)
    }
}

/// Manual cuts of a single cycle
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CycleCuts {
    pub sorption_start: Cut,
    pub sorption_end: Cut,
    pub regression_start: Cut,
    pub regression_end: Cut,
}

impl CycleCuts {
    pub fn get(&self, boundary: Boundary) -> Cut {
        match boundary {
            Boundary::SorptionStart => self.sorption_start,
            Boundary::SorptionEnd => self.sorption_end,
            Boundary::RegressionStart => self.regression_start,
            Boundary::RegressionEnd => self.regression_end,
        }
    }

    fn slot(&mut self, boundary: Boundary) -> &mut Cut {
        match boundary {
            Boundary::SorptionStart => &mut self.sorption_start,
            Boundary::SorptionEnd => &mut self.sorption_end,
            Boundary::RegressionStart => &mut self.regression_start,
            Boundary::RegressionEnd => &mut self.regression_end,
        }
    }
}

/// What happened to a requested manual cut
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverrideOutcome {
    Accepted,
    /// outside the raw span; the edge is back to automatic
    Rejected,
    Cleared,
}

/// Manual cuts of all cycles, indexed by 1-based cycle number
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OverrideSet {
    cuts: Vec<CycleCuts>,
}

impl OverrideSet {
    pub fn new(n_cycles: usize) -> Self {
        Self {
            cuts: vec![CycleCuts::default(); n_cycles],
        }
    }

    pub fn len(&self) -> usize {
        self.cuts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cuts.is_empty()
    }

    /// Resets every cut to automatic when the cycle count changed; keeps them otherwise.
    /// Returns true if a reset happened.
    pub fn fit_to(&mut self, n_cycles: usize) -> bool {
        if self.cuts.len() == n_cycles {
            return false;
        }
        self.cuts = vec![CycleCuts::default(); n_cycles];
        true
    }

    pub fn cycle(&self, cycle: usize) -> Result<&CycleCuts, AnalysisError> {
        cycle
            .checked_sub(1)
            .and_then(|i| self.cuts.get(i))
            .ok_or(AnalysisError::UnknownCycle(cycle))
    }

    fn cycle_mut(&mut self, cycle: usize) -> Result<&mut CycleCuts, AnalysisError> {
        cycle
            .checked_sub(1)
            .and_then(|i| self.cuts.get_mut(i))
            .ok_or(AnalysisError::UnknownCycle(cycle))
    }

    pub fn get(&self, cycle: usize, boundary: Boundary) -> Result<Cut, AnalysisError> {
        Ok(self.cycle(cycle)?.get(boundary))
    }

    /// Records a manual cut after checking it against the cycle's raw span
    pub fn set(
        &mut self,
        span: &CycleSpan,
        boundary: Boundary,
        minutes: f64,
    ) -> Result<OverrideOutcome, AnalysisError> {
        let slot = self.cycle_mut(span.cycle)?.slot(boundary);
        if span.contains_offset(minutes) {
            *slot = Cut::Overridden(minutes);
            Ok(OverrideOutcome::Accepted)
        } else {
            warn!(
                "cycle {}: {} cut at {} min is outside the raw span (0, {:.3}) and was discarded",
                span.cycle,
                boundary,
                minutes,
                span.duration_minutes()
            );
            *slot = Cut::Auto;
            Ok(OverrideOutcome::Rejected)
        }
    }

    /// Sends every stored cut back to automatic when it no longer lies strictly inside its
    /// cycle's raw span. Returns how many cuts were discarded.
    pub fn validate(&mut self, spans: &[CycleSpan]) -> usize {
        let mut discarded = 0;
        for (cuts, span) in self.cuts.iter_mut().zip(spans) {
            for boundary in Boundary::ALL {
                let slot = cuts.slot(boundary);
                let Cut::Overridden(minutes) = *slot else {
                    continue;
                };
                if !span.contains_offset(minutes) {
                    warn!(
                        "cycle {}: stored {} cut at {} min is outside the raw span (0, {:.3}) and was discarded",
                        span.cycle,
                        boundary,
                        minutes,
                        span.duration_minutes()
                    );
                    *slot = Cut::Auto;
                    discarded += 1;
                }
            }
        }
        discarded
    }

    pub fn clear(&mut self, cycle: usize, boundary: Boundary) -> Result<OverrideOutcome, AnalysisError> {
        *self.cycle_mut(cycle)?.slot(boundary) = Cut::Auto;
        Ok(OverrideOutcome::Cleared)
    }
}

/// Resolved window of one cycle, minutes from the raw start
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleWindow {
    pub sorption_start: f64,
    pub sorption_end: f64,
    pub regression_start: f64,
    pub regression_end: f64,
    pub sorption_start_auto: f64,
    pub sorption_end_auto: f64,
}

/// Rows of the cycle's raw span that belong to the sorption phase. Without a phase column
/// every row of the span counts.
pub fn sorption_rows(table: &RunTable, span: &CycleSpan) -> Vec<usize> {
    phase_rows(table, span, SORPTION_PHASE)
}

/// Rows of the cycle's raw span carrying the given phase identifier
pub fn phase_rows(table: &RunTable, span: &CycleSpan, phase: f64) -> Vec<usize> {
    let range = table.rows_between(span.start, span.end);
    match table.column(PHASE_COLUMN) {
        Some(ids) => range.filter(|&i| ids[i] == phase).collect(),
        None => range.collect(),
    }
}

/// Sub-slice of `rows` whose minute offset lies in `[from, to]`
pub fn rows_in_window(
    table: &RunTable,
    span: &CycleSpan,
    rows: &[usize],
    from: f64,
    to: f64,
) -> Vec<usize> {
    rows.iter()
        .copied()
        .filter(|&i| {
            let m = table.minutes_from(span.start, i);
            m >= from && m <= to
        })
        .collect()
}

/// Automatic breakthrough crossings `(sorption_start_auto, sorption_end_auto)` in minutes.
///
/// A threshold that is never exceeded resolves to the last sorption sample; an empty
/// sorption slice gives NaN for both.
pub fn detect_crossings(
    table: &RunTable,
    span: &CycleSpan,
    params: &RunParameters,
) -> Result<(f64, f64), AnalysisError> {
    let y = table.require_column(MOLE_FRACTION)?;
    let rows = sorption_rows(table, span);
    let Some(&last) = rows.last() else {
        debug!("cycle {}: empty sorption slice", span.cycle);
        return Ok((f64::NAN, f64::NAN));
    };
    let start_level = params.start_threshold_mole_fraction();
    let end_level = params.end_threshold_mole_fraction();

    let start_pos = rows.iter().position(|&i| y[i] > start_level);
    let start_row = match start_pos {
        Some(p) => rows[p],
        None => last,
    };
    let end_row = rows[start_pos.map_or(rows.len(), |p| p + 1)..]
        .iter()
        .copied()
        .find(|&i| y[i] > end_level)
        .unwrap_or(last);

    Ok((
        table.minutes_from(span.start, start_row),
        table.minutes_from(span.start, end_row),
    ))
}

/// `x` limited to `[lo, hi]`; NaN in `x` propagates, and `lo > hi` resolves to `hi`
fn clamp_between(x: f64, lo: f64, hi: f64) -> f64 {
    if x.is_nan() {
        return x;
    }
    let mut v = x;
    if v < lo {
        v = lo;
    }
    if v > hi {
        v = hi;
    }
    v
}

/// Combines automatic crossings with manual cuts
pub fn resolve_window(auto: (f64, f64), cuts: &CycleCuts) -> CycleWindow {
    let (sorption_start_auto, sorption_end_auto) = auto;
    let sorption_start = cuts.sorption_start.or_auto(0.0);
    let sorption_end = cuts.sorption_end.or_auto(sorption_end_auto);
    let regression_start = cuts
        .regression_start
        .or_auto(clamp_between(sorption_start_auto, sorption_start, sorption_end));
    let regression_end = cuts
        .regression_end
        .or_auto(clamp_between(sorption_end_auto, regression_start, sorption_end));
    CycleWindow {
        sorption_start,
        sorption_end,
        regression_start,
        regression_end,
        sorption_start_auto,
        sorption_end_auto,
    }
}

/// Resolves the windows of all cycles
pub fn resolve_windows(
    table: &RunTable,
    spans: &[CycleSpan],
    params: &RunParameters,
    overrides: &OverrideSet,
) -> Result<Vec<CycleWindow>, AnalysisError> {
    let mut windows = Vec::with_capacity(spans.len());
    for span in spans {
        let auto = detect_crossings(table, span, params)?;
        let cuts = overrides.cycle(span.cycle)?;
        let window = resolve_window(auto, cuts);
        debug!("cycle {}: window {:?}", span.cycle, window);
        windows.push(window);
    }
    Ok(windows)
}
