//! # Wet Kinetics Estimator
//!
//! First-order uptake fitted on the breakthrough curve of one cycle.
//!
//! Within `sorption_start..=regression_end` the absorbed increments are accumulated and used to
//! deplete the bed: the fraction of the cycle's final uptake already absorbed is the fraction of
//! sorbent volume no longer active,
//!
//! ```text
//! V_act(t) = V - n_acc(t) / n_acc(end) * V
//! tau(t)   = V_act(t) / F_in * 60                [s]
//! ```
//!
//! and inside `regression_start..=regression_end`
//!
//! ```text
//! ln C - C0 = -K * tau                           (no intercept is fitted)
//! ```
//!
//! `C0` is a fixed calibration constant. When the accumulated uptake is zero the depletion is
//! taken against the cycle's volumetric capacity instead (`n_acc * M_CO2 / q_vol`).
//! Fewer than two usable points give `K = NaN` and `R² = NaN`, never zero.
use crate::Sorption::analysis_error::AnalysisError;
use crate::Sorption::capacity::CapacityMetrics;
use crate::Sorption::cycle_windows::{CycleSpan, CycleWindow, rows_in_window, sorption_rows};
use crate::Sorption::physical_constants::CO2_MOLAR_MASS;
use crate::Sorption::run_parameters::{CalibrationConstants, RunParameters};
use crate::Sorption::run_table::RunTable;
use crate::Sorption::signal_derivation::{ABSORBED_INCREMENT, LOG_CONCENTRATION};
use log::debug;
use nalgebra::DVector;

pub const ACCUMULATED_ABSORBED: &str = "CO2 Accumulated [mol]";
pub const ACTIVE_VOLUME: &str = "Active Sorbent Volume [mL]";
pub const RESIDENCE_TIME: &str = "Residence Time [s]";

/// Result of the zero-intercept fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WetKinetics {
    pub rate_constant: f64,
    pub r_squared: f64,
    /// points that entered the fit
    pub n_points: usize,
}

impl WetKinetics {
    pub fn undefined(n_points: usize) -> Self {
        Self {
            rate_constant: f64::NAN,
            r_squared: f64::NAN,
            n_points,
        }
    }
}

/// Per-sample intermediate channels of one cycle, for the rows in `rows`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WetTrace {
    pub rows: Vec<usize>,
    pub accumulated: Vec<f64>,
    pub active_volume: Vec<f64>,
    pub residence_time: Vec<f64>,
}

/// Least squares slope of `y = b*x` and its coefficient of determination.
///
/// Pairs with a non-finite member are dropped first. Returns `(NaN, NaN, n)` when fewer than
/// two pairs remain or all `x` are zero. R² uses the mean-centred total sum of squares.
pub fn fit_through_origin(x: &[f64], y: &[f64]) -> (f64, f64, usize) {
    let (xs, ys): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y)
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(a, b)| (*a, *b))
        .unzip();
    let n = xs.len();
    if n < 2 {
        return (f64::NAN, f64::NAN, n);
    }
    let x = DVector::from_vec(xs);
    let y = DVector::from_vec(ys);
    let sxx = x.dot(&x);
    if sxx == 0.0 {
        return (f64::NAN, f64::NAN, n);
    }
    let slope = x.dot(&y) / sxx;
    let residuals = &y - x.scale(slope);
    let ss_res = residuals.norm_squared();
    let mean = y.mean();
    let ss_tot = y.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
    let r_squared = if ss_tot == 0.0 {
        f64::NAN
    } else {
        1.0 - ss_res / ss_tot
    };
    (slope, r_squared, n)
}

/// Depletes the bed along the accumulated uptake and converts it into residence times
pub fn residence_trace(
    table: &RunTable,
    rows: Vec<usize>,
    capacity: &CapacityMetrics,
    params: &RunParameters,
) -> Result<WetTrace, AnalysisError> {
    let dn = table.require_column(ABSORBED_INCREMENT)?;
    let total_volume = params.sorbent_volume_ml();

    let mut accumulated = Vec::with_capacity(rows.len());
    let mut running = 0.0;
    for &i in &rows {
        if !dn[i].is_nan() {
            running += dn[i];
        }
        accumulated.push(running);
    }
    let final_uptake = accumulated.last().copied().unwrap_or(0.0);
    let active_volume: Vec<f64> = if final_uptake > 0.0 && final_uptake.is_finite() {
        accumulated
            .iter()
            .map(|n| total_volume - n / final_uptake * total_volume)
            .collect()
    } else {
        accumulated
            .iter()
            .map(|n| total_volume - n * CO2_MOLAR_MASS / capacity.volumetric_capacity)
            .collect()
    };
    let residence_time = active_volume
        .iter()
        .map(|v| v / params.input_flow_rate * 60.0)
        .collect();

    Ok(WetTrace {
        rows,
        accumulated,
        active_volume,
        residence_time,
    })
}

pub fn estimate_wet_kinetics(
    table: &RunTable,
    span: &CycleSpan,
    window: &CycleWindow,
    capacity: &CapacityMetrics,
    params: &RunParameters,
    calibration: &CalibrationConstants,
) -> Result<(WetKinetics, WetTrace), AnalysisError> {
    let ln_c = table.require_column(LOG_CONCENTRATION)?;
    let phase = sorption_rows(table, span);
    let slice = rows_in_window(table, span, &phase, window.sorption_start, window.regression_end);
    let trace = residence_trace(table, slice, capacity, params)?;

    let mut x = Vec::new();
    let mut y = Vec::new();
    for (k, &i) in trace.rows.iter().enumerate() {
        let m = table.minutes_from(span.start, i);
        if m >= window.regression_start && m <= window.regression_end {
            x.push(trace.residence_time[k]);
            y.push(ln_c[i] - calibration.wet_log_intercept);
        }
    }
    let (slope, r_squared, n_points) = fit_through_origin(&x, &y);
    if n_points < 2 {
        debug!(
            "cycle {}: {} usable regression points, rate constant undefined",
            span.cycle, n_points
        );
        return Ok((WetKinetics::undefined(n_points), trace));
    }
    Ok((
        WetKinetics {
            rate_constant: -slope,
            r_squared,
            n_points,
        },
        trace,
    ))
}
