//! # Capacity Integrator
//!
//! Integrates the clamped absorption increments inside each cycle's sorption window and converts
//! the result into capacity metrics:
//!
//! ```text
//! n_abs [mol]     = Σ dn            over sorption_start..=sorption_end
//! m_abs [g]       = n_abs * M_CO2
//! q_grav [g/g]    = m_abs / m_sorbent
//! q_vol  [g/mL]   = m_abs / (m_sorbent / rho_bulk)
//! KPI [%]         = q_vol / q_KPI * 100
//! ```
//!
//! The highest sorption point is the smallest positive `yCO2` inside the window; the dry
//! kinetics model uses it as the plateau concentration. An empty window sums to zero and has
//! no highest sorption point (NaN); the cycle still gets a row.
use crate::Sorption::analysis_error::AnalysisError;
use crate::Sorption::cycle_windows::{
    CycleSpan, CycleWindow, DESORPTION_PHASE, PHASE_COLUMN, phase_rows, rows_in_window,
    sorption_rows,
};
use crate::Sorption::physical_constants::CO2_MOLAR_MASS;
use crate::Sorption::run_parameters::{CalibrationConstants, RunParameters};
use crate::Sorption::run_table::RunTable;
use crate::Sorption::signal_derivation::{ABSORBED_INCREMENT, MOLE_FRACTION, NET_ABSORBED_INCREMENT};
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapacityMetrics {
    /// CO2 absorbed inside the sorption window, mol
    pub absorbed_mol: f64,
    pub absorbed_g: f64,
    /// CO2 absorbed over the whole sorption phase, ignoring the window, mol
    pub phase_absorbed_mol: f64,
    /// CO2 released over the desorption phase, mol (NaN without phase identifiers)
    pub desorbed_mol: f64,
    pub desorbed_g: f64,
    /// g CO2 / g sorbent
    pub gravimetric_capacity: f64,
    /// g CO2 / mL sorbent
    pub volumetric_capacity: f64,
    pub percent_of_kpi: f64,
    /// smallest positive yCO2 [%] inside the window
    pub highest_sorption_point: f64,
    /// sorption_end - sorption_start, min
    pub sorption_duration: f64,
}

/// NaN-skipping sum; an empty or all-missing selection sums to zero
fn sum_present(values: &[f64], rows: &[usize]) -> f64 {
    rows.iter()
        .map(|&i| values[i])
        .filter(|v| !v.is_nan())
        .sum()
}

fn min_positive(values: &[f64], rows: &[usize]) -> f64 {
    rows.iter()
        .map(|&i| values[i])
        .filter(|v| *v > 0.0 && v.is_finite())
        .fold(f64::NAN, f64::min)
}

pub fn integrate_capacity(
    table: &RunTable,
    span: &CycleSpan,
    window: &CycleWindow,
    params: &RunParameters,
    calibration: &CalibrationConstants,
) -> Result<CapacityMetrics, AnalysisError> {
    let dn = table.require_column(ABSORBED_INCREMENT)?;
    let y = table.require_column(MOLE_FRACTION)?;

    let phase = sorption_rows(table, span);
    let cut = rows_in_window(table, span, &phase, window.sorption_start, window.sorption_end);
    if cut.is_empty() {
        debug!("cycle {}: empty sorption window", span.cycle);
    }

    let absorbed_mol = sum_present(dn, &cut);
    let absorbed_g = absorbed_mol * CO2_MOLAR_MASS;
    let gravimetric_capacity = absorbed_g / params.sorbent_mass;
    let volumetric_capacity = absorbed_g / params.sorbent_volume_ml();
    let percent_of_kpi = volumetric_capacity / calibration.kpi_volumetric_capacity * 100.0;

    let desorbed_mol = if table.has_column(PHASE_COLUMN) {
        let net = table.require_column(NET_ABSORBED_INCREMENT)?;
        -sum_present(net, &phase_rows(table, span, DESORPTION_PHASE))
    } else {
        f64::NAN
    };

    Ok(CapacityMetrics {
        absorbed_mol,
        absorbed_g,
        phase_absorbed_mol: sum_present(dn, &phase),
        desorbed_mol,
        desorbed_g: desorbed_mol * CO2_MOLAR_MASS,
        gravimetric_capacity,
        volumetric_capacity,
        percent_of_kpi,
        highest_sorption_point: min_positive(y, &cut),
        sorption_duration: window.sorption_end - window.sorption_start,
    })
}
