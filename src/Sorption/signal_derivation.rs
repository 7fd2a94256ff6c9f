//! # Signal Derivation
//!
//! Computes the instantaneous derived channels of a run from the raw compound signals:
//!
//! ```text
//! ratio         = CO2 / reference
//! yCO2 [%]      = ratio * (reactor_input_ratio / qms_input_ratio) * 100
//! C [mol/m3]    = yCO2/100 * P / (R*T)
//! ln C          = ln(C)                       (non-finite for C <= 0, never an error)
//! F_out [mol/s] = yCO2/100 * F_in
//! dn_net [mol]  = (F_in_CO2 - F_out) * dt
//! dn [mol]      = max(0, dn_net)
//! ```
//!
//! `dt` is the time since the previous sample, so the first sample contributes nothing.
//! The clamp treats negative instantaneous absorption inside the sorption phase as jitter;
//! the unclamped `dn_net` is kept only for the desorption totals.
use crate::Sorption::analysis_error::AnalysisError;
use crate::Sorption::physical_constants::total_molar_concentration;
use crate::Sorption::run_parameters::{DEFAULT_REFERENCE_COMPOUND, RunParameters, TARGET_COMPOUND};
use crate::Sorption::run_table::RunTable;
use log::{info, warn};

pub const RATIO: &str = "CO2 Ratio";
pub const MOLE_FRACTION: &str = "yCO2 [%]";
pub const CONCENTRATION: &str = "CO2 Concentration [mol/m3]";
pub const LOG_CONCENTRATION: &str = "ln CO2 Concentration";
pub const OUTLET_MOLAR_FLOW: &str = "CO2 Outlet Flow [mol/s]";
pub const NET_ABSORBED_INCREMENT: &str = "CO2 Net Absorbed [mol]";
pub const ABSORBED_INCREMENT: &str = "CO2 Absorbed [mol]";

/// What the derivation stage did to the table
#[derive(Debug, Clone, PartialEq)]
pub struct DerivationReport {
    /// reference compound actually used for the ratio
    pub reference_used: String,
    /// true when the configured reference was missing and the default was substituted
    pub reference_fell_back: bool,
    /// names of the columns introduced, in insertion order
    pub new_columns: Vec<String>,
}

/// Picks the reference column: the configured one when present, otherwise the default.
pub fn resolve_reference_compound(table: &RunTable, configured: &str) -> (String, bool) {
    if table.has_column(configured) {
        (configured.to_string(), false)
    } else {
        (DEFAULT_REFERENCE_COMPOUND.to_string(), true)
    }
}

/// Adds the derived channels to `table` in place.
///
/// Fails only when the target compound column itself is absent.
pub fn derive_signals(
    table: &mut RunTable,
    params: &RunParameters,
) -> Result<DerivationReport, AnalysisError> {
    let target = table.require_column(TARGET_COMPOUND)?.to_vec();
    let (reference_used, reference_fell_back) =
        resolve_reference_compound(table, &params.reference_gas);
    if reference_fell_back {
        warn!(
            "reference gas '{}' not found, falling back to '{}'",
            params.reference_gas, reference_used
        );
    }
    let ratio: Vec<f64> = match table.column(&reference_used) {
        Some(reference) => target
            .iter()
            .zip(reference)
            .map(|(t, r)| t / r)
            .collect(),
        None => {
            warn!(
                "default reference '{}' is missing too, ratio left undefined",
                reference_used
            );
            vec![f64::NAN; table.len()]
        }
    };

    let scale = params.reactor_input_ratio / params.qms_input_ratio * 100.0;
    let mole_fraction: Vec<f64> = ratio.iter().map(|r| r * scale).collect();

    let c_total = total_molar_concentration();
    let concentration: Vec<f64> = mole_fraction.iter().map(|y| y / 100.0 * c_total).collect();
    let log_concentration: Vec<f64> = concentration.iter().map(|c| c.ln()).collect();

    let inlet_flow = params.inlet_molar_flow();
    let inlet_co2_flow = params.inlet_co2_molar_flow();
    let outlet_flow: Vec<f64> = mole_fraction
        .iter()
        .map(|y| y / 100.0 * inlet_flow)
        .collect();

    let dt = table.seconds_since_previous();
    let net_absorbed: Vec<f64> = outlet_flow
        .iter()
        .zip(&dt)
        .map(|(out, dt)| {
            if dt.is_nan() {
                0.0
            } else {
                (inlet_co2_flow - out) * dt
            }
        })
        .collect();
    let absorbed: Vec<f64> = net_absorbed
        .iter()
        .map(|n| if n.is_nan() { f64::NAN } else { n.max(0.0) })
        .collect();

    let derived = [
        (RATIO, ratio),
        (MOLE_FRACTION, mole_fraction),
        (CONCENTRATION, concentration),
        (LOG_CONCENTRATION, log_concentration),
        (OUTLET_MOLAR_FLOW, outlet_flow),
        (NET_ABSORBED_INCREMENT, net_absorbed),
        (ABSORBED_INCREMENT, absorbed),
    ];
    let mut new_columns = Vec::with_capacity(derived.len());
    for (name, values) in derived {
        table.insert_column(name, values)?;
        new_columns.push(name.to_string());
    }
    info!(
        "signals derived over {} samples against '{}'",
        table.len(),
        reference_used
    );
    Ok(DerivationReport {
        reference_used,
        reference_fell_back,
        new_columns,
    })
}
