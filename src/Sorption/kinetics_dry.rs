//! # Dry Kinetics Estimator
//!
//! Closed-form rate constant from a humidity/CO2 mass balance over the packed bed. The inlet gas
//! is saturated with water at reactor temperature; each captured CO2 consumes one water:
//!
//! ```text
//! H2O_in  = RH/100 * es(Tc) / (R*T)                        [mol/m3]
//! CO2_in  = y_feed * P/(R*T)                               [mol/m3]
//! CO2_out = y_plateau * P/(R*T)
//! H2O_out = H2O_in - (CO2_in - CO2_out)
//! tau     = V_packing / Q,  V_packing = V_sorbent / packing_factor
//! K       = [ln(CO2_out/H2O_out) - ln(CO2_in/H2O_in)] / (H2O_in - CO2_in) / (-tau)
//! ```
//!
//! `y_plateau` is the cycle's highest sorption point. Everything except `y_plateau` depends only
//! on the run parameters, so the model is built once and applied elementwise over all cycles.
use crate::Sorption::physical_constants::{
    INCH_TO_M, INLET_RELATIVE_HUMIDITY, R_G, REACTOR_PRESSURE_PA, REACTOR_TEMP_C, REACTOR_TEMP_K,
    saturation_vapour_pressure_pa, total_molar_concentration,
};
use crate::Sorption::run_parameters::RunParameters;
use std::f64::consts::PI;

/// Run-level quantities of the dry model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DryModel {
    /// water concentration of the saturated feed, mol/m3
    pub inlet_humidity: f64,
    /// CO2 concentration of the feed, mol/m3
    pub inlet_co2: f64,
    pub reactor_area_m2: f64,
    pub packing_volume_m3: f64,
    pub packing_length_m: f64,
    /// actual volumetric flow at reactor conditions, m3/s
    pub volumetric_flow: f64,
    /// gas residence time in the packing, s
    pub residence_time: f64,
}

impl DryModel {
    pub fn from_parameters(params: &RunParameters) -> Self {
        let vapour_pressure =
            INLET_RELATIVE_HUMIDITY / 100.0 * saturation_vapour_pressure_pa(REACTOR_TEMP_C);
        let inlet_humidity = vapour_pressure / (R_G * REACTOR_TEMP_K);
        let inlet_co2 = params.reactor_input_ratio / 100.0 * total_molar_concentration();

        let diameter_m = params.reactor_diameter * INCH_TO_M;
        let reactor_area_m2 = PI * (diameter_m / 2.0).powi(2);
        let packing_volume_m3 = params.sorbent_volume_m3() / params.packing_factor;
        let packing_length_m = packing_volume_m3 / reactor_area_m2;
        let volumetric_flow =
            params.inlet_molar_flow() * R_G * REACTOR_TEMP_K / REACTOR_PRESSURE_PA;
        let residence_time = packing_volume_m3 / volumetric_flow;

        Self {
            inlet_humidity,
            inlet_co2,
            reactor_area_m2,
            packing_volume_m3,
            packing_length_m,
            volumetric_flow,
            residence_time,
        }
    }

    /// Rate constant for a plateau mole fraction given in percent
    pub fn rate_constant(&self, highest_sorption_point: f64) -> f64 {
        let co2_after = highest_sorption_point / 100.0 * total_molar_concentration();
        let co2_consumed = self.inlet_co2 - co2_after;
        let h2o_after = self.inlet_humidity - co2_consumed;
        ((co2_after / h2o_after).ln() - (self.inlet_co2 / self.inlet_humidity).ln())
            / (self.inlet_humidity - self.inlet_co2)
            / (-self.residence_time)
    }
}

/// Dry rate constants of all cycles, elementwise over their highest sorption points
pub fn dry_rate_constants(params: &RunParameters, highest_sorption_points: &[f64]) -> Vec<f64> {
    let model = DryModel::from_parameters(params);
    highest_sorption_points
        .iter()
        .map(|hsp| model.rate_constant(*hsp))
        .collect()
}
