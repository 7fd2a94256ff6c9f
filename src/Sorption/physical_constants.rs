//! # Physical Constants
//!
//! Fixed physical constants of the sorption reactor and the unit conversions used by every
//! stage of the cycle reduction. The reactor is modelled as an isothermal, isobaric bed:
//!
//! | Symbol | Description | Value | Units |
//! |--------|-------------|-------|-------|
//! | `R_G` | Universal gas constant | 8.314 | J/(mol·K) |
//! | `P` | Reactor pressure | 101325 | Pa |
//! | `Tc` | Reactor temperature | 55 | °C |
//! | `T` | Reactor temperature | 328 | K |
//! | `M_CO2` | CO2 molar mass | 44.01 | g/mol |
//! | `M_H2O` | H2O molar mass | 18.01528 | g/mol |
//! | `RH` | Inlet relative humidity | 100 | % |
//!
//! Mass-flow controllers report standard cubic centimetres per minute; the bench calibration
//! is `1 SCCM = 7.45e-7 mol/s`.

/// Universal gas constant in J/(mol·K)
pub const R_G: f64 = 8.314;
/// Reactor pressure in Pa
pub const REACTOR_PRESSURE_PA: f64 = 101325.0;
/// Reactor temperature in °C
pub const REACTOR_TEMP_C: f64 = 55.0;
/// Reactor temperature in K (the bench uses the rounded 273 offset)
pub const REACTOR_TEMP_K: f64 = REACTOR_TEMP_C + 273.0;
/// CO2 molar mass in g/mol
pub const CO2_MOLAR_MASS: f64 = 44.01;
/// H2O molar mass in g/mol
pub const H2O_MOLAR_MASS: f64 = 18.01528;
/// Inlet relative humidity in %
pub const INLET_RELATIVE_HUMIDITY: f64 = 100.0;
/// mol/s carried by one SCCM at bench conditions
pub const SCCM_TO_MOL_PER_S: f64 = 7.45e-7;
/// inch to metre
pub const INCH_TO_M: f64 = 0.0254;
/// mL to m³
pub const ML_TO_M3: f64 = 1e-6;

/// Tetens equation coefficients: es[hPa] = A * exp(B * Tc / (Tc + C))
pub const TETENS_A_HPA: f64 = 6.112;
pub const TETENS_B: f64 = 17.67;
pub const TETENS_C: f64 = 243.5;

/// Converts a volumetric flow in SCCM into a molar flow in mol/s
pub fn sccm_to_mol_per_s(flow_sccm: f64) -> f64 {
    flow_sccm * SCCM_TO_MOL_PER_S
}

/// Converts a molar flow in mol/s back to SCCM
pub fn mol_per_s_to_sccm(flow_mol_s: f64) -> f64 {
    flow_mol_s / SCCM_TO_MOL_PER_S
}

/// Total molar concentration of an ideal gas at reactor conditions, mol/m³
pub fn total_molar_concentration() -> f64 {
    REACTOR_PRESSURE_PA / (R_G * REACTOR_TEMP_K)
}

/// Saturation vapour pressure of water (Pa) at `temp_c` from the Tetens formula
pub fn saturation_vapour_pressure_pa(temp_c: f64) -> f64 {
    TETENS_A_HPA * ((TETENS_B * temp_c) / (temp_c + TETENS_C)).exp() * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sccm_round_trip_scale() {
        assert_relative_eq!(sccm_to_mol_per_s(120.0), 8.94e-5, epsilon = 1e-12);
        assert_relative_eq!(mol_per_s_to_sccm(sccm_to_mol_per_s(37.5)), 37.5, epsilon = 1e-9);
    }

    #[test]
    fn test_total_concentration_at_reactor_conditions() {
        // P/(R*T) = 101325 / (8.314 * 328)
        assert_relative_eq!(total_molar_concentration(), 37.15632, epsilon = 1e-4);
    }

    #[test]
    fn test_tetens_at_55_c() {
        // about 158.5 hPa at 55 °C
        let es = saturation_vapour_pressure_pa(REACTOR_TEMP_C);
        assert_relative_eq!(es, 15854.41, max_relative = 1e-5);
    }
}
