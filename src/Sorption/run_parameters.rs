//! # Run Parameters
//!
//! Physical configuration of a sorption run. The values arrive from the user as text; they are
//! parsed and checked here once per edit and then consumed by value by every pipeline stage.
//!
//! | Field | Units | Meaning |
//! |-------|-------|---------|
//! | `sorbent_mass` | g | mass of sorbent loaded in the bed |
//! | `reactor_diameter` | in | inner diameter of the reactor tube |
//! | `bulk_density` | g/mL | sorbent bulk density |
//! | `packing_factor` | - | packed fraction of the bed volume |
//! | `input_flow_rate` | SCCM | total inlet flow |
//! | `reactor_input_ratio` | % | CO2 mole fraction of the reactor feed |
//! | `qms_input_ratio` | % | CO2/reference ratio the mass spectrometer reads at the feed |
//! | `regression_start_threshold` | % of full scale | breakthrough level opening the regression window |
//! | `regression_end_threshold` | % of full scale | breakthrough level closing the sorption window |
use crate::Sorption::analysis_error::AnalysisError;
use crate::Sorption::physical_constants::{ML_TO_M3, sccm_to_mol_per_s};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

/// Column of the raw table that carries the sorbed species
pub const TARGET_COMPOUND: &str = "CO2";
/// Reference compound used when the configured one is absent from the run table
pub const DEFAULT_REFERENCE_COMPOUND: &str = "N2";

/// Numeric run parameter names, labelled as in the persisted run-parameter sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunParameterField {
    SorbentMass,
    ReactorDiameter,
    BulkDensity,
    PackingFactor,
    InputFlowRate,
    ReactorInputRatio,
    QmsInputRatio,
    RegressionStartThreshold,
    RegressionEndThreshold,
}

impl RunParameterField {
    pub const ALL: [RunParameterField; 9] = [
        RunParameterField::SorbentMass,
        RunParameterField::ReactorDiameter,
        RunParameterField::BulkDensity,
        RunParameterField::PackingFactor,
        RunParameterField::InputFlowRate,
        RunParameterField::ReactorInputRatio,
        RunParameterField::QmsInputRatio,
        RunParameterField::RegressionStartThreshold,
        RunParameterField::RegressionEndThreshold,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RunParameterField::SorbentMass => "Sorbent Mass (g)",
            RunParameterField::ReactorDiameter => "Reactor Diameter (in)",
            RunParameterField::BulkDensity => "Sorbent Bulk Density (g/mL)",
            RunParameterField::PackingFactor => "Packing Factor",
            RunParameterField::InputFlowRate => "Input Flow Rate (SCCM)",
            RunParameterField::ReactorInputRatio => "Reactor Input Ratio (%)",
            RunParameterField::QmsInputRatio => "QMS Input Ratio (%)",
            RunParameterField::RegressionStartThreshold => "Regression Start Threshold (%)",
            RunParameterField::RegressionEndThreshold => "Regression End Threshold (%)",
        }
    }

    /// Looks a field up by its sheet label
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.label() == label.trim())
    }
}

impl fmt::Display for RunParameterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Validated physical configuration of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunParameters {
    pub sorbent_mass: f64,
    pub reactor_diameter: f64,
    pub bulk_density: f64,
    pub packing_factor: f64,
    pub input_flow_rate: f64,
    pub reactor_input_ratio: f64,
    pub qms_input_ratio: f64,
    pub regression_start_threshold: f64,
    pub regression_end_threshold: f64,
    /// reference compound the CO2 signal is normalised against
    pub reference_gas: String,
}

impl Default for RunParameters {
    fn default() -> Self {
        Self {
            sorbent_mass: 10.0,
            reactor_diameter: 1.0,
            bulk_density: 0.8,
            packing_factor: 1.0,
            input_flow_rate: 120.0,
            reactor_input_ratio: 10.0 / 120.0 * 100.0,
            qms_input_ratio: 14.5,
            regression_start_threshold: 10.0,
            regression_end_threshold: 50.0,
            reference_gas: DEFAULT_REFERENCE_COMPOUND.to_string(),
        }
    }
}

impl RunParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// loads parameters from a JSON file written with `save_json`
    pub fn from_json_file(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
        serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse run parameters '{}': {}", path.display(), e))
    }

    pub fn save_json(&self, path: &Path) -> Result<(), String> {
        let content = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;
        fs::write(path, content).map_err(|e| format!("Failed to write '{}': {}", path.display(), e))
    }

    pub fn get(&self, field: RunParameterField) -> f64 {
        match field {
            RunParameterField::SorbentMass => self.sorbent_mass,
            RunParameterField::ReactorDiameter => self.reactor_diameter,
            RunParameterField::BulkDensity => self.bulk_density,
            RunParameterField::PackingFactor => self.packing_factor,
            RunParameterField::InputFlowRate => self.input_flow_rate,
            RunParameterField::ReactorInputRatio => self.reactor_input_ratio,
            RunParameterField::QmsInputRatio => self.qms_input_ratio,
            RunParameterField::RegressionStartThreshold => self.regression_start_threshold,
            RunParameterField::RegressionEndThreshold => self.regression_end_threshold,
        }
    }

    fn slot(&mut self, field: RunParameterField) -> &mut f64 {
        match field {
            RunParameterField::SorbentMass => &mut self.sorbent_mass,
            RunParameterField::ReactorDiameter => &mut self.reactor_diameter,
            RunParameterField::BulkDensity => &mut self.bulk_density,
            RunParameterField::PackingFactor => &mut self.packing_factor,
            RunParameterField::InputFlowRate => &mut self.input_flow_rate,
            RunParameterField::ReactorInputRatio => &mut self.reactor_input_ratio,
            RunParameterField::QmsInputRatio => &mut self.qms_input_ratio,
            RunParameterField::RegressionStartThreshold => &mut self.regression_start_threshold,
            RunParameterField::RegressionEndThreshold => &mut self.regression_end_threshold,
        }
    }

    /// Parses `text` as a finite decimal and stores it. On failure nothing changes.
    pub fn set_field(&mut self, field: RunParameterField, text: &str) -> Result<(), AnalysisError> {
        let value = parse_decimal(field, text)?;
        *self.slot(field) = value;
        Ok(())
    }

    /// Builds a parameter set from label -> text pairs, falling back to defaults for
    /// labels that are not present. The first unparsable value aborts the whole set.
    pub fn from_text_map(
        values: &HashMap<String, String>,
        reference_gas: Option<&str>,
    ) -> Result<Self, AnalysisError> {
        let mut params = Self::default();
        for field in RunParameterField::ALL {
            if let Some(text) = values.get(field.label()) {
                params.set_field(field, text)?;
            }
        }
        if let Some(gas) = reference_gas {
            params.reference_gas = gas.trim().to_string();
        }
        Ok(params)
    }

    /// Sorbent volume in mL
    pub fn sorbent_volume_ml(&self) -> f64 {
        self.sorbent_mass / self.bulk_density
    }

    pub fn sorbent_volume_m3(&self) -> f64 {
        self.sorbent_volume_ml() * ML_TO_M3
    }

    /// Total inlet molar flow, mol/s
    pub fn inlet_molar_flow(&self) -> f64 {
        sccm_to_mol_per_s(self.input_flow_rate)
    }

    /// CO2 molar flow entering the bed, mol/s
    pub fn inlet_co2_molar_flow(&self) -> f64 {
        self.reactor_input_ratio / 100.0 * self.inlet_molar_flow()
    }

    /// yCO2 [%] level that opens the regression window
    pub fn start_threshold_mole_fraction(&self) -> f64 {
        self.reactor_input_ratio * self.regression_start_threshold / 100.0
    }

    /// yCO2 [%] level that closes the sorption window
    pub fn end_threshold_mole_fraction(&self) -> f64 {
        self.reactor_input_ratio * self.regression_end_threshold / 100.0
    }
}

fn parse_decimal(field: RunParameterField, text: &str) -> Result<f64, AnalysisError> {
    match text.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(AnalysisError::InvalidParameter {
            field,
            value: text.to_string(),
        }),
    }
}

/// Empirical constants of the capacity and wet-kinetics reductions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConstants {
    /// target volumetric capacity the KPI percentage is measured against, g/mL
    pub kpi_volumetric_capacity: f64,
    /// fixed intercept subtracted from ln(concentration) before the wet fit
    pub wet_log_intercept: f64,
}

impl Default for CalibrationConstants {
    fn default() -> Self {
        Self {
            kpi_volumetric_capacity: 0.0283,
            wet_log_intercept: 1.3125,
        }
    }
}
