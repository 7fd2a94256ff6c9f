use crate::Sorption::run_parameters::RunParameterField;
use thiserror::Error;

/// error types of the cycle reduction pipeline
///
/// Degenerate numeric cases (empty windows, ln of non-positive concentrations, too few
/// regression points) are not errors: they show up as NaN in the cycle table.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("invalid value '{value}' for run parameter '{field}'")]
    InvalidParameter {
        field: RunParameterField,
        value: String,
    },
    #[error("column '{0}' not found in run table")]
    MissingColumn(String),
    #[error("column '{column}' has {found} values, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("no run data loaded")]
    NoData,
    #[error("cycle {0} does not exist")]
    UnknownCycle(usize),
}
