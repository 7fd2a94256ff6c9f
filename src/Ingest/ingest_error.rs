use crate::Sorption::analysis_error::AnalysisError;
use thiserror::Error;

/// error types of the file parsers
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{0}")]
    InvalidSchema(String),
    #[error("{0}")]
    FileNotFound(String),
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),
    #[error("cannot parse timestamp '{0}'")]
    Timestamp(String),
    #[error("no completed-cycle counter values found in the merged data")]
    NoCycles,
    #[error(transparent)]
    Table(#[from] AnalysisError),
}
