//! FILENAME: reporting/src/error.rs

use engine::EngineError;
use thiserror::Error;

pub type ReportResult<T> = std::result::Result<T, ReportError>;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("No report registered as '{0}'")]
    NoSuchReport(String),

    #[error("No report group named '{0}'")]
    NoSuchGroup(String),

    #[error("A report is already registered as '{0}'")]
    DuplicateReport(String),

    #[error("Invalid settings: {0}")]
    Settings(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReportError {
    /// HTTP status a host should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            ReportError::Engine(EngineError::IncorrectLookupParameters(_)) => 400,
            ReportError::NoSuchReport(_) | ReportError::NoSuchGroup(_) => 404,
            _ => 500,
        }
    }
}
