use std::path::PathBuf;

use thiserror::Error;

pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(Error, Debug)]
pub enum ResultsError {
    #[error("Converter {converter} failed: {reason}")]
    ConversionFailed {
        converter: &'static str,
        reason: String,
    },

    #[error("Signal not found: {name}")]
    MissingSignal { name: String },

    #[error("Signal has no samples: {name}")]
    EmptySignal { name: String },

    #[error("Unknown metric: {name}")]
    UnknownMetric { name: String },

    #[error("Metric {metric} is undefined: {reason}")]
    UndefinedMetric { metric: String, reason: String },

    #[error("Solver did not complete: {status}")]
    SolverDidNotComplete { status: String },

    #[error("Table parse error at line {line}: {message}")]
    Table { line: usize, message: String },

    #[error("Could not allocate a run directory after {attempts} attempts")]
    DirectoryAllocationConflict { attempts: usize },

    #[error("Run not found: {}", dir.display())]
    RunNotFound { dir: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
