//! Errors raised while preparing a solver invocation.
//!
//! Failures of the solver itself are reported as a [`crate::SolverOutcome`].

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Invalid invocation: {what}")]
    InvalidInvocation { what: String },

    #[error("Working directory does not exist: {0}")]
    MissingWorkingDir(PathBuf),
}

pub type SolverResult<T> = Result<T, SolverError>;
