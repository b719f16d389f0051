//! Error types for the sob-app service layer.

use std::path::PathBuf;

/// Everything an evaluation can fail with before a solver outcome exists.
///
/// Solver failures are not errors here; they come back inside
/// [`crate::EvaluationResult`].
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Unsupported problem: topology {topology} with dimension {dimension}")]
    UnsupportedProblem { topology: u32, dimension: usize },

    #[error("Metric {metric} is not available for {topology}")]
    ForbiddenMetric { topology: String, metric: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to read configuration file: {path}")]
    ConfigFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Core(#[from] sob_core::CoreError),

    #[error(transparent)]
    Mesh(#[from] sob_mesh::MeshError),

    #[error(transparent)]
    Deck(#[from] sob_deck::DeckError),

    #[error(transparent)]
    Solver(#[from] sob_solver::SolverError),

    #[error(transparent)]
    Results(#[from] sob_results::ResultsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for sob-app operations.
pub type AppResult<T> = Result<T, AppError>;
