//! sob-app: application services for the evaluation harness.
//!
//! Provides:
//! - `RunnerOptions` loaded from YAML or JSON and validated once
//! - `ProblemCatalog`, the fixed registry of topologies, dimensions and metrics
//! - `EvaluationFunction`, composing mesh, deck, solver, extraction and reduction
//! - Progress events for long-running evaluations
//!
//! # Example
//!
//! ```
//! use sob_app::ProblemCatalog;
//!
//! let catalog = ProblemCatalog::new();
//! let problem = catalog.problem(1, 2, &[]).unwrap();
//!
//! assert_eq!(problem.metrics, vec!["penalized_sea".to_string()]);
//! assert!(catalog.problem(1, 36, &[]).is_err());
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod progress;

pub use catalog::{ProblemCatalog, ProblemEntry};
pub use config::{ExecutableOverrides, RunnerOptions};
pub use error::{AppError, AppResult};
pub use evaluate::{EvaluationFunction, EvaluationResult};
pub use progress::{EvaluationProgress, EvaluationStage};
