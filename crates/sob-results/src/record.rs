//! Persisted evaluation record.

use serde::{Deserialize, Serialize};
use sob_core::{NumberingMode, RunId, Topology};

/// Contents of `evaluation.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub evaluation_id: String,
    pub run_id: RunId,
    pub numbering: NumberingMode,
    pub topology: Topology,
    pub dimension: usize,
    pub design: Vec<f64>,
    pub design_fingerprint: String,
    pub timestamp: String,
    pub metrics: Vec<String>,
    /// Empty when the solver did not complete.
    pub objectives: Vec<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<f64>,
    pub solver_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solver_message: Option<String>,
    pub elapsed_s: f64,
}
