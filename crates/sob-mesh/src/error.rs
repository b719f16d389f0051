//! Mesh construction and validation errors.

use sob_core::{CoreError, Topology};
use thiserror::Error;

pub type MeshResult<T> = Result<T, MeshError>;

#[derive(Error, Debug)]
pub enum MeshError {
    /// Degenerate, self-intersecting or out-of-bounds geometry.
    #[error("Invalid geometry: {reason}")]
    InvalidGeometry { reason: String },

    #[error("No mesh backend registered for topology {0}")]
    UnsupportedTopology(Topology),

    #[error("Duplicate {what} id {id}")]
    DuplicateId { what: &'static str, id: u32 },

    #[error("Shell {shell} references unknown node {node}")]
    UnknownNode { shell: u32, node: u32 },

    #[error("Shell {shell} references unknown part {part}")]
    UnknownPart { shell: u32, part: u32 },

    #[error("Node {node} is not used by any shell")]
    DanglingNode { node: u32 },

    #[error("Mesh export failed: {0}")]
    Export(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl MeshError {
    pub(crate) fn geometry(reason: impl Into<String>) -> Self {
        MeshError::InvalidGeometry {
            reason: reason.into(),
        }
    }
}
