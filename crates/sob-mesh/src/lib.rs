//! sob-mesh: parametric thin-walled meshes for the evaluation harness.
//!
//! Provides:
//! - `MeshBackend` capability and a registry with one procedural backend per topology
//! - Backend-agnostic extrusion geometry with triggers and thickness profiles
//! - Incremental mesh builder with structural and element-quality validation
//! - VTK export
//!
//! # Example
//!
//! ```
//! use sob_core::{DesignVector, ProblemDefinition, Topology};
//! use sob_mesh::MeshBuilder;
//!
//! let problem = ProblemDefinition::new(Topology::CrashTube, 3, vec!["intrusion".into()]).unwrap();
//! let mesh = MeshBuilder::default()
//!     .build(&problem, &DesignVector::new(vec![1.0, 0.0, 0.0]))
//!     .unwrap();
//!
//! assert!(mesh.node_set("base").is_some());
//! ```

pub mod backend;
pub mod backends;
pub mod builder;
pub mod error;
pub mod geometry;
pub mod mesh_builder;
pub mod model;
pub(crate) mod validate;
pub mod vtk;

pub use backend::{BackendRegistry, MAX_H_LEVEL, MeshBackend, MeshSpec};
pub use backends::{CrashTubeBackend, StarBoxBackend, ThreePointBendingBackend, sets};
pub use builder::{MeshModelBuilder, Numbering};
pub use error::{MeshError, MeshResult};
pub use geometry::{Geometry, NodeSetSpec, RawMesh, SectionSpec, ThicknessProfile, Trigger};
pub use mesh_builder::MeshBuilder;
pub use model::{BoundingBox, MeshModel, MeshNode, NodeSet, Part, Shell};
pub use vtk::{export_vtk, write_vtk};
