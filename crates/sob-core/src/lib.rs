//! sob-core: shared foundation for the structural-optimization evaluation harness.
//!
//! Contains:
//! - problem (topologies, problem definitions, design vectors, search-space mapping)
//! - ids (run identities and numbering modes)
//! - units (uom SI types + solver unit systems)
//! - numeric (tolerances + float helpers)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod problem;
pub mod units;

pub use error::{CoreError, CoreResult};
pub use ids::*;
pub use numeric::*;
pub use problem::*;
pub use units::*;
