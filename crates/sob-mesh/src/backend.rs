//! Mesh backend capability and registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use sob_core::Topology;

use crate::backends::{CrashTubeBackend, StarBoxBackend, ThreePointBendingBackend};
use crate::error::{MeshError, MeshResult};
use crate::geometry::{Geometry, RawMesh};

/// Finest supported refinement level (8 subdivisions per base element edge).
pub const MAX_H_LEVEL: u32 = 4;

/// Physical parameters handed to a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshSpec {
    pub topology: Topology,
    /// Design variables already mapped to physical units.
    pub params: Vec<f64>,
    /// Refinement level; element size halves per level above 1.
    pub h_level: u32,
    pub verbose: bool,
}

impl MeshSpec {
    /// `2^(h_level - 1)`, with `h_level` clamped to `1..=MAX_H_LEVEL`.
    pub fn refinement(&self) -> usize {
        1usize << (self.h_level.clamp(1, MAX_H_LEVEL) - 1)
    }
}

/// A mesh generator for one topology.
///
/// `generate` must be deterministic for a given spec and `version()`.
pub trait MeshBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn version(&self) -> u32;

    fn topology(&self) -> Topology;

    fn build_geometry(&self, spec: &MeshSpec) -> MeshResult<Geometry>;

    fn build_mesh(&self, geometry: &Geometry) -> MeshResult<RawMesh> {
        geometry.extrude()
    }

    fn generate(&self, spec: &MeshSpec) -> MeshResult<RawMesh> {
        let geometry = self.build_geometry(spec)?;
        self.build_mesh(&geometry)
    }
}

/// Topology -> backend lookup.
#[derive(Clone)]
pub struct BackendRegistry {
    backends: BTreeMap<Topology, Arc<dyn MeshBackend>>,
}

impl BackendRegistry {
    pub fn empty() -> Self {
        Self {
            backends: BTreeMap::new(),
        }
    }

    /// Registry holding the three procedural backends.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(StarBoxBackend));
        registry.register(Arc::new(ThreePointBendingBackend));
        registry.register(Arc::new(CrashTubeBackend));
        registry
    }

    /// Register a backend, returning the one it replaces.
    pub fn register(&mut self, backend: Arc<dyn MeshBackend>) -> Option<Arc<dyn MeshBackend>> {
        self.backends.insert(backend.topology(), backend)
    }

    pub fn get(&self, topology: Topology) -> MeshResult<&dyn MeshBackend> {
        self.backends
            .get(&topology)
            .map(|b| b.as_ref())
            .ok_or(MeshError::UnsupportedTopology(topology))
    }

    pub fn topologies(&self) -> impl Iterator<Item = Topology> + '_ {
        self.backends.keys().copied()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.backends.iter().map(|(t, b)| (t, b.name())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_topology() {
        let registry = BackendRegistry::with_defaults();
        for t in Topology::ALL {
            assert_eq!(registry.get(t).unwrap().topology(), t);
        }
    }

    #[test]
    fn empty_registry_reports_unsupported() {
        let registry = BackendRegistry::empty();
        assert!(matches!(
            registry.get(Topology::CrashTube),
            Err(MeshError::UnsupportedTopology(Topology::CrashTube))
        ));
    }

    #[test]
    fn refinement_doubles_per_level() {
        let spec = |h| MeshSpec {
            topology: Topology::StarBox,
            params: vec![],
            h_level: h,
            verbose: false,
        };
        assert_eq!(spec(1).refinement(), 1);
        assert_eq!(spec(3).refinement(), 4);
        assert_eq!(spec(0).refinement(), 1);
        assert_eq!(spec(40).refinement(), 1 << (MAX_H_LEVEL - 1));
    }
}
