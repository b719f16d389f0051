//! Design vector to validated mesh.

use sob_core::{CoreError, DesignVector, ProblemDefinition};
use tracing::debug;

use crate::backend::{BackendRegistry, MAX_H_LEVEL, MeshSpec};
use crate::builder::{MeshModelBuilder, Numbering};
use crate::error::{MeshError, MeshResult};
use crate::geometry::RawMesh;
use crate::model::{BoundingBox, MeshModel};

/// Slack on the envelope check, in mm.
const ENVELOPE_TOLERANCE: f64 = 1e-6;

/// Turns a problem plus design vector into a [`MeshModel`].
///
/// Polymorphic over the registered [`crate::MeshBackend`]s; callers never
/// branch on topology.
#[derive(Debug, Clone)]
pub struct MeshBuilder {
    registry: BackendRegistry,
    numbering: Numbering,
    h_level: u32,
    verbose: bool,
}

impl Default for MeshBuilder {
    fn default() -> Self {
        Self::new(BackendRegistry::with_defaults())
    }
}

impl MeshBuilder {
    pub fn new(registry: BackendRegistry) -> Self {
        Self {
            registry,
            numbering: Numbering::default(),
            h_level: 1,
            verbose: false,
        }
    }

    /// Clamped to `1..=MAX_H_LEVEL`.
    pub fn with_h_level(mut self, h_level: u32) -> Self {
        self.h_level = h_level.clamp(1, MAX_H_LEVEL);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_numbering(mut self, numbering: Numbering) -> Self {
        self.numbering = numbering;
        self
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Build the mesh for one evaluation.
    ///
    /// A wrong-length design vector is a `Core` error; values outside the
    /// search space, degenerate sections and bad elements are
    /// `InvalidGeometry`. Nothing is written to disk.
    pub fn build(
        &self,
        problem: &ProblemDefinition,
        design: &DesignVector,
    ) -> MeshResult<MeshModel> {
        problem.check_dimension(design)?;
        let params = problem.map_to_physical(design).map_err(|err| match err {
            CoreError::OutOfSearchSpace { .. } | CoreError::NonFinite { .. } => {
                MeshError::geometry(err.to_string())
            }
            other => MeshError::Core(other),
        })?;

        let backend = self.registry.get(problem.topology)?;
        let spec = MeshSpec {
            topology: problem.topology,
            params,
            h_level: self.h_level,
            verbose: self.verbose,
        };
        let geometry = backend.build_geometry(&spec)?;
        let raw = backend.build_mesh(&geometry)?;
        let mesh = self.freeze(raw)?;

        let envelope = geometry.envelope();
        check_envelope(&envelope, &mesh.bounding_box())?;

        debug!(
            backend = backend.name(),
            version = backend.version(),
            nodes = mesh.nodes().len(),
            shells = mesh.shells().len(),
            parts = mesh.parts().len(),
            volume = mesh.material_volume(),
            "mesh built"
        );
        Ok(mesh)
    }

    fn freeze(&self, raw: RawMesh) -> MeshResult<MeshModel> {
        let mut builder = MeshModelBuilder::new(self.numbering);
        let node_ids: Vec<u32> = raw.nodes.iter().map(|p| builder.add_node(*p)).collect();
        let part_ids: Vec<u32> = raw
            .parts
            .iter()
            .map(|p| builder.add_part(p.name.clone(), p.material_id, p.thickness))
            .collect();
        for quad in &raw.quads {
            let part = *part_ids
                .get(quad.part)
                .ok_or_else(|| MeshError::geometry("raw quad references unknown part"))?;
            let nodes = lookup4(&node_ids, quad.nodes)?;
            builder.add_shell(part, nodes);
        }
        for set in raw.node_sets {
            let nodes = set
                .nodes
                .iter()
                .map(|&i| {
                    node_ids
                        .get(i)
                        .copied()
                        .ok_or_else(|| MeshError::geometry("raw node set references unknown node"))
                })
                .collect::<MeshResult<Vec<u32>>>()?;
            builder.add_node_set(set.name, nodes);
        }
        builder.build()
    }
}

fn lookup4(ids: &[u32], idx: [usize; 4]) -> MeshResult<[u32; 4]> {
    let mut out = [0u32; 4];
    for (slot, i) in out.iter_mut().zip(idx) {
        *slot = *ids
            .get(i)
            .ok_or_else(|| MeshError::geometry("raw quad references unknown node"))?;
    }
    Ok(out)
}

fn check_envelope(envelope: &BoundingBox, actual: &BoundingBox) -> MeshResult<()> {
    if !envelope.contains_box(actual, ENVELOPE_TOLERANCE) {
        return Err(MeshError::geometry(format!(
            "mesh bounds {:?}..{:?} exceed the section envelope {:?}..{:?}",
            actual.min, actual.max, envelope.min, envelope.max
        )));
    }
    let extent = actual.extent();
    if extent.iter().filter(|e| **e > ENVELOPE_TOLERANCE).count() < 3 {
        return Err(MeshError::geometry("mesh is flat in at least one direction"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sob_core::Topology;

    fn problem(topology: Topology, dim: usize) -> ProblemDefinition {
        ProblemDefinition::new(topology, dim, vec!["intrusion".into()]).unwrap()
    }

    #[test]
    fn starbox_two_variables() {
        let mesh = MeshBuilder::default()
            .build(
                &problem(Topology::StarBox, 2),
                &DesignVector::new(vec![2.5, -1.0]),
            )
            .unwrap();
        let bb = mesh.bounding_box();
        // a = 60 + 7.5 * 6 = 105, b = 60 + 4 * 6 = 84; side walls bulge outwards
        assert!((bb.extent().y - 84.0).abs() < 1e-9);
        assert!(bb.extent().x > 105.0 && bb.extent().x < 110.0);
        assert!((bb.max.z - 120.0).abs() < 1e-9);
        assert!(mesh.node_set("base").is_some());
        assert_eq!(mesh.nodes()[0].id, 1001);
    }

    #[test]
    fn out_of_bounds_is_invalid_geometry() {
        let err = MeshBuilder::default()
            .build(
                &problem(Topology::StarBox, 2),
                &DesignVector::new(vec![2.5, -7.0]),
            )
            .unwrap_err();
        assert!(matches!(err, MeshError::InvalidGeometry { .. }));
    }

    #[test]
    fn wrong_length_is_core_error() {
        let err = MeshBuilder::default()
            .build(&problem(Topology::StarBox, 2), &DesignVector::new(vec![0.0]))
            .unwrap_err();
        assert!(matches!(
            err,
            MeshError::Core(CoreError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn refinement_multiplies_layers() {
        let p = problem(Topology::StarBox, 1);
        // 96 mm side, a whole number of elements at both levels
        let x = DesignVector::new(vec![1.0]);
        let coarse = MeshBuilder::default().build(&p, &x).unwrap();
        let fine = MeshBuilder::default().with_h_level(2).build(&p, &x).unwrap();
        assert_eq!(fine.shells().len(), 4 * coarse.shells().len());
    }

    #[test]
    fn excessive_h_level_is_clamped() {
        let p = problem(Topology::StarBox, 1);
        let x = DesignVector::new(vec![1.0]);
        let finest = MeshBuilder::default().with_h_level(MAX_H_LEVEL).build(&p, &x).unwrap();
        let huge = MeshBuilder::default().with_h_level(u32::MAX).build(&p, &x).unwrap();
        assert_eq!(huge.shells().len(), finest.shells().len());
    }
}
