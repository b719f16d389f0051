//! Per-topology deck templates: materials, loading, boundary conditions and output requests.

use std::collections::BTreeSet;

use nalgebra::Point3;
use sob_core::{ProblemDefinition, Topology, UnitSystem};
use sob_mesh::{BoundingBox, MeshModel, sets};

use crate::error::{DeckError, DeckResult};

/// Global axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
        }
    }
}

/// Elastic-plastic material with a hardening curve and Cowper-Symonds rate terms.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialLaw {
    pub id: u32,
    pub name: &'static str,
    pub density: f64,
    pub young: f64,
    pub poisson: f64,
    pub yield_stress: f64,
    /// `0.0` disables strain-rate scaling.
    pub cowper_c: f64,
    pub cowper_p: f64,
    pub curve_id: u32,
    /// (effective plastic strain, stress)
    pub hardening: Vec<(f64, f64)>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ImpactorShape {
    Plane,
    Cylinder { diameter: f64 },
}

/// Moving rigid wall loading the structure.
///
/// The wall is driven by a solver node that does not belong to the mesh;
/// its displacement history is the intrusion signal.
#[derive(Clone, Debug, PartialEq)]
pub struct Impactor {
    pub wall_id: u32,
    pub name: &'static str,
    pub node_id: u32,
    pub shape: ImpactorShape,
    /// The wall travels towards `-axis`.
    pub axis: Axis,
    /// Initial gap between wall and structure.
    pub offset: f64,
    pub mass: f64,
    /// Initial speed along `-axis`.
    pub speed: f64,
    pub search_distance: f64,
    pub friction: f64,
    /// Plane walls only.
    pub diameter: f64,
}

impl Impactor {
    /// Wall node position above `bbox`, centred on the other two axes.
    pub fn position(&self, bbox: &BoundingBox) -> Point3<f64> {
        let mut p = nalgebra::center(&bbox.min, &bbox.max);
        let a = self.axis.index();
        let standoff = match self.shape {
            ImpactorShape::Plane => self.offset,
            ImpactorShape::Cylinder { diameter } => 0.5 * diameter + self.offset,
        };
        p[a] = bbox.max[a] + standoff;
        p
    }
}

/// Fixed plane under the structure, reacting on a named node set.
#[derive(Clone, Debug, PartialEq)]
pub struct Ground {
    pub wall_id: u32,
    pub name: &'static str,
    pub node_set: &'static str,
}

/// Constrained degrees of freedom on a named node set.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundaryCondition {
    pub node_set: &'static str,
    /// Translations x y z, then rotations x y z.
    pub fixed: [bool; 6],
}

impl BoundaryCondition {
    pub fn clamp(node_set: &'static str) -> Self {
        Self {
            node_set,
            fixed: [true; 6],
        }
    }
}

/// Shell element formulation shared by every part.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShellFormulation {
    pub elform: u32,
    pub integration_points: u32,
    pub shear_factor: f64,
}

/// Termination time and output frequencies.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputRequest {
    pub end_time: f64,
    pub th_dt: f64,
    pub anim_dt: f64,
    /// Time-history group holding the impactor node.
    pub track_group: &'static str,
    /// Time-history group holding the impactor wall.
    pub force_group: &'static str,
}

/// How the wall force appears in the time history.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForceChannel {
    Force,
    /// Cumulative impulse; force is its time derivative.
    Impulse,
}

/// A time-history column selector: the `occurrence`-th header containing
/// `key` once spaces are removed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnKey {
    pub key: String,
    pub occurrence: usize,
}

/// Everything a deck needs beyond the mesh.
#[derive(Clone, Debug, PartialEq)]
pub struct DeckTemplate {
    pub topology: Topology,
    pub title: &'static str,
    pub units: UnitSystem,
    pub materials: Vec<MaterialLaw>,
    pub shell: ShellFormulation,
    pub impactor: Impactor,
    pub ground: Option<Ground>,
    pub boundary: Vec<BoundaryCondition>,
    pub output: OutputRequest,
    pub force_channel: ForceChannel,
}

fn crash_steel() -> MaterialLaw {
    MaterialLaw {
        id: 999,
        name: "steel",
        density: 7.83e-6,
        young: 200.0,
        poisson: 0.3,
        yield_stress: 0.366,
        cowper_c: 40.0,
        cowper_p: 5.0,
        curve_id: 1,
        hardening: vec![
            (0.0, 0.366),
            (0.025, 0.424),
            (0.049, 0.476),
            (0.072, 0.507),
            (0.095, 0.529),
            (0.118, 0.546),
            (0.140, 0.559),
            (0.182, 0.584),
        ],
    }
}

fn aluminium(id: u32, name: &'static str) -> MaterialLaw {
    MaterialLaw {
        id,
        name,
        density: 2.7e-9,
        young: 70000.0,
        poisson: 0.33,
        yield_stress: 180.0,
        cowper_c: 0.0,
        cowper_p: 1.0,
        curve_id: 1,
        hardening: vec![
            (0.0, 180.0),
            (0.01, 190.0),
            (0.02, 197.0),
            (0.05, 211.5),
            (0.1, 225.8),
            (0.15, 233.6),
            (0.2, 238.5),
            (0.4, 248.5),
        ],
    }
}

fn axial_crush(topology: Topology, mass: f64, speed: f64, end_time: f64) -> DeckTemplate {
    DeckTemplate {
        topology,
        title: match topology {
            Topology::CrashTube => "crash tube axial impact",
            _ => "star box axial impact",
        },
        units: UnitSystem::KgMmMs,
        materials: vec![crash_steel()],
        shell: ShellFormulation {
            elform: 2,
            integration_points: 3,
            shear_factor: 0.833,
        },
        impactor: Impactor {
            wall_id: 1,
            name: "IMPACTOR",
            node_id: 999_999,
            shape: ImpactorShape::Plane,
            axis: Axis::Z,
            offset: 1.0,
            mass,
            speed,
            search_distance: 200.0,
            friction: 1.0,
            diameter: 150.0,
        },
        ground: Some(Ground {
            wall_id: 2,
            name: "GROUND",
            node_set: sets::BASE,
        }),
        boundary: vec![BoundaryCondition::clamp(sets::BASE)],
        output: OutputRequest {
            end_time,
            th_dt: 0.05,
            anim_dt: 0.5,
            track_group: "DATABASE_HISTORY_NODE",
            force_group: "TH-RWALL",
        },
        force_channel: ForceChannel::Impulse,
    }
}

fn three_point_bending() -> DeckTemplate {
    // x and z rotations stay free at the supports
    let support = |node_set| BoundaryCondition {
        node_set,
        fixed: [true, true, true, true, false, true],
    };
    DeckTemplate {
        topology: Topology::ThreePointBending,
        title: "three point bending",
        units: UnitSystem::TonneMmS,
        materials: vec![aluminium(1, "aluminium"), aluminium(2, "layer_aluminium")],
        shell: ShellFormulation {
            elform: 24,
            integration_points: 5,
            shear_factor: 0.833,
        },
        impactor: Impactor {
            wall_id: 1,
            name: "IMPACTOR",
            node_id: 99_999,
            shape: ImpactorShape::Cylinder { diameter: 70.0 },
            axis: Axis::Y,
            offset: 2.5,
            mass: 0.086,
            speed: 10_000.0,
            search_distance: 140.0,
            friction: 0.0,
            diameter: 70.0,
        },
        ground: None,
        boundary: vec![support(sets::SUPPORT_START), support(sets::SUPPORT_END)],
        output: OutputRequest {
            end_time: 0.015,
            th_dt: 5e-5,
            anim_dt: 0.001,
            track_group: "intrusionTrack",
            force_group: "TH_RWALL",
        },
        force_channel: ForceChannel::Force,
    }
}

impl DeckTemplate {
    pub fn for_topology(topology: Topology) -> Self {
        match topology {
            Topology::StarBox => axial_crush(topology, 250.0, 7.0, 45.0),
            Topology::CrashTube => axial_crush(topology, 300.0, 8.33, 50.0),
            Topology::ThreePointBending => three_point_bending(),
        }
    }

    /// Basename shared by every file of the deck and the solver listings.
    pub fn deck_base(&self) -> &'static str {
        self.topology.deck_base()
    }

    /// Rigid impactor mass included in the starter's total mass.
    pub fn rigid_mass(&self) -> f64 {
        self.impactor.mass
    }

    pub fn material_ids(&self) -> BTreeSet<u32> {
        self.materials.iter().map(|m| m.id).collect()
    }

    /// Node sets the mesh must provide.
    pub fn required_node_sets(&self) -> BTreeSet<&'static str> {
        self.boundary
            .iter()
            .map(|b| b.node_set)
            .chain(self.ground.iter().map(|g| g.node_set))
            .collect()
    }

    /// Impactor displacement along the travel axis.
    pub fn track_column(&self) -> ColumnKey {
        ColumnKey {
            key: format!("{}{}", self.output.track_group, self.impactor.node_id),
            occurrence: self.impactor.axis.index() + 1,
        }
    }

    /// Normal wall force (or impulse) along the travel axis.
    pub fn force_column(&self) -> ColumnKey {
        ColumnKey {
            key: format!("{}{}", self.output.force_group, self.impactor.wall_id),
            occurrence: self.impactor.axis.index() + 1,
        }
    }

    /// Reject a mesh or problem this template cannot be written against.
    pub fn check(&self, mesh: &MeshModel, problem: &ProblemDefinition) -> DeckResult<()> {
        if problem.topology != self.topology {
            return Err(DeckError::mismatch(format!(
                "template is for {} but the problem is {}",
                self.topology, problem.topology
            )));
        }

        let mesh_materials = mesh.material_ids();
        let defined = self.material_ids();
        if let Some(id) = mesh_materials.difference(&defined).next() {
            return Err(DeckError::mismatch(format!(
                "mesh uses material {id} which the template does not define"
            )));
        }
        if let Some(id) = defined.difference(&mesh_materials).next() {
            return Err(DeckError::mismatch(format!(
                "template material {id} is not used by any part"
            )));
        }

        for name in self.required_node_sets() {
            if mesh.node_set(name).is_none() {
                return Err(DeckError::mismatch(format!("mesh has no node set '{name}'")));
            }
        }

        if mesh.node(self.impactor.node_id).is_some() {
            return Err(DeckError::mismatch(format!(
                "impactor node {} collides with a mesh node",
                self.impactor.node_id
            )));
        }
        if let Some(part) = mesh.part(self.impactor.node_id) {
            return Err(DeckError::mismatch(format!(
                "part {} reuses the impactor id {}",
                part.name, self.impactor.node_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    #[test]
    fn beam_impactor_sits_above_midspan() {
        let t = DeckTemplate::for_topology(Topology::ThreePointBending);
        let bbox = BoundingBox {
            min: Point3::new(-60.0, -40.0, 0.0),
            max: Point3::new(60.0, 40.0, 800.0),
        };
        let p = t.impactor.position(&bbox);
        assert!((p.y - 77.5).abs() < 1e-12);
        assert!((p.z - 400.0).abs() < 1e-12);
        assert_eq!(t.units, UnitSystem::TonneMmS);
    }

    #[test]
    fn crush_wall_starts_one_mm_above_top() {
        let t = DeckTemplate::for_topology(Topology::StarBox);
        let bbox = BoundingBox {
            min: Point3::new(-50.0, -40.0, 0.0),
            max: Point3::new(50.0, 40.0, 120.0),
        };
        assert!((t.impactor.position(&bbox).z - 121.0).abs() < 1e-12);
        assert_eq!(t.rigid_mass(), 250.0);
    }

    #[test]
    fn column_keys_follow_group_titles() {
        let star = DeckTemplate::for_topology(Topology::StarBox);
        assert_eq!(
            star.track_column(),
            ColumnKey {
                key: "DATABASE_HISTORY_NODE999999".into(),
                occurrence: 3
            }
        );
        assert_eq!(star.force_column().key, "TH-RWALL1");

        let beam = DeckTemplate::for_topology(Topology::ThreePointBending);
        assert_eq!(beam.track_column().key, "intrusionTrack99999");
        assert_eq!(beam.track_column().occurrence, 2);
        assert_eq!(beam.force_column().key, "TH_RWALL1");
    }

    #[test]
    fn crash_tube_loads_harder_and_longer() {
        let tube = DeckTemplate::for_topology(Topology::CrashTube);
        assert_eq!(tube.impactor.mass, 300.0);
        assert_eq!(tube.impactor.speed, 8.33);
        assert_eq!(tube.output.end_time, 50.0);
        assert_eq!(tube.force_channel, ForceChannel::Impulse);
    }
}
