use proptest::prelude::*;
use sob_core::{DesignVector, ProblemDefinition, Topology};
use sob_mesh::{MeshBuilder, MeshError, MeshModel};

fn connectivity(mesh: &MeshModel) -> Vec<[u32; 4]> {
    mesh.shells().iter().map(|s| s.nodes).collect()
}

fn build(topology: Topology, x: Vec<f64>) -> Result<MeshModel, MeshError> {
    let problem = ProblemDefinition::new(topology, x.len(), vec!["intrusion".into()]).unwrap();
    MeshBuilder::default().build(&problem, &DesignVector::new(x))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn star_box_is_deterministic(x in prop::collection::vec(-5.0_f64..=5.0, 3)) {
        let a = build(Topology::StarBox, x.clone()).unwrap();
        let b = build(Topology::StarBox, x).unwrap();
        prop_assert_eq!(a.nodes().len(), b.nodes().len());
        prop_assert_eq!(connectivity(&a), connectivity(&b));
        prop_assert_eq!(a.nodes(), b.nodes());
    }

    #[test]
    fn crash_tube_is_deterministic(x in prop::collection::vec(-5.0_f64..=5.0, 6)) {
        let a = build(Topology::CrashTube, x.clone()).unwrap();
        let b = build(Topology::CrashTube, x).unwrap();
        prop_assert_eq!(connectivity(&a), connectivity(&b));
    }

    #[test]
    fn beam_thickness_stays_in_range(x in prop::collection::vec(-5.0_f64..=5.0, 7)) {
        let mesh = build(Topology::ThreePointBending, x).unwrap();
        prop_assert!(mesh.parts().iter().all(|p| p.thickness >= 0.5 - 1e-9 && p.thickness <= 3.0 + 1e-9));
    }

    #[test]
    fn outside_search_space_is_invalid_geometry(v in 5.01_f64..50.0, neg in any::<bool>()) {
        let v = if neg { -v } else { v };
        let err = build(Topology::CrashTube, vec![0.0, v]).unwrap_err();
        let is_invalid = matches!(err, MeshError::InvalidGeometry { .. });
        prop_assert!(is_invalid);
    }
}

#[test]
fn every_topology_meshes_at_the_centre_of_the_box() {
    for (topology, dim) in [
        (Topology::StarBox, 1),
        (Topology::StarBox, 5),
        (Topology::StarBox, 12),
        (Topology::ThreePointBending, 5),
        (Topology::ThreePointBending, 23),
        (Topology::CrashTube, 15),
        (Topology::CrashTube, 30),
    ] {
        let mesh = build(topology, vec![0.0; dim]).unwrap();
        assert!(!mesh.shells().is_empty(), "{topology} dim {dim}");
    }
}

#[test]
fn star_corner_of_box_is_rejected() {
    // a = 60, u = 30 pinches the star at its centre
    let err = build(Topology::StarBox, vec![-5.0, 0.0, 5.0, 0.0]).unwrap_err();
    assert!(matches!(err, MeshError::InvalidGeometry { .. }));
}
