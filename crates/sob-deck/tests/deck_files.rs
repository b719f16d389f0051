use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use sob_core::{DesignVector, NumberingMode, ProblemDefinition, RunId, RunIdentity, Topology};
use sob_deck::{DeckError, DeckTemplate, InputDeckWriter};
use sob_mesh::{MeshBuilder, MeshModel};

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    dir.push(format!("{}_{}", prefix, nanos));
    dir
}

fn setup(topology: Topology, design: Vec<f64>) -> (ProblemDefinition, MeshModel, RunIdentity) {
    let problem = ProblemDefinition::new(topology, design.len(), vec!["intrusion".into()]).unwrap();
    let mesh = MeshBuilder::default()
        .build(&problem, &DesignVector::new(design))
        .unwrap();
    let dir = unique_temp_dir(&format!("sob_deck_{}", topology.slug()));
    fs::create_dir_all(&dir).unwrap();
    let run = RunIdentity::new(RunId::new(1), dir, NumberingMode::Explicit);
    (problem, mesh, run)
}

#[test]
fn starbox_deck_references_every_file() {
    let (problem, mesh, run) = setup(Topology::StarBox, vec![2.5, -1.0]);
    let set = InputDeckWriter::new().write(&mesh, &problem, &run).unwrap();

    assert_eq!(set.base, "combine");
    assert_eq!(set.starter, run.file("combine.k"));
    assert_eq!(set.engine, run.file("combine_0001.rad"));
    for f in set.files() {
        assert!(f.is_file(), "{} missing", f.display());
    }

    let starter = fs::read_to_string(&set.starter).unwrap();
    assert!(starter.contains("*INCLUDE\ncombine_mesh.k\n"));
    assert!(starter.contains("*INCLUDE_RADIOSS\ncombine_impactor.rad\n"));
    assert!(starter.contains("*CONTROL_UNITS\n"));
    assert_eq!(starter.matches("*PART\n").count(), mesh.parts().len());

    let mesh_deck = fs::read_to_string(&set.includes[0]).unwrap();
    let shell_lines = mesh_deck
        .lines()
        .skip_while(|l| *l != "*ELEMENT_SHELL")
        .skip(2)
        .take_while(|l| !l.starts_with('*'))
        .count();
    assert_eq!(shell_lines, mesh.shells().len());

    let walls = fs::read_to_string(&set.includes[1]).unwrap();
    assert!(walls.contains("/RWALL/PLANE/1\nIMPACTOR\n"));
    assert!(walls.contains("/RWALL/PLANE/2\nGROUND\n"));
    assert!(walls.contains("/TH/NODE/1\nDATABASE_HISTORY_NODE\n"));

    fs::remove_dir_all(run.dir()).ok();
}

#[test]
fn beam_deck_uses_cylinder_and_supports() {
    let (problem, mesh, run) = setup(Topology::ThreePointBending, vec![0.0; 5]);
    let set = InputDeckWriter::new().write(&mesh, &problem, &run).unwrap();

    assert_eq!(set.starter, run.file("ThreePointBending.k"));
    let starter = fs::read_to_string(&set.starter).unwrap();
    assert_eq!(starter.matches("*BOUNDARY_SPC_SET\n").count(), 2);
    // both aluminium laws share one hardening curve
    assert_eq!(starter.matches("*DEFINE_CURVE\n").count(), 1);

    let walls = fs::read_to_string(&set.includes[1]).unwrap();
    assert!(walls.contains("/RWALL/CYL/1\n"));
    assert!(!walls.contains("GROUND"));

    fs::remove_dir_all(run.dir()).ok();
}

#[test]
fn wrong_template_is_rejected_before_writing() {
    let (problem, mesh, run) = setup(Topology::StarBox, vec![0.0, 0.0]);
    let writer = InputDeckWriter::with_template(DeckTemplate::for_topology(Topology::CrashTube));
    let err = writer.write(&mesh, &problem, &run).unwrap_err();
    assert!(matches!(err, DeckError::TemplateMismatch { .. }));
    assert!(!run.file("combine.k").exists());

    fs::remove_dir_all(run.dir()).ok();
}

#[test]
fn impactor_node_collision_is_rejected() {
    let (problem, mesh, run) = setup(Topology::StarBox, vec![0.0, 0.0]);
    let mut template = DeckTemplate::for_topology(Topology::StarBox);
    template.impactor.node_id = mesh.nodes()[0].id;
    let err = InputDeckWriter::with_template(template)
        .write(&mesh, &problem, &run)
        .unwrap_err();
    assert!(err.to_string().contains("collides"));

    fs::remove_dir_all(run.dir()).ok();
}

#[test]
fn missing_node_set_is_rejected() {
    let (problem, mesh, run) = setup(Topology::CrashTube, vec![0.0; 3]);
    let mut template = DeckTemplate::for_topology(Topology::CrashTube);
    template.boundary[0].node_set = "clamp";
    let err = InputDeckWriter::with_template(template)
        .write(&mesh, &problem, &run)
        .unwrap_err();
    assert!(err.to_string().contains("clamp"));

    fs::remove_dir_all(run.dir()).ok();
}

#[test]
fn unused_template_material_is_rejected() {
    let (problem, mesh, run) = setup(Topology::CrashTube, vec![0.0; 3]);
    let mut template = DeckTemplate::for_topology(Topology::CrashTube);
    let mut extra = template.materials[0].clone();
    extra.id = 7;
    template.materials.push(extra);
    assert!(matches!(
        InputDeckWriter::with_template(template).write(&mesh, &problem, &run),
        Err(DeckError::TemplateMismatch { .. })
    ));

    fs::remove_dir_all(run.dir()).ok();
}
