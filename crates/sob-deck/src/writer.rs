//! Mesh plus template to a starter/engine deck pair on disk.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use nalgebra::Point3;
use sob_core::{ProblemDefinition, RunIdentity, UnitSystem};
use sob_mesh::MeshModel;
use tracing::{debug, info};

use crate::cards::{CardBuffer, field, real};
use crate::error::{DeckError, DeckResult};
use crate::template::{DeckTemplate, Ground, Impactor, ImpactorShape};

/// Keyword decks use 10-column fields, Radioss blocks 20-column reals.
const KW: usize = 10;
const RAD: usize = 20;

/// Paths of one written deck, all inside the run directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckSet {
    /// Shared basename of deck files and solver listings.
    pub base: String,
    /// Starter input, `<base>.k`.
    pub starter: PathBuf,
    /// Engine input, `<base>_0001.rad`.
    pub engine: PathBuf,
    /// Files pulled in by the starter deck.
    pub includes: Vec<PathBuf>,
}

impl DeckSet {
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.starter.as_path())
            .chain(self.includes.iter().map(PathBuf::as_path))
            .chain(std::iter::once(self.engine.as_path()))
    }
}

/// Writes a [`DeckSet`] for a mesh.
///
/// Without an explicit template, the one for the problem's topology is used.
#[derive(Debug, Clone, Default)]
pub struct InputDeckWriter {
    template: Option<DeckTemplate>,
}

impl InputDeckWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(template: DeckTemplate) -> Self {
        Self {
            template: Some(template),
        }
    }

    /// Template this writer would use for `problem`.
    pub fn template_for(&self, problem: &ProblemDefinition) -> DeckTemplate {
        self.template
            .clone()
            .unwrap_or_else(|| DeckTemplate::for_topology(problem.topology))
    }

    /// Write all deck files into `run.dir()`, which must already exist.
    pub fn write(
        &self,
        mesh: &MeshModel,
        problem: &ProblemDefinition,
        run: &RunIdentity,
    ) -> DeckResult<DeckSet> {
        let template = self.template_for(problem);
        template.check(mesh, problem)?;

        let base = template.deck_base();
        let mesh_file = format!("{base}_mesh.k");
        let impactor_file = format!("{base}_impactor.rad");
        let set = DeckSet {
            base: base.to_string(),
            starter: run.file(format!("{base}.k")),
            engine: run.file(format!("{base}_0001.rad")),
            includes: vec![run.file(&mesh_file), run.file(&impactor_file)],
        };

        let wall = template.impactor.position(&mesh.bounding_box());
        put(&set.includes[0], mesh_deck(mesh))?;
        put(&set.includes[1], impactor_deck(&template, mesh, wall))?;
        put(
            &set.starter,
            starter_deck(&template, mesh, wall, &mesh_file, &impactor_file),
        )?;
        put(&set.engine, engine_deck(&template))?;

        debug!(
            nodes = mesh.nodes().len(),
            shells = mesh.shells().len(),
            wall = ?wall,
            "deck cards written"
        );
        info!(run_id = %run.run_id, base, dir = %run.dir().display(), "deck written");
        Ok(set)
    }
}

fn put(path: &Path, text: String) -> DeckResult<()> {
    fs::write(path, text).map_err(|source| DeckError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn control_units(units: UnitSystem) -> [&'static str; 3] {
    match units {
        UnitSystem::KgMmMs => ["mm", "ms", "kg"],
        UnitSystem::TonneMmS => ["mm", "s", "ton"],
    }
}

fn node_card(b: &mut CardBuffer, id: u32, p: &Point3<f64>) {
    b.line(format!(
        "{}{}{}{}{}{}",
        field(id, 8),
        real(p.x, 16),
        real(p.y, 16),
        real(p.z, 16),
        field(0, 8),
        field(0, 8)
    ));
}

fn mesh_deck(mesh: &MeshModel) -> String {
    let mut b = CardBuffer::new();
    b.line("*KEYWORD");
    b.line("*NODE");
    b.comment('$', "   nid               x               y               z      tc      rc");
    for node in mesh.nodes() {
        node_card(&mut b, node.id, &node.position);
    }
    b.line("*ELEMENT_SHELL");
    b.comment('$', "   eid     pid      n1      n2      n3      n4");
    for shell in mesh.shells() {
        b.row(
            8,
            [shell.id, shell.part]
                .into_iter()
                .chain(shell.nodes.iter().copied()),
        );
    }
    for set in mesh.node_sets() {
        b.line("*SET_NODE_LIST_TITLE");
        b.line(&set.name);
        b.row(KW, [set.id]);
        for chunk in set.nodes.chunks(8) {
            b.row(KW, chunk.iter());
        }
    }
    b.line("*END");
    b.into_string()
}

fn starter_deck(
    t: &DeckTemplate,
    mesh: &MeshModel,
    wall: Point3<f64>,
    mesh_file: &str,
    impactor_file: &str,
) -> String {
    let mut b = CardBuffer::new();
    b.line("*KEYWORD");
    b.line("*TITLE");
    b.line(t.title);
    b.comment('$', t.units.banner());
    b.line("*CONTROL_UNITS");
    b.row(KW, control_units(t.units));
    b.line("*CONTROL_TERMINATION");
    b.line(real(t.output.end_time, KW));
    b.line("*DATABASE_BINARY_D3PLOT");
    b.line(real(t.output.anim_dt, KW));

    b.comment('$', " impactor node");
    b.line("*NODE");
    node_card(&mut b, t.impactor.node_id, &wall);

    for part in mesh.parts() {
        b.line("*PART");
        b.line(&part.name);
        b.comment('$', "     pid     secid       mid");
        b.row(KW, [part.id, part.id, part.material_id]);
        b.line("*SECTION_SHELL");
        b.comment('$', "   secid    elform      shrf       nip");
        b.line(format!(
            "{}{}{}{}",
            field(part.id, KW),
            field(t.shell.elform, KW),
            real(t.shell.shear_factor, KW),
            field(t.shell.integration_points, KW)
        ));
        let th = real(part.thickness, KW);
        b.line(th.repeat(4));
    }

    let mut curves = BTreeSet::new();
    for mat in &t.materials {
        b.line("*MAT_PIECEWISE_LINEAR_PLASTICITY_TITLE");
        b.line(mat.name);
        b.comment('$', "     mid        ro         e        pr      sigy");
        b.line(format!(
            "{}{}{}{}{}",
            field(mat.id, KW),
            real(mat.density, KW),
            real(mat.young, KW),
            real(mat.poisson, KW),
            real(mat.yield_stress, KW)
        ));
        b.comment('$', "       c         p      lcss");
        b.line(format!(
            "{}{}{}",
            real(mat.cowper_c, KW),
            real(mat.cowper_p, KW),
            field(mat.curve_id, KW)
        ));
        if curves.insert(mat.curve_id) {
            b.line("*DEFINE_CURVE");
            b.row(KW, [mat.curve_id]);
            for &(strain, stress) in &mat.hardening {
                b.line(format!("{}{}", real(strain, 20), real(stress, 20)));
            }
        }
    }

    for bc in &t.boundary {
        // presence checked by the template
        let id = mesh.node_set(bc.node_set).map_or(0, |s| s.id);
        b.line("*BOUNDARY_SPC_SET");
        b.comment('$', "    nsid       cid      dofx      dofy      dofz     dofrx     dofry     dofrz");
        b.row(
            KW,
            [id, 0]
                .into_iter()
                .chain(bc.fixed.iter().map(|&f| u32::from(f))),
        );
    }

    b.line("*CONTACT_AUTOMATIC_SINGLE_SURFACE");
    b.row(KW, [0, 0, 0, 0]);
    b.row(KW, [0, 0]);
    b.line("*INCLUDE");
    b.line(mesh_file);
    b.line("*INCLUDE_RADIOSS");
    b.line(impactor_file);
    b.line("*END");
    b.into_string()
}

fn vec3(b: &mut CardBuffer, p: &Point3<f64>) {
    b.line(format!("{}{}{}", real(p.x, RAD), real(p.y, RAD), real(p.z, RAD)));
}

fn moving_wall(b: &mut CardBuffer, imp: &Impactor, wall: Point3<f64>) {
    let a = imp.axis.index();
    let keyword = match imp.shape {
        ImpactorShape::Plane => "PLANE",
        ImpactorShape::Cylinder { .. } => "CYL",
    };
    b.line(format!("/RWALL/{keyword}/{}", imp.wall_id));
    b.line(imp.name);
    b.comment('#', "  node_ID     Slide  grnod_ID1  grnod_ID2");
    b.row(KW, [imp.node_id, 0, 0, 0]);

    let diameter = match imp.shape {
        ImpactorShape::Plane => imp.diameter,
        ImpactorShape::Cylinder { diameter } => diameter,
    };
    b.comment('#', "           D_search                fric            Diameter");
    b.line(format!(
        "{}{}{}",
        real(imp.search_distance, RAD),
        real(imp.friction, RAD),
        real(diameter, RAD)
    ));
    vec3(b, &wall);

    // M1 sets the plane normal towards the structure, or the cylinder axis
    let mut m1 = wall;
    match imp.shape {
        ImpactorShape::Plane => m1[a] -= 1.0,
        ImpactorShape::Cylinder { .. } => m1[(a + 2) % 3] += 1.0,
    }
    vec3(b, &m1);

    let mut v = [0.0; 3];
    v[a] = -imp.speed;
    b.comment('#', "               Mass                 VX0                 VY0                 VZ0");
    b.line(format!(
        "{}{}{}{}",
        real(imp.mass, RAD),
        real(v[0], RAD),
        real(v[1], RAD),
        real(v[2], RAD)
    ));
}

fn ground_wall(b: &mut CardBuffer, ground: &Ground, mesh: &MeshModel, axis: usize) {
    let bbox = mesh.bounding_box();
    let set = mesh.node_set(ground.node_set).map_or(0, |s| s.id);
    let mut m = nalgebra::center(&bbox.min, &bbox.max);
    m[axis] = bbox.min[axis];
    let mut m1 = m;
    m1[axis] += 1.0;

    b.line(format!("/RWALL/PLANE/{}", ground.wall_id));
    b.line(ground.name);
    b.row(KW, [0, 0, set, 0]);
    b.line(format!("{}{}{}", real(0.0, RAD), real(0.0, RAD), real(0.0, RAD)));
    vec3(b, &m);
    vec3(b, &m1);
}

fn impactor_deck(t: &DeckTemplate, mesh: &MeshModel, wall: Point3<f64>) -> String {
    let mut b = CardBuffer::new();
    b.comment('#', &format!(" {} rigid walls and time histories", t.title));
    moving_wall(&mut b, &t.impactor, wall);
    if let Some(ground) = &t.ground {
        ground_wall(&mut b, ground, mesh, t.impactor.axis.index());
    }

    b.line("/TH/NODE/1");
    b.line(t.output.track_group);
    b.comment('#', "var");
    b.line("D");
    b.comment('#', "   NODid     Iskew");
    b.row(KW, [t.impactor.node_id, 0]);

    b.line("/TH/RWALL/2");
    b.line(t.output.force_group);
    b.comment('#', "var");
    b.line("DEF");
    b.comment('#', "     obj");
    b.row(KW, [t.impactor.wall_id]);
    b.into_string()
}

fn engine_deck(t: &DeckTemplate) -> String {
    let mut b = CardBuffer::new();
    b.line("#RADIOSS ENGINE");
    b.line(format!("/RUN/{}/1/", t.deck_base()));
    b.line(real(t.output.end_time, RAD).trim());
    b.line("/ANIM/DT");
    b.line(format!("{}{}", real(0.0, RAD), real(t.output.anim_dt, RAD)));
    b.line("/ANIM/ELEM/EPSP");
    b.line("/ANIM/ELEM/THIC");
    b.line("/ANIM/VECT/DISP");
    b.line("/TFILE");
    b.line(real(t.output.th_dt, RAD));
    b.line("/PARITH/ON");
    b.line("/END");
    b.into_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sob_core::Topology;

    #[test]
    fn engine_deck_runs_to_end_time() {
        let t = DeckTemplate::for_topology(Topology::StarBox);
        let deck = engine_deck(&t);
        let lines: Vec<&str> = deck.lines().collect();
        assert_eq!(lines[1], "/RUN/combine/1/");
        assert_eq!(lines[2], "45");
        assert!(deck.contains("/TFILE\n"));
        assert!(deck.ends_with("/END\n"));
    }

    #[test]
    fn beam_engine_deck_uses_seconds() {
        let t = DeckTemplate::for_topology(Topology::ThreePointBending);
        let deck = engine_deck(&t);
        assert!(deck.contains("/RUN/ThreePointBending/1/\n0.015\n"));
    }

    #[test]
    fn plane_wall_moves_down() {
        let t = DeckTemplate::for_topology(Topology::CrashTube);
        let mut b = CardBuffer::new();
        moving_wall(&mut b, &t.impactor, Point3::new(0.0, 0.0, 801.0));
        let text = b.into_string();
        assert!(text.starts_with("/RWALL/PLANE/1\nIMPACTOR\n"));
        let last = text.lines().last().unwrap();
        let fields: Vec<f64> = last
            .split_whitespace()
            .map(|f| f.parse().unwrap())
            .collect();
        assert_eq!(fields, vec![300.0, 0.0, 0.0, -8.33]);
    }
}
