//! Legacy-ASCII VTK export of a mesh.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::MeshResult;
use crate::model::MeshModel;

const VTK_QUAD: u8 = 9;

/// Write `mesh` as an unstructured grid with part id and thickness cell data.
pub fn write_vtk<W: Write>(mesh: &MeshModel, out: &mut W) -> MeshResult<()> {
    writeln!(out, "# vtk DataFile Version 3.0")?;
    writeln!(out, "sob mesh")?;
    writeln!(out, "ASCII")?;
    writeln!(out, "DATASET UNSTRUCTURED_GRID")?;

    writeln!(out, "POINTS {} double", mesh.nodes().len())?;
    for node in mesh.nodes() {
        let p = node.position;
        writeln!(out, "{} {} {}", p.x, p.y, p.z)?;
    }

    // VTK wants 0-based point indices
    let index = |id: u32| mesh.node_index.get(&id).copied().unwrap_or(0);
    let shells = mesh.shells();
    writeln!(out, "CELLS {} {}", shells.len(), shells.len() * 5)?;
    for shell in shells {
        let [a, b, c, d] = shell.nodes.map(index);
        writeln!(out, "4 {a} {b} {c} {d}")?;
    }
    writeln!(out, "CELL_TYPES {}", shells.len())?;
    for _ in shells {
        writeln!(out, "{VTK_QUAD}")?;
    }

    writeln!(out, "CELL_DATA {}", shells.len())?;
    writeln!(out, "SCALARS part_id int 1")?;
    writeln!(out, "LOOKUP_TABLE default")?;
    for shell in shells {
        writeln!(out, "{}", shell.part)?;
    }
    writeln!(out, "SCALARS thickness double 1")?;
    writeln!(out, "LOOKUP_TABLE default")?;
    for shell in shells {
        let t = mesh.part(shell.part).map_or(0.0, |p| p.thickness);
        writeln!(out, "{t}")?;
    }
    Ok(())
}

pub fn export_vtk(mesh: &MeshModel, path: &Path) -> MeshResult<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write_vtk(mesh, &mut out)?;
    out.flush()?;
    Ok(())
}
