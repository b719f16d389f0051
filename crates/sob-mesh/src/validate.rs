//! Mesh validation logic.

use std::collections::{HashMap, HashSet};

use nalgebra::Point3;
use rayon::prelude::*;

use crate::error::{MeshError, MeshResult};
use crate::model::{MeshNode, NodeSet, Part, Shell, quad_area};

/// Shells below this area are treated as collapsed.
const MIN_SHELL_AREA: f64 = 1e-6;
/// Longest over shortest edge.
const MAX_ASPECT_RATIO: f64 = 25.0;

/// Validate ids and cross references.
pub(crate) fn validate_structure(
    nodes: &[MeshNode],
    shells: &[Shell],
    parts: &[Part],
    node_sets: &[NodeSet],
) -> MeshResult<()> {
    let mut node_ids = HashSet::with_capacity(nodes.len());
    for node in nodes {
        if !node_ids.insert(node.id) {
            return Err(MeshError::DuplicateId {
                what: "node",
                id: node.id,
            });
        }
        if !(node.position.x.is_finite() && node.position.y.is_finite() && node.position.z.is_finite()) {
            return Err(MeshError::geometry(format!(
                "node {} has non-finite coordinates",
                node.id
            )));
        }
    }

    let mut part_ids = HashSet::with_capacity(parts.len());
    for part in parts {
        if !part_ids.insert(part.id) {
            return Err(MeshError::DuplicateId {
                what: "part",
                id: part.id,
            });
        }
        if !(part.thickness.is_finite() && part.thickness > 0.0) {
            return Err(MeshError::geometry(format!(
                "part {} has non-positive thickness {}",
                part.name, part.thickness
            )));
        }
    }

    let mut shell_ids = HashSet::with_capacity(shells.len());
    let mut used = HashSet::with_capacity(nodes.len());
    for shell in shells {
        if !shell_ids.insert(shell.id) {
            return Err(MeshError::DuplicateId {
                what: "shell",
                id: shell.id,
            });
        }
        if !part_ids.contains(&shell.part) {
            return Err(MeshError::UnknownPart {
                shell: shell.id,
                part: shell.part,
            });
        }
        for &node in &shell.nodes {
            if !node_ids.contains(&node) {
                return Err(MeshError::UnknownNode {
                    shell: shell.id,
                    node,
                });
            }
            used.insert(node);
        }
    }

    // Every node must carry at least one shell
    if let Some(node) = nodes.iter().find(|n| !used.contains(&n.id)) {
        return Err(MeshError::DanglingNode { node: node.id });
    }

    let mut set_ids = HashSet::with_capacity(node_sets.len());
    for set in node_sets {
        if !set_ids.insert(set.id) {
            return Err(MeshError::DuplicateId {
                what: "node set",
                id: set.id,
            });
        }
        if set.nodes.is_empty() {
            return Err(MeshError::geometry(format!("node set {} is empty", set.name)));
        }
        if let Some(&node) = set.nodes.iter().find(|id| !node_ids.contains(id)) {
            return Err(MeshError::geometry(format!(
                "node set {} references unknown node {node}",
                set.name
            )));
        }
    }

    Ok(())
}

/// Per-element quality checks, run in parallel.
pub(crate) fn validate_quality(
    nodes: &[MeshNode],
    node_index: &HashMap<u32, usize>,
    shells: &[Shell],
) -> MeshResult<()> {
    let bad = shells.par_iter().find_first(|shell| {
        let p: [Point3<f64>; 4] = shell.nodes.map(|id| nodes[node_index[&id]].position);
        !shell_quality_ok(&p)
    });

    match bad {
        Some(shell) => Err(MeshError::geometry(format!(
            "shell {} is degenerate or badly shaped",
            shell.id
        ))),
        None => Ok(()),
    }
}

fn shell_quality_ok(p: &[Point3<f64>; 4]) -> bool {
    if quad_area(p) < MIN_SHELL_AREA {
        return false;
    }
    let edges = [(0, 1), (1, 2), (2, 3), (3, 0)];
    let (shortest, longest) = edges
        .iter()
        .map(|&(a, b)| (p[b] - p[a]).norm())
        // triangles repeat their last node
        .filter(|len| *len > 0.0)
        .fold((f64::INFINITY, 0.0_f64), |(lo, hi), len| (lo.min(len), hi.max(len)));
    shortest.is_finite() && longest / shortest <= MAX_ASPECT_RATIO
}
