//! Incremental mesh builder.

use std::collections::HashMap;

use nalgebra::Point3;

use crate::error::{MeshError, MeshResult};
use crate::model::{BoundingBox, MeshModel, MeshNode, NodeSet, Part, Shell};
use crate::validate;

/// First ids handed out by a builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Numbering {
    pub first_node: u32,
    pub first_shell: u32,
    pub first_part: u32,
    pub first_node_set: u32,
}

impl Default for Numbering {
    fn default() -> Self {
        Self {
            first_node: 1001,
            first_shell: 1_000_001,
            first_part: 101,
            first_node_set: 101,
        }
    }
}

/// Builder for constructing a mesh incrementally.
///
/// Add nodes, parts and shells, then call `build()` to validate and freeze
/// the result into an immutable [`MeshModel`].
#[derive(Debug, Default)]
pub struct MeshModelBuilder {
    nodes: Vec<MeshNode>,
    shells: Vec<Shell>,
    parts: Vec<Part>,
    node_sets: Vec<NodeSet>,
    numbering: Numbering,
    next_node: u32,
    next_shell: u32,
    next_part: u32,
    next_node_set: u32,
}

impl MeshModelBuilder {
    pub fn new(numbering: Numbering) -> Self {
        Self {
            numbering,
            next_node: numbering.first_node,
            next_shell: numbering.first_shell,
            next_part: numbering.first_part,
            next_node_set: numbering.first_node_set,
            ..Self::default()
        }
    }

    pub fn numbering(&self) -> Numbering {
        self.numbering
    }

    pub fn add_node(&mut self, position: Point3<f64>) -> u32 {
        let id = self.next_node;
        self.next_node += 1;
        self.nodes.push(MeshNode { id, position });
        id
    }

    pub fn add_part(
        &mut self,
        name: impl Into<String>,
        material_id: u32,
        thickness: f64,
    ) -> u32 {
        let id = self.next_part;
        self.next_part += 1;
        self.parts.push(Part {
            id,
            name: name.into(),
            material_id,
            thickness,
        });
        id
    }

    pub fn add_shell(&mut self, part: u32, nodes: [u32; 4]) -> u32 {
        let id = self.next_shell;
        self.next_shell += 1;
        self.shells.push(Shell { id, part, nodes });
        id
    }

    pub fn add_node_set(&mut self, name: impl Into<String>, nodes: Vec<u32>) -> u32 {
        let id = self.next_node_set;
        self.next_node_set += 1;
        self.node_sets.push(NodeSet {
            id,
            name: name.into(),
            nodes,
        });
        id
    }

    /// Validate and freeze.
    ///
    /// Structural checks (ids, references) run first, then the per-element
    /// quality checks.
    pub fn build(self) -> MeshResult<MeshModel> {
        validate::validate_structure(&self.nodes, &self.shells, &self.parts, &self.node_sets)?;

        let node_index: HashMap<u32, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id, i))
            .collect();

        validate::validate_quality(&self.nodes, &node_index, &self.shells)?;

        let bbox = BoundingBox::of(self.nodes.iter().map(|n| &n.position))
            .ok_or_else(|| MeshError::geometry("mesh has no nodes"))?;

        Ok(MeshModel {
            nodes: self.nodes,
            shells: self.shells,
            parts: self.parts,
            node_sets: self.node_sets,
            node_index,
            bbox,
        })
    }
}
