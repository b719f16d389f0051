//! Immutable mesh snapshot handed to the deck writer.

use std::collections::{BTreeSet, HashMap};

use nalgebra::Point3;

/// A mesh node with its solver id.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshNode {
    pub id: u32,
    pub position: Point3<f64>,
}

/// Four-node shell element; triangles repeat the last node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shell {
    pub id: u32,
    pub part: u32,
    pub nodes: [u32; 4],
}

/// A part groups shells sharing one material and one section thickness.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub id: u32,
    pub name: String,
    pub material_id: u32,
    pub thickness: f64,
}

/// Named node set referenced by boundary conditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSet {
    pub id: u32,
    pub name: String,
    pub nodes: Vec<u32>,
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl BoundingBox {
    pub fn of<'a>(points: impl IntoIterator<Item = &'a Point3<f64>>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        Some(iter.fold(
            Self {
                min: first,
                max: first,
            },
            |bb, p| Self {
                min: bb.min.inf(p),
                max: bb.max.sup(p),
            },
        ))
    }

    pub fn extent(&self) -> nalgebra::Vector3<f64> {
        self.max - self.min
    }

    /// True if `other` fits inside `self` grown by `tol` on every side.
    pub fn contains_box(&self, other: &BoundingBox, tol: f64) -> bool {
        (0..3).all(|k| other.min[k] >= self.min[k] - tol && other.max[k] <= self.max[k] + tol)
    }
}

/// Validated, immutable mesh.
///
/// Built through [`crate::MeshModelBuilder`]; nothing mutates it afterwards.
#[derive(Debug, Clone)]
pub struct MeshModel {
    pub(crate) nodes: Vec<MeshNode>,
    pub(crate) shells: Vec<Shell>,
    pub(crate) parts: Vec<Part>,
    pub(crate) node_sets: Vec<NodeSet>,
    pub(crate) node_index: HashMap<u32, usize>,
    pub(crate) bbox: BoundingBox,
}

impl MeshModel {
    pub fn nodes(&self) -> &[MeshNode] {
        &self.nodes
    }

    pub fn shells(&self) -> &[Shell] {
        &self.shells
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn node_sets(&self) -> &[NodeSet] {
        &self.node_sets
    }

    pub fn node(&self, id: u32) -> Option<&MeshNode> {
        self.node_index.get(&id).map(|&i| &self.nodes[i])
    }

    pub fn part(&self, id: u32) -> Option<&Part> {
        self.parts.iter().find(|p| p.id == id)
    }

    pub fn node_set(&self, name: &str) -> Option<&NodeSet> {
        self.node_sets.iter().find(|s| s.name == name)
    }

    /// Distinct material ids referenced by parts.
    pub fn material_ids(&self) -> BTreeSet<u32> {
        self.parts.iter().map(|p| p.material_id).collect()
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.bbox
    }

    /// Mid-surface area of a shell (two-triangle split).
    pub fn shell_area(&self, shell: &Shell) -> f64 {
        let p = shell.nodes.map(|id| {
            self.node(id)
                .map(|n| n.position)
                .unwrap_or_else(Point3::origin)
        });
        quad_area(&p)
    }

    /// Shell material volume, sum of area times thickness.
    pub fn material_volume(&self) -> f64 {
        self.shells
            .iter()
            .map(|s| {
                let t = self.part(s.part).map_or(0.0, |p| p.thickness);
                self.shell_area(s) * t
            })
            .sum()
    }
}

pub(crate) fn quad_area(p: &[Point3<f64>; 4]) -> f64 {
    let a = (p[1] - p[0]).cross(&(p[2] - p[0])).norm();
    let b = (p[2] - p[0]).cross(&(p[3] - p[0])).norm();
    0.5 * (a + b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_of_points() {
        let pts = [
            Point3::new(1.0, -2.0, 0.0),
            Point3::new(-1.0, 3.0, 5.0),
            Point3::new(0.5, 0.0, 2.0),
        ];
        let bb = BoundingBox::of(&pts).unwrap();
        assert_eq!(bb.min, Point3::new(-1.0, -2.0, 0.0));
        assert_eq!(bb.max, Point3::new(1.0, 3.0, 5.0));
        assert!(BoundingBox::of(&[] as &[Point3<f64>]).is_none());
    }

    #[test]
    fn unit_square_area() {
        let p = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        assert!((quad_area(&p) - 1.0).abs() < 1e-12);
    }
}
