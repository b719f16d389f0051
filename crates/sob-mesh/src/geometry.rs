//! Backend-agnostic parametric geometry: cross sections swept along +z.
//!
//! Every topology in the catalog is a thin-walled extrusion. A backend
//! describes its sections, thickness profiles, triggers and node sets as a
//! [`Geometry`]; [`Geometry::extrude`] turns that into a [`RawMesh`].

use std::collections::{BTreeSet, HashMap};

use nalgebra::{Point2, Point3, Vector2};

use crate::error::{MeshError, MeshResult};
use crate::model::BoundingBox;

const COINCIDENT: f64 = 1e-6;

/// Wall thickness along the extrusion.
#[derive(Debug, Clone, PartialEq)]
pub enum ThicknessProfile {
    Uniform(f64),
    /// Equal-length bands from z = 0 upwards; one part per band.
    Banded(Vec<f64>),
}

impl ThicknessProfile {
    pub fn band_count(&self) -> usize {
        match self {
            ThicknessProfile::Uniform(_) => 1,
            ThicknessProfile::Banded(v) => v.len(),
        }
    }

    pub fn band_of_layer(&self, layer: usize, layers: usize) -> usize {
        match self {
            ThicknessProfile::Uniform(_) => 0,
            ThicknessProfile::Banded(v) => (layer * v.len() / layers.max(1)).min(v.len() - 1),
        }
    }

    pub fn band_thickness(&self, band: usize) -> f64 {
        match self {
            ThicknessProfile::Uniform(t) => *t,
            ThicknessProfile::Banded(v) => v[band],
        }
    }

    fn values(&self) -> &[f64] {
        match self {
            ThicknessProfile::Uniform(t) => std::slice::from_ref(t),
            ThicknessProfile::Banded(v) => v,
        }
    }
}

/// One polyline cross section.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionSpec {
    pub name: String,
    pub points: Vec<Point2<f64>>,
    pub closed: bool,
    pub material_id: u32,
    pub thickness: ThicknessProfile,
}

impl SectionSpec {
    fn edge_count(&self) -> usize {
        if self.closed {
            self.points.len()
        } else {
            self.points.len().saturating_sub(1)
        }
    }

    fn edge(&self, e: usize) -> (Point2<f64>, Point2<f64>) {
        let n = self.points.len();
        (self.points[e], self.points[(e + 1) % n])
    }

    /// Unit normal of edge `e` pointing into the section (closed) or to the
    /// left of the walking direction (open).
    fn inward_normal(&self, e: usize) -> Vector2<f64> {
        let (a, b) = self.edge(e);
        let d = (b - a).normalize();
        let left = Vector2::new(-d.y, d.x);
        if !self.closed {
            return left;
        }
        let centroid = self
            .points
            .iter()
            .fold(Vector2::zeros(), |acc, p| acc + p.coords)
            / self.points.len() as f64;
        let mid = (a.coords + b.coords) * 0.5;
        if left.dot(&(centroid - mid)) >= 0.0 {
            left
        } else {
            -left
        }
    }
}

/// Local indentation of one section edge over a z band.
///
/// Interior stations of the edge move along the inward normal by
/// `depth * sin(pi * s)`; edge end points stay put.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub section: usize,
    pub edge: usize,
    pub z_center: f64,
    pub height: f64,
    pub depth: f64,
}

impl Trigger {
    fn z_range(&self) -> (f64, f64) {
        (self.z_center - 0.5 * self.height, self.z_center + 0.5 * self.height)
    }
}

/// Node selection by section and z interval (inclusive).
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSetSpec {
    pub name: String,
    /// `None` selects from every section.
    pub section: Option<usize>,
    pub z_min: f64,
    pub z_max: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub sections: Vec<SectionSpec>,
    pub length: f64,
    pub layers: usize,
    pub element_size: f64,
    pub triggers: Vec<Trigger>,
    pub node_sets: Vec<NodeSetSpec>,
}

/// Backend output before ids are assigned; indices are 0-based.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMesh {
    pub nodes: Vec<Point3<f64>>,
    pub quads: Vec<RawQuad>,
    pub parts: Vec<RawPart>,
    pub node_sets: Vec<RawNodeSet>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawQuad {
    pub part: usize,
    pub nodes: [usize; 4],
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawPart {
    pub name: String,
    pub material_id: u32,
    pub thickness: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNodeSet {
    pub name: String,
    pub nodes: Vec<usize>,
}

impl Geometry {
    /// Sanity checks run before any meshing.
    pub fn check(&self) -> MeshResult<()> {
        if !(self.length.is_finite() && self.length > 0.0) {
            return Err(MeshError::geometry("extrusion length must be positive"));
        }
        if self.layers == 0 || !(self.element_size > 0.0) {
            return Err(MeshError::geometry("extrusion needs at least one layer"));
        }
        if self.sections.is_empty() {
            return Err(MeshError::geometry("geometry has no sections"));
        }

        for section in &self.sections {
            let min_points = if section.closed { 3 } else { 2 };
            if section.points.len() < min_points {
                return Err(MeshError::geometry(format!(
                    "section {} has too few points",
                    section.name
                )));
            }
            if section
                .points
                .iter()
                .any(|p| !(p.x.is_finite() && p.y.is_finite()))
            {
                return Err(MeshError::geometry(format!(
                    "section {} has non-finite points",
                    section.name
                )));
            }
            if let Some(t) = section
                .thickness
                .values()
                .iter()
                .find(|t| !(t.is_finite() && **t > 0.0))
            {
                return Err(MeshError::geometry(format!(
                    "section {} has non-positive wall thickness {t}",
                    section.name
                )));
            }
            if section.thickness.band_count() == 0 || section.thickness.band_count() > self.layers {
                return Err(MeshError::geometry(format!(
                    "section {} has {} thickness bands for {} layers",
                    section.name,
                    section.thickness.band_count(),
                    self.layers
                )));
            }
            if polyline_self_intersects(&section.points, section.closed) {
                return Err(MeshError::geometry(format!(
                    "section {} is self-intersecting",
                    section.name
                )));
            }
        }

        self.check_triggers()
    }

    fn check_triggers(&self) -> MeshResult<()> {
        for (i, trigger) in self.triggers.iter().enumerate() {
            let section = self.sections.get(trigger.section).ok_or_else(|| {
                MeshError::geometry(format!("trigger {i} references unknown section"))
            })?;
            if trigger.edge >= section.edge_count() {
                return Err(MeshError::geometry(format!(
                    "trigger {i} references unknown edge {} of {}",
                    trigger.edge, section.name
                )));
            }
            let (lo, hi) = trigger.z_range();
            if !(trigger.height > 0.0) || lo < -COINCIDENT || hi > self.length + COINCIDENT {
                return Err(MeshError::geometry(format!(
                    "trigger {i} band [{lo}, {hi}] leaves the extrusion"
                )));
            }
            let (a, b) = section.edge(trigger.edge);
            if !trigger.depth.is_finite() || trigger.depth.abs() >= 0.5 * (b - a).norm() {
                return Err(MeshError::geometry(format!(
                    "trigger {i} depth {} is too deep for its edge",
                    trigger.depth
                )));
            }

            for (j, other) in self.triggers.iter().enumerate().skip(i + 1) {
                if other.section != trigger.section || other.edge != trigger.edge {
                    continue;
                }
                let (olo, ohi) = other.z_range();
                if lo < ohi - COINCIDENT && olo < hi - COINCIDENT {
                    return Err(MeshError::geometry(format!(
                        "triggers {i} and {j} overlap on edge {} of {}",
                        trigger.edge, section.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Box the extruded mesh must fit in: section extents grown by the
    /// deepest trigger, z from 0 to the extrusion length.
    pub fn envelope(&self) -> BoundingBox {
        let reach = self
            .triggers
            .iter()
            .map(|t| t.depth.abs())
            .fold(0.0, f64::max);
        let pts = self.sections.iter().flat_map(|s| s.points.iter());
        let (mut min, mut max) = (Point2::new(f64::MAX, f64::MAX), Point2::new(f64::MIN, f64::MIN));
        for p in pts {
            min = min.inf(p);
            max = max.sup(p);
        }
        BoundingBox {
            min: Point3::new(min.x - reach, min.y - reach, 0.0),
            max: Point3::new(max.x + reach, max.y + reach, self.length),
        }
    }

    /// Sweep every section along z.
    ///
    /// Coincident nodes of different sections are merged so sections that
    /// meet at a vertex share nodes. Output order depends only on the inputs.
    pub fn extrude(&self) -> MeshResult<RawMesh> {
        self.check()?;

        let mut raw = RawMesh::default();
        let mut merge: HashMap<(i64, i64, i64), usize> = HashMap::new();
        // (section, node, ring) triples for node-set selection
        let mut membership: Vec<(usize, usize, usize)> = Vec::new();
        let dz = self.length / self.layers as f64;

        for (si, section) in self.sections.iter().enumerate() {
            let stations = self.stations(section);
            let first_part = raw.parts.len();
            for band in 0..section.thickness.band_count() {
                let name = if section.thickness.band_count() == 1 {
                    section.name.clone()
                } else {
                    format!("{}_{:03}", section.name, band + 1)
                };
                raw.parts.push(RawPart {
                    name,
                    material_id: section.material_id,
                    thickness: section.thickness.band_thickness(band),
                });
            }

            let mut rings: Vec<Vec<usize>> = Vec::with_capacity(self.layers + 1);
            for ring in 0..=self.layers {
                let z = if ring == self.layers {
                    self.length
                } else {
                    ring as f64 * dz
                };
                let mut ids = Vec::with_capacity(stations.len());
                for station in &stations {
                    let xy = self.displaced(si, section, station, z);
                    let p = Point3::new(xy.x, xy.y, z);
                    let key = quantize(&p);
                    let idx = *merge.entry(key).or_insert_with(|| {
                        raw.nodes.push(p);
                        raw.nodes.len() - 1
                    });
                    membership.push((si, idx, ring));
                    ids.push(idx);
                }
                rings.push(ids);
            }

            let spans = if section.closed {
                stations.len()
            } else {
                stations.len() - 1
            };
            for layer in 0..self.layers {
                let part = first_part + section.thickness.band_of_layer(layer, self.layers);
                let (lower, upper) = (&rings[layer], &rings[layer + 1]);
                for j in 0..spans {
                    let k = (j + 1) % stations.len();
                    raw.quads.push(RawQuad {
                        part,
                        nodes: [lower[j], lower[k], upper[k], upper[j]],
                    });
                }
            }
        }

        for spec in &self.node_sets {
            let nodes: BTreeSet<usize> = membership
                .iter()
                .filter(|(si, _, ring)| {
                    let z = raw_ring_z(*ring, self.layers, self.length);
                    spec.section.is_none_or(|s| s == *si)
                        && z >= spec.z_min - COINCIDENT
                        && z <= spec.z_max + COINCIDENT
                })
                .map(|(_, idx, _)| *idx)
                .collect();
            raw.node_sets.push(RawNodeSet {
                name: spec.name.clone(),
                nodes: nodes.into_iter().collect(),
            });
        }

        Ok(raw)
    }

    fn stations(&self, section: &SectionSpec) -> Vec<Station> {
        let mut out = Vec::new();
        for e in 0..section.edge_count() {
            let (a, b) = section.edge(e);
            let n = ((b - a).norm() / self.element_size).round().max(1.0) as usize;
            for k in 0..n {
                let s = k as f64 / n as f64;
                out.push(Station {
                    point: a + (b - a) * s,
                    edge: e,
                    s,
                });
            }
        }
        if !section.closed {
            let last = section.edge_count() - 1;
            out.push(Station {
                point: section.points[section.points.len() - 1],
                edge: last,
                s: 1.0,
            });
        }
        out
    }

    fn displaced(&self, si: usize, section: &SectionSpec, station: &Station, z: f64) -> Point2<f64> {
        if station.s <= 0.0 || station.s >= 1.0 {
            return station.point;
        }
        let mut p = station.point;
        for trigger in &self.triggers {
            if trigger.section != si || trigger.edge != station.edge {
                continue;
            }
            let (lo, hi) = trigger.z_range();
            if z >= lo - COINCIDENT && z <= hi + COINCIDENT {
                let shape = (std::f64::consts::PI * station.s).sin();
                p += section.inward_normal(station.edge) * trigger.depth * shape;
            }
        }
        p
    }
}

struct Station {
    point: Point2<f64>,
    edge: usize,
    /// Position along the edge in [0, 1).
    s: f64,
}

fn raw_ring_z(ring: usize, layers: usize, length: f64) -> f64 {
    if ring == layers {
        length
    } else {
        ring as f64 * length / layers as f64
    }
}

fn quantize(p: &Point3<f64>) -> (i64, i64, i64) {
    let q = |v: f64| (v / COINCIDENT).round() as i64;
    (q(p.x), q(p.y), q(p.z))
}

/// True if two non-adjacent edges touch or any edge has zero length.
pub fn polyline_self_intersects(points: &[Point2<f64>], closed: bool) -> bool {
    let n = points.len();
    let edges: Vec<(Point2<f64>, Point2<f64>)> = if closed {
        (0..n).map(|i| (points[i], points[(i + 1) % n])).collect()
    } else {
        points.windows(2).map(|w| (w[0], w[1])).collect()
    };

    if edges.iter().any(|(a, b)| (b - a).norm() <= COINCIDENT) {
        return true;
    }

    let m = edges.len();
    for i in 0..m {
        for j in (i + 1)..m {
            let adjacent = j == i + 1 || (closed && i == 0 && j == m - 1);
            if adjacent {
                continue;
            }
            if segments_touch(edges[i], edges[j]) {
                return true;
            }
        }
    }
    false
}

fn orient(a: Point2<f64>, b: Point2<f64>, c: Point2<f64>) -> f64 {
    (b - a).perp(&(c - a))
}

fn on_segment(a: Point2<f64>, b: Point2<f64>, p: Point2<f64>) -> bool {
    p.x >= a.x.min(b.x) - COINCIDENT
        && p.x <= a.x.max(b.x) + COINCIDENT
        && p.y >= a.y.min(b.y) - COINCIDENT
        && p.y <= a.y.max(b.y) + COINCIDENT
}

fn segments_touch(
    (p1, p2): (Point2<f64>, Point2<f64>),
    (q1, q2): (Point2<f64>, Point2<f64>),
) -> bool {
    let d1 = orient(q1, q2, p1);
    let d2 = orient(q1, q2, p2);
    let d3 = orient(p1, p2, q1);
    let d4 = orient(p1, p2, q2);

    let eps = COINCIDENT;
    if ((d1 > eps && d2 < -eps) || (d1 < -eps && d2 > eps))
        && ((d3 > eps && d4 < -eps) || (d3 < -eps && d4 > eps))
    {
        return true;
    }
    (d1.abs() <= eps && on_segment(q1, q2, p1))
        || (d2.abs() <= eps && on_segment(q1, q2, p2))
        || (d3.abs() <= eps && on_segment(p1, p2, q1))
        || (d4.abs() <= eps && on_segment(p1, p2, q2))
}
