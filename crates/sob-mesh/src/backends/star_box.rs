use nalgebra::Point2;
use sob_core::{Topology, interp_linear, linspace};
use tracing::{debug, info};

use super::sets;
use crate::backend::{MeshBackend, MeshSpec};
use crate::error::{MeshError, MeshResult};
use crate::geometry::{Geometry, NodeSetSpec, SectionSpec, ThicknessProfile, Trigger};

const ELEMENT_SIZE: f64 = 4.0;
const BASE_LAYERS: usize = 30;
const DEFAULT_THICKNESS: f64 = 1.2;
const MATERIAL_ID: u32 = 999;
const TRIGGER_ROWS: f64 = 3.0;
const TRIGGER_DEPTH_RATIO: f64 = 0.05;

/// Square, rectangular or star-shaped crash box, 120 mm long.
///
/// Variables: side lengths `a`, `b`, star indentations `u`, `v`, then either
/// one wall thickness or a longitudinal thickness profile.
#[derive(Debug, Clone, Copy, Default)]
pub struct StarBoxBackend;

impl MeshBackend for StarBoxBackend {
    fn name(&self) -> &'static str {
        "starbox-procedural"
    }

    fn version(&self) -> u32 {
        1
    }

    fn topology(&self) -> Topology {
        Topology::StarBox
    }

    fn build_geometry(&self, spec: &MeshSpec) -> MeshResult<Geometry> {
        let p = &spec.params;
        let r = spec.refinement();
        let element_size = ELEMENT_SIZE / r as f64;
        let layers = BASE_LAYERS * r;
        let length = ELEMENT_SIZE * BASE_LAYERS as f64;

        let (points, half_extent) = section(p)?;
        let thickness = match p.len() {
            1 | 2 | 4 => ThicknessProfile::Uniform(DEFAULT_THICKNESS),
            3 | 5 => ThicknessProfile::Uniform(p[p.len() - 1]),
            _ => {
                let first = element_size / 2.0;
                let control_z = linspace(first, length - first, p.len() - 4);
                let profile = linspace(first, length - first, layers)
                    .into_iter()
                    .map(|z| interp_linear(&control_z, &p[4..], z))
                    .collect();
                ThicknessProfile::Banded(profile)
            }
        };

        let band = TRIGGER_ROWS * ELEMENT_SIZE;
        let depth = TRIGGER_DEPTH_RATIO * half_extent;
        let triggers = (0..points.len())
            .map(|edge| Trigger {
                section: 0,
                edge,
                z_center: length - band / 2.0,
                height: band,
                depth: if edge % 2 == 0 { depth } else { -depth },
            })
            .collect();

        if spec.verbose {
            info!(vertices = points.len(), layers, element_size, "star box section");
        } else {
            debug!(vertices = points.len(), layers, element_size, "star box section");
        }

        Ok(Geometry {
            sections: vec![SectionSpec {
                name: "starbox".into(),
                points,
                closed: true,
                material_id: MATERIAL_ID,
                thickness,
            }],
            length,
            layers,
            element_size,
            triggers,
            node_sets: vec![
                NodeSetSpec {
                    name: sets::BASE.into(),
                    section: None,
                    z_min: 0.0,
                    z_max: 0.0,
                },
                NodeSetSpec {
                    name: sets::TOP.into(),
                    section: None,
                    z_min: length,
                    z_max: length,
                },
            ],
        })
    }
}

/// Section vertices and the mean half extent used to size triggers.
fn section(p: &[f64]) -> MeshResult<(Vec<Point2<f64>>, f64)> {
    match p.len() {
        0 => Err(MeshError::geometry("star box needs at least one variable")),
        1 => {
            let l = p[0] / 2.0;
            Ok((rectangle(l, l), l))
        }
        2 | 3 => {
            let (l, w) = (p[0] / 2.0, p[1] / 2.0);
            Ok((rectangle(l, w), (l + w) / 2.0))
        }
        _ => {
            let (a, b, u, v) = (p[0], p[1], p[2], p[3]);
            let points = vec![
                Point2::new(b / 2.0, a / 2.0),
                Point2::new(0.0, a / 2.0 - u),
                Point2::new(-b / 2.0, a / 2.0),
                Point2::new(-b / 2.0 + v, 0.0),
                Point2::new(-b / 2.0, -a / 2.0),
                Point2::new(0.0, -a / 2.0 + u),
                Point2::new(b / 2.0, -a / 2.0),
                Point2::new(b / 2.0 - v, 0.0),
            ];
            let half = ((a / 2.0).hypot(v) + (b / 2.0).hypot(u)) / 2.0;
            Ok((points, half))
        }
    }
}

fn rectangle(half_x: f64, half_y: f64) -> Vec<Point2<f64>> {
    vec![
        Point2::new(-half_x, half_y),
        Point2::new(half_x, half_y),
        Point2::new(half_x, -half_y),
        Point2::new(-half_x, -half_y),
    ]
}
