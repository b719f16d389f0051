use nalgebra::Point2;
use sob_core::Topology;
use tracing::{debug, info};

use super::sets;
use crate::backend::{MeshBackend, MeshSpec};
use crate::error::MeshResult;
use crate::geometry::{Geometry, NodeSetSpec, SectionSpec, ThicknessProfile, Trigger};

const WIDTH: f64 = 120.0;
const HEIGHT: f64 = 80.0;
const LENGTH: f64 = 800.0;
const ELEMENT_SIZE: f64 = 4.0;
const THICKNESS: f64 = 1.2;
const MATERIAL_ID: u32 = 999;
const TRIGGERS_PER_FACE_PAIR: usize = 5;
/// In element rows.
const DEFAULT_TRIGGER_HEIGHT: f64 = 3.0;
/// Above this many variables each face pair gets its own triggers.
const MIRRORED_LIMIT: usize = 15;

/// 120 x 80 x 800 mm rectangular tube with indentation triggers.
///
/// Variables cycle through (depth, position, height) per trigger. Positions
/// and heights are in element rows relative to five evenly spaced slots.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrashTubeBackend;

#[derive(Debug, Clone, Copy, PartialEq)]
struct TriggerVars {
    depth: f64,
    position: f64,
    height: f64,
}

impl MeshBackend for CrashTubeBackend {
    fn name(&self) -> &'static str {
        "crashtube-procedural"
    }

    fn version(&self) -> u32 {
        1
    }

    fn topology(&self) -> Topology {
        Topology::CrashTube
    }

    fn build_geometry(&self, spec: &MeshSpec) -> MeshResult<Geometry> {
        let r = spec.refinement();
        let groups = trigger_groups(&spec.params);

        // long faces (edges 0, 2) take the first five, short faces the rest
        let per_pair: [&[TriggerVars]; 2] = if groups.len() > TRIGGERS_PER_FACE_PAIR {
            [&groups[..TRIGGERS_PER_FACE_PAIR], &groups[TRIGGERS_PER_FACE_PAIR..]]
        } else {
            [&groups[..], &groups[..]]
        };

        let rows = LENGTH / ELEMENT_SIZE;
        let slot = rows / TRIGGERS_PER_FACE_PAIR as f64;
        let mut triggers = Vec::new();
        for (pair, edges) in [[0usize, 2], [1, 3]].into_iter().enumerate() {
            for (k, vars) in per_pair[pair].iter().enumerate() {
                // first trigger sits nearest the impacted end
                let centre_row = slot * ((TRIGGERS_PER_FACE_PAIR - 1 - k) as f64 + 0.5);
                let height = vars.height.round() * ELEMENT_SIZE;
                if height <= 0.0 || vars.depth == 0.0 {
                    continue;
                }
                for edge in edges {
                    triggers.push(Trigger {
                        section: 0,
                        edge,
                        z_center: (centre_row + vars.position.round()) * ELEMENT_SIZE,
                        height,
                        depth: vars.depth,
                    });
                }
            }
        }

        let (hx, hy) = (WIDTH / 2.0, HEIGHT / 2.0);
        let points = vec![
            Point2::new(-hx, hy),
            Point2::new(hx, hy),
            Point2::new(hx, -hy),
            Point2::new(-hx, -hy),
        ];

        if spec.verbose {
            info!(triggers = triggers.len(), refinement = r, "crash tube section");
        } else {
            debug!(triggers = triggers.len(), refinement = r, "crash tube section");
        }

        Ok(Geometry {
            sections: vec![SectionSpec {
                name: "crashtube".into(),
                points,
                closed: true,
                material_id: MATERIAL_ID,
                thickness: ThicknessProfile::Uniform(THICKNESS),
            }],
            length: LENGTH,
            layers: (rows as usize) * r,
            element_size: ELEMENT_SIZE / r as f64,
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
                    z_min: LENGTH,
                    z_max: LENGTH,
                },
            ],
        })
    }
}

fn trigger_groups(params: &[f64]) -> Vec<TriggerVars> {
    let count = if params.len() <= MIRRORED_LIMIT {
        TRIGGERS_PER_FACE_PAIR
    } else {
        2 * TRIGGERS_PER_FACE_PAIR
    };
    let mut groups = vec![
        TriggerVars {
            depth: 0.0,
            position: 0.0,
            height: DEFAULT_TRIGGER_HEIGHT,
        };
        count
    ];
    for (i, &value) in params.iter().enumerate() {
        let Some(group) = groups.get_mut(i / 3) else {
            break;
        };
        match i % 3 {
            0 => group.depth = value,
            1 => group.position = value,
            _ => group.height = value,
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(params: Vec<f64>) -> MeshSpec {
        MeshSpec {
            topology: Topology::CrashTube,
            params,
            h_level: 1,
            verbose: false,
        }
    }

    #[test]
    fn variables_cycle_depth_position_height() {
        let g = trigger_groups(&[5.0, -2.0, 1.0, 3.0]);
        assert_eq!(g.len(), 5);
        assert_eq!(
            g[0],
            TriggerVars {
                depth: 5.0,
                position: -2.0,
                height: 1.0
            }
        );
        assert_eq!(g[1].depth, 3.0);
        assert_eq!(g[1].height, DEFAULT_TRIGGER_HEIGHT);
        assert_eq!(trigger_groups(&[1.0; 16]).len(), 10);
    }

    #[test]
    fn mirrored_triggers_on_all_faces() {
        let g = CrashTubeBackend.build_geometry(&spec(vec![4.0, 1.0, 2.0])).unwrap();
        assert_eq!(g.triggers.len(), 4);
        let t = &g.triggers[0];
        // slot 4 of 5: rows 160..200, centre 180, shifted one row
        assert_eq!(t.z_center, 181.0 * ELEMENT_SIZE);
        assert_eq!(t.height, 8.0);
        assert!(g.triggers.iter().all(|t| t.z_center == 181.0 * ELEMENT_SIZE));
    }

    #[test]
    fn zero_depth_means_no_trigger() {
        let g = CrashTubeBackend.build_geometry(&spec(vec![0.0])).unwrap();
        assert!(g.triggers.is_empty());
        let raw = CrashTubeBackend.generate(&spec(vec![0.0])).unwrap();
        // perimeter 400 mm at 4 mm, 201 rings
        assert_eq!(raw.nodes.len(), 100 * 201);
    }
}
