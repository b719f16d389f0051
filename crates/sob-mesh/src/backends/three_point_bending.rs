use nalgebra::Point2;
use sob_core::{Topology, interp_linear, linspace};
use tracing::{debug, info};

use super::sets;
use crate::backend::{MeshBackend, MeshSpec};
use crate::error::{MeshError, MeshResult};
use crate::geometry::{Geometry, NodeSetSpec, SectionSpec, ThicknessProfile};

const WIDTH: f64 = 120.0;
const HEIGHT: f64 = 80.0;
const LENGTH: f64 = 800.0;
const ELEMENT_SIZE: f64 = 10.0;
const PROFILE_SEGMENTS: usize = 8;
const DEFAULT_SHEET_THICKNESS: f64 = 1.7;
const TUBE_MATERIAL_ID: u32 = 1;
const LAYER_MATERIAL_ID: u32 = 2;
const SUPPORT_SPAN: f64 = 2.0 * ELEMENT_SIZE;

const SHEETS: [&str; 5] = ["top", "web_left", "layer", "web_right", "bottom"];

/// Rectangular beam with a stiffening mid layer, five sheets in all.
///
/// Each variable is a sheet thickness; past five, variables are binned
/// round-robin into per-sheet longitudinal profiles.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreePointBendingBackend;

impl MeshBackend for ThreePointBendingBackend {
    fn name(&self) -> &'static str {
        "threepointbending-procedural"
    }

    fn version(&self) -> u32 {
        1
    }

    fn topology(&self) -> Topology {
        Topology::ThreePointBending
    }

    fn build_geometry(&self, spec: &MeshSpec) -> MeshResult<Geometry> {
        if spec.params.is_empty() {
            return Err(MeshError::geometry("beam needs at least one variable"));
        }
        let r = spec.refinement();
        let segments = PROFILE_SEGMENTS * r;
        let (hx, hy) = (WIDTH / 2.0, HEIGHT / 2.0);

        let outlines: [Vec<Point2<f64>>; 5] = [
            vec![Point2::new(-hx, hy), Point2::new(hx, hy)],
            vec![Point2::new(-hx, -hy), Point2::new(-hx, 0.0), Point2::new(-hx, hy)],
            vec![Point2::new(-hx, 0.0), Point2::new(hx, 0.0)],
            vec![Point2::new(hx, -hy), Point2::new(hx, 0.0), Point2::new(hx, hy)],
            vec![Point2::new(-hx, -hy), Point2::new(hx, -hy)],
        ];

        let sections = outlines
            .into_iter()
            .zip(sheet_controls(&spec.params))
            .zip(SHEETS)
            .map(|((points, controls), name)| SectionSpec {
                name: name.into(),
                points,
                closed: false,
                material_id: if name == "layer" {
                    LAYER_MATERIAL_ID
                } else {
                    TUBE_MATERIAL_ID
                },
                thickness: profile(&controls, segments),
            })
            .collect::<Vec<_>>();

        let bottom = SHEETS.len() - 1;
        if spec.verbose {
            info!(segments, refinement = r, "three point bending sheets");
        } else {
            debug!(segments, refinement = r, "three point bending sheets");
        }

        Ok(Geometry {
            sections,
            length: LENGTH,
            layers: (LENGTH / ELEMENT_SIZE) as usize * r,
            element_size: ELEMENT_SIZE / r as f64,
            triggers: Vec::new(),
            node_sets: vec![
                NodeSetSpec {
                    name: sets::SUPPORT_START.into(),
                    section: Some(bottom),
                    z_min: 0.0,
                    z_max: SUPPORT_SPAN,
                },
                NodeSetSpec {
                    name: sets::SUPPORT_END.into(),
                    section: Some(bottom),
                    z_min: LENGTH - SUPPORT_SPAN,
                    z_max: LENGTH,
                },
            ],
        })
    }
}

/// Control thicknesses per sheet, in `SHEETS` order.
fn sheet_controls(params: &[f64]) -> [Vec<f64>; 5] {
    let d = DEFAULT_SHEET_THICKNESS;
    let values: Vec<f64> = match *params {
        [t] => vec![t; 5],
        [a, b] => vec![d, d, d, a, b],
        [a, b, c] => vec![a, d, d, b, c],
        [a, b, c, e] => vec![d, a, b, c, e],
        _ => params.to_vec(),
    };

    let mut bins: [Vec<f64>; 5] = Default::default();
    let whole = values.len() / 5 * 5;
    for (i, &v) in values[..whole].iter().enumerate() {
        bins[i % 5].push(v);
    }
    let rest = &values[whole..];
    let targets: &[usize] = match rest.len() {
        1 => &[0],
        2 => &[3, 4],
        3 => &[0, 3, 4],
        4 => &[1, 2, 3, 4],
        _ => &[],
    };
    for (&bin, &v) in targets.iter().zip(rest) {
        bins[bin].push(v);
    }
    bins
}

fn profile(controls: &[f64], segments: usize) -> ThicknessProfile {
    match controls {
        [t] => ThicknessProfile::Uniform(*t),
        _ => {
            let at = linspace(1.0, segments as f64, controls.len());
            ThicknessProfile::Banded(
                (1..=segments)
                    .map(|k| interp_linear(&at, controls, k as f64))
                    .collect(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_dimensions_fill_defaults() {
        let bins = sheet_controls(&[0.9, 2.5]);
        let firsts: Vec<f64> = bins.iter().map(|b| b[0]).collect();
        assert_eq!(firsts, vec![1.7, 1.7, 1.7, 0.9, 2.5]);
        assert!(bins.iter().all(|b| b.len() == 1));
    }

    #[test]
    fn leftovers_go_to_documented_sheets() {
        let params: Vec<f64> = (0..7).map(|i| 0.5 + 0.1 * i as f64).collect();
        let bins = sheet_controls(&params);
        let lens: Vec<usize> = bins.iter().map(Vec::len).collect();
        assert_eq!(lens, vec![1, 1, 1, 2, 2]);
    }

    #[test]
    fn profile_spans_segments() {
        let ThicknessProfile::Banded(t) = profile(&[1.0, 2.0], 8) else {
            panic!("expected banded profile");
        };
        assert_eq!(t.len(), 8);
        assert_eq!(t[0], 1.0);
        assert_eq!(t[7], 2.0);
    }

    #[test]
    fn sheets_share_junction_nodes() {
        let spec = MeshSpec {
            topology: Topology::ThreePointBending,
            params: vec![1.5],
            h_level: 1,
            verbose: false,
        };
        let raw = ThreePointBendingBackend.generate(&spec).unwrap();
        // stations: top 13, webs 9 each, layer 13, bottom 13 minus 6 junctions
        assert_eq!(raw.nodes.len(), (13 + 9 + 13 + 9 + 13 - 6) * 81);
        assert_eq!(raw.parts.len(), 5);
        assert!(raw.node_sets.iter().all(|s| !s.nodes.is_empty()));
    }
}
