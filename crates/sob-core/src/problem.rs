//! Problem topologies, problem definitions and design-vector mapping.

use core::fmt;
use std::ops::RangeInclusive;

use crate::error::{CoreError, CoreResult};
use crate::numeric::ensure_finite;

/// Structural topology a problem is built on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Topology {
    /// Star-shaped crash box hit by a moving rigid wall.
    StarBox,
    /// Hat-section beam loaded at mid-span.
    ThreePointBending,
    /// Rectangular crash tube with geometric triggers.
    CrashTube,
}

impl Topology {
    pub const ALL: [Topology; 3] = [
        Topology::StarBox,
        Topology::ThreePointBending,
        Topology::CrashTube,
    ];

    /// Public numeric id (1-based, stable).
    pub fn id(self) -> u32 {
        match self {
            Topology::StarBox => 1,
            Topology::ThreePointBending => 2,
            Topology::CrashTube => 3,
        }
    }

    pub fn from_id(id: u32) -> CoreResult<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.id() == id)
            .ok_or(CoreError::UnknownTopology(id))
    }

    /// Prefix of run directory names.
    pub fn slug(self) -> &'static str {
        match self {
            Topology::StarBox => "starbox",
            Topology::ThreePointBending => "threepointbending",
            Topology::CrashTube => "crashtube",
        }
    }

    /// Base name shared by decks, listings and time-history files.
    pub fn deck_base(self) -> &'static str {
        match self {
            Topology::StarBox | Topology::CrashTube => "combine",
            Topology::ThreePointBending => "ThreePointBending",
        }
    }

    /// Supported design-space dimensionalities.
    pub fn dimensions(self) -> RangeInclusive<usize> {
        match self {
            Topology::StarBox => 1..=35,
            Topology::ThreePointBending => 1..=40,
            Topology::CrashTube => 1..=30,
        }
    }

    /// Physical range of every design variable for `dimension`.
    ///
    /// Callers are expected to have checked `dimension` against
    /// [`Topology::dimensions`].
    pub fn variable_ranges(self, dimension: usize) -> Vec<(f64, f64)> {
        match self {
            Topology::StarBox => {
                const SIDE: (f64, f64) = (60.0, 120.0);
                const DEPTH: (f64, f64) = (0.0, 30.0);
                const THICKNESS: (f64, f64) = (0.7, 3.0);
                match dimension {
                    1 => vec![SIDE],
                    2 => vec![SIDE, SIDE],
                    3 => vec![SIDE, SIDE, THICKNESS],
                    4 => vec![SIDE, SIDE, DEPTH, DEPTH],
                    5 => vec![SIDE, SIDE, DEPTH, DEPTH, THICKNESS],
                    _ => {
                        let mut ranges = vec![SIDE, SIDE, DEPTH, DEPTH];
                        ranges.extend(std::iter::repeat_n(
                            THICKNESS,
                            dimension.saturating_sub(4),
                        ));
                        ranges
                    }
                }
            }
            Topology::ThreePointBending => vec![(0.5, 3.0); dimension],
            Topology::CrashTube => {
                // depth, position, height per trigger
                const PATTERN: [(f64, f64); 3] = [(-10.0, 10.0), (-4.0, 4.0), (0.0, 4.0)];
                (0..dimension).map(|i| PATTERN[i % 3]).collect()
            }
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Topology::StarBox => "StarBox",
            Topology::ThreePointBending => "ThreePointBending",
            Topology::CrashTube => "CrashTube",
        };
        write!(f, "{name}")
    }
}

/// Universal box every design variable is expressed in.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchSpace {
    pub lower: f64,
    pub upper: f64,
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self {
            lower: -5.0,
            upper: 5.0,
        }
    }
}

impl SearchSpace {
    pub fn contains(&self, value: f64) -> bool {
        (self.lower..=self.upper).contains(&value)
    }

    /// Affine map of a search-space value onto `range`.
    pub fn map(&self, value: f64, range: (f64, f64)) -> f64 {
        let (lower, upper) = range;
        let scale = (upper - lower) / (self.upper - self.lower);
        lower + (value - self.lower) * scale
    }
}

/// Ordered design variables of one evaluation, in search-space coordinates.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct DesignVector(Vec<f64>);

impl DesignVector {
    pub fn new(values: impl Into<Vec<f64>>) -> Self {
        Self(values.into())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f64>> for DesignVector {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

impl From<&[f64]> for DesignVector {
    fn from(values: &[f64]) -> Self {
        Self(values.to_vec())
    }
}

/// Upper-bounded constraint on a metric; its value is `metric - upper_limit`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Constraint {
    pub metric: String,
    pub upper_limit: f64,
}

/// Immutable description of one optimization problem.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProblemDefinition {
    pub topology: Topology,
    pub dimension: usize,
    pub metrics: Vec<String>,
    pub constraints: Vec<Constraint>,
    pub search_space: SearchSpace,
    variable_ranges: Vec<(f64, f64)>,
}

impl ProblemDefinition {
    pub fn new(
        topology: Topology,
        dimension: usize,
        metrics: Vec<String>,
    ) -> CoreResult<Self> {
        if !topology.dimensions().contains(&dimension) {
            return Err(CoreError::InvalidArg {
                what: "dimension is not supported by the topology",
            });
        }
        if metrics.is_empty() {
            return Err(CoreError::InvalidArg {
                what: "at least one metric is required",
            });
        }
        Ok(Self {
            topology,
            dimension,
            metrics,
            constraints: Vec::new(),
            search_space: SearchSpace::default(),
            variable_ranges: topology.variable_ranges(dimension),
        })
    }

    pub fn with_constraints(mut self, constraints: Vec<Constraint>) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn variable_ranges(&self) -> &[(f64, f64)] {
        &self.variable_ranges
    }

    /// Length check; performed before anything touches the filesystem.
    pub fn check_dimension(&self, design: &DesignVector) -> CoreResult<()> {
        if design.len() != self.dimension {
            return Err(CoreError::DimensionMismatch {
                expected: self.dimension,
                actual: design.len(),
            });
        }
        Ok(())
    }

    /// Maps a design vector to physical parameters, checking length,
    /// finiteness and search-space bounds.
    pub fn map_to_physical(&self, design: &DesignVector) -> CoreResult<Vec<f64>> {
        self.check_dimension(design)?;
        design
            .as_slice()
            .iter()
            .zip(&self.variable_ranges)
            .enumerate()
            .map(|(index, (&value, &range))| {
                let value = ensure_finite(value, index)?;
                if !self.search_space.contains(value) {
                    return Err(CoreError::OutOfSearchSpace {
                        index,
                        value,
                        lower: self.search_space.lower,
                        upper: self.search_space.upper,
                    });
                }
                Ok(self.search_space.map(value, range))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::{Tolerances, nearly_equal};
    use proptest::prelude::*;

    #[test]
    fn topology_ids_round_trip() {
        for t in Topology::ALL {
            assert_eq!(Topology::from_id(t.id()).unwrap(), t);
        }
        assert_eq!(Topology::from_id(9), Err(CoreError::UnknownTopology(9)));
    }

    #[test]
    fn star_box_ranges_grow_with_thickness_profile() {
        let ranges = Topology::StarBox.variable_ranges(8);
        assert_eq!(ranges.len(), 8);
        assert_eq!(ranges[0], (60.0, 120.0));
        assert_eq!(ranges[3], (0.0, 30.0));
        assert!(ranges[4..].iter().all(|&r| r == (0.7, 3.0)));
    }

    #[test]
    fn crash_tube_ranges_cycle() {
        let ranges = Topology::CrashTube.variable_ranges(5);
        assert_eq!(
            ranges,
            vec![(-10.0, 10.0), (-4.0, 4.0), (0.0, 4.0), (-10.0, 10.0), (-4.0, 4.0)]
        );
    }

    #[test]
    fn mapping_hits_range_ends() {
        let problem =
            ProblemDefinition::new(Topology::StarBox, 2, vec!["intrusion".into()]).unwrap();
        let phys = problem
            .map_to_physical(&DesignVector::new(vec![-5.0, 5.0]))
            .unwrap();
        assert_eq!(phys, vec![60.0, 120.0]);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let problem =
            ProblemDefinition::new(Topology::StarBox, 2, vec!["intrusion".into()]).unwrap();
        let err = problem
            .map_to_physical(&DesignVector::new(vec![0.0]))
            .unwrap_err();
        assert_eq!(
            err,
            CoreError::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn out_of_box_is_rejected() {
        let problem =
            ProblemDefinition::new(Topology::CrashTube, 3, vec!["intrusion".into()]).unwrap();
        let err = problem
            .map_to_physical(&DesignVector::new(vec![0.0, 5.5, 0.0]))
            .unwrap_err();
        assert!(matches!(err, CoreError::OutOfSearchSpace { index: 1, .. }));
    }

    #[test]
    fn unsupported_dimension_is_rejected() {
        assert!(ProblemDefinition::new(Topology::CrashTube, 31, vec!["mass".into()]).is_err());
        assert!(ProblemDefinition::new(Topology::StarBox, 0, vec!["mass".into()]).is_err());
    }

    proptest! {
        #[test]
        fn mapping_stays_inside_physical_range(x in -5.0_f64..=5.0, lo in -50.0_f64..50.0, width in 0.1_f64..100.0) {
            let space = SearchSpace::default();
            let hi = lo + width;
            let mapped = space.map(x, (lo, hi));
            let tol = Tolerances { abs: 1e-9, rel: 1e-9 };
            prop_assert!(mapped >= lo || nearly_equal(mapped, lo, tol));
            prop_assert!(mapped <= hi || nearly_equal(mapped, hi, tol));
        }
    }
}
