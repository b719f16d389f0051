//! Solver outputs to a [`SignalSet`].

use std::fs;
use std::path::PathBuf;

use sob_solver::SolverOutcome;
use tracing::{debug, info};

use crate::convert::Converters;
use crate::error::{ResultsError, ResultsResult};
use crate::signal::{Sample, SignalSet, gradient, samples};
use crate::table::{Table, parse_number};

const MASS_BANNER: &str = "TOTAL MASS AND MASS CENTER";
/// The mass value sits this many lines below the banner.
const MASS_LINE_OFFSET: usize = 4;

/// Where a requested signal comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalSource {
    /// The `occurrence`-th time-history column whose header contains `key`.
    TimeHistory {
        key: String,
        occurrence: usize,
        /// Differentiate in time, for channels recorded as impulse.
        derivative: bool,
    },
    /// Starter-listing total mass minus `rigid_mass`, times `to_kg`.
    StarterMass { rigid_mass: f64, to_kg: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalRequest {
    pub name: String,
    pub source: SignalSource,
}

impl SignalRequest {
    pub fn column(name: impl Into<String>, key: impl Into<String>, occurrence: usize) -> Self {
        Self {
            name: name.into(),
            source: SignalSource::TimeHistory {
                key: key.into(),
                occurrence,
                derivative: false,
            },
        }
    }

    pub fn starter_mass(name: impl Into<String>, rigid_mass: f64, to_kg: f64) -> Self {
        Self {
            name: name.into(),
            source: SignalSource::StarterMass { rigid_mass, to_kg },
        }
    }

    /// Request the time derivative of a time-history column.
    pub fn differentiated(mut self) -> Self {
        if let SignalSource::TimeHistory { derivative, .. } = &mut self.source {
            *derivative = true;
        }
        self
    }

    fn needs_time_history(&self) -> bool {
        matches!(self.source, SignalSource::TimeHistory { .. })
    }
}

/// Converts raw solver output and parses the requested signals.
#[derive(Debug, Clone)]
pub struct ResultExtractor {
    converters: Converters,
    write_vtk: bool,
}

/// Extracted signals plus the files produced on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub signals: SignalSet,
    pub tables: Vec<PathBuf>,
    pub vtk_frames: Vec<PathBuf>,
}

impl ResultExtractor {
    pub fn new(converters: Converters) -> Self {
        Self {
            converters,
            write_vtk: false,
        }
    }

    pub fn with_vtk(mut self, write_vtk: bool) -> Self {
        self.write_vtk = write_vtk;
        self
    }

    pub fn extract(
        &self,
        outcome: &SolverOutcome,
        requests: &[SignalRequest],
    ) -> ResultsResult<SignalSet> {
        self.extract_all(outcome, requests).map(|e| e.signals)
    }

    /// Like [`Self::extract`], also reporting converted files.
    pub fn extract_all(
        &self,
        outcome: &SolverOutcome,
        requests: &[SignalRequest],
    ) -> ResultsResult<Extraction> {
        let Some(files) = outcome.outputs() else {
            return Err(ResultsError::SolverDidNotComplete {
                status: outcome.to_string(),
            });
        };

        let mut table_paths = Vec::new();
        let mut tables = Vec::new();
        if requests.iter().any(SignalRequest::needs_time_history) {
            for raw in &files.time_histories {
                let csv = self.converters.time_history_to_csv(raw)?;
                tables.push(Table::parse(&fs::read_to_string(&csv)?)?);
                table_paths.push(csv);
            }
        }

        let mut signals = SignalSet::new();
        for request in requests {
            let values = match &request.source {
                SignalSource::TimeHistory {
                    key,
                    occurrence,
                    derivative,
                } => {
                    let found = tables.iter().find_map(|t| {
                        t.column_matching(key, *occurrence)
                            .map(|col| samples(t.time(), col))
                    });
                    let s = found.ok_or_else(|| ResultsError::MissingSignal {
                        name: request.name.clone(),
                    })?;
                    if *derivative { gradient(&s) } else { s }
                }
                SignalSource::StarterMass { rigid_mass, to_kg } => {
                    let text = fs::read(&files.starter_listing)?;
                    let total = parse_total_mass(&String::from_utf8_lossy(&text)).ok_or_else(
                        || ResultsError::MissingSignal {
                            name: request.name.clone(),
                        },
                    )?;
                    vec![Sample {
                        t: 0.0,
                        v: (total - rigid_mass) * to_kg,
                    }]
                }
            };
            debug!(signal = %request.name, samples = values.len(), "signal extracted");
            signals.insert(request.name.clone(), values);
        }

        let mut vtk_frames = Vec::new();
        if self.write_vtk {
            for frame in &files.animation_frames {
                vtk_frames.push(self.converters.frame_to_vtk(frame)?);
            }
        }

        info!(
            signals = signals.len(),
            tables = table_paths.len(),
            vtk = vtk_frames.len(),
            "results extracted"
        );
        Ok(Extraction {
            signals,
            tables: table_paths,
            vtk_frames,
        })
    }
}

/// First token four lines below the mass banner of a starter listing.
pub fn parse_total_mass(listing: &str) -> Option<f64> {
    let lines: Vec<&str> = listing.lines().collect();
    let banner = lines.iter().position(|l| l.contains(MASS_BANNER))?;
    let line = lines.get(banner + MASS_LINE_OFFSET)?;
    parse_number(line.split_whitespace().next()?)
}
