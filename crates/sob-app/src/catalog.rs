//! Registry of supported problems and the composition point of the pipeline.

use sob_core::{ProblemDefinition, Topology};
use sob_results::{ObjectiveReducer, ReductionContext, ResultsError, parse_metric};
use tracing::info;

use crate::config::RunnerOptions;
use crate::error::{AppError, AppResult};
use crate::evaluate::EvaluationFunction;

/// One registered topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProblemEntry {
    pub topology: Topology,
    /// Used when the caller names no metric.
    pub default_metric: &'static str,
    /// Metrics that are meaningless for this load case.
    pub forbidden_metrics: &'static [&'static str],
}

impl ProblemEntry {
    pub fn supports(&self, dimension: usize) -> bool {
        self.topology.dimensions().contains(&dimension)
    }

    pub fn forbids(&self, metric: &str) -> bool {
        let (name, _) = parse_metric(metric);
        self.forbidden_metrics.contains(&name)
    }
}

const REGISTRY: [ProblemEntry; 3] = [
    ProblemEntry {
        topology: Topology::StarBox,
        default_metric: "penalized_sea",
        forbidden_metrics: &["penalized_mass"],
    },
    ProblemEntry {
        topology: Topology::ThreePointBending,
        default_metric: "penalized_mass",
        forbidden_metrics: &["penalized_sea"],
    },
    ProblemEntry {
        topology: Topology::CrashTube,
        default_metric: "load_uniformity",
        forbidden_metrics: &[
            "penalized_sea",
            "penalized_mass",
            "absorbed_energy",
            "specific_energy_absorbed",
        ],
    },
];

/// Fixed registry of (topology, dimension) combinations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProblemCatalog;

impl ProblemCatalog {
    pub fn new() -> Self {
        Self
    }

    pub fn entries(&self) -> &'static [ProblemEntry] {
        &REGISTRY
    }

    /// Entry for a topology id, if that id and dimension are supported.
    pub fn entry(&self, topology_id: u32, dimension: usize) -> AppResult<&'static ProblemEntry> {
        REGISTRY
            .iter()
            .find(|e| e.topology.id() == topology_id && e.supports(dimension))
            .ok_or(AppError::UnsupportedProblem {
                topology: topology_id,
                dimension,
            })
    }

    /// Resolve and check a problem definition without building the pipeline.
    ///
    /// An empty metric list selects the topology's default metric.
    pub fn problem(
        &self,
        topology_id: u32,
        dimension: usize,
        metrics: &[String],
    ) -> AppResult<ProblemDefinition> {
        let entry = self.entry(topology_id, dimension)?;
        let metrics = if metrics.is_empty() {
            vec![entry.default_metric.to_string()]
        } else {
            metrics.to_vec()
        };
        let reducer = ObjectiveReducer::new(ReductionContext::default());
        for metric in &metrics {
            check_metric(entry, &reducer, metric)?;
        }
        Ok(ProblemDefinition::new(entry.topology, dimension, metrics)?)
    }

    /// Build the evaluation callable for one problem.
    ///
    /// Options are validated here, once; the returned function never
    /// re-reads them.
    pub fn get_problem(
        &self,
        topology_id: u32,
        dimension: usize,
        metrics: &[String],
        options: RunnerOptions,
        sequential_id_numbering: bool,
    ) -> AppResult<EvaluationFunction> {
        options.validate()?;
        let problem = self.problem(topology_id, dimension, metrics)?;
        info!(
            topology = %problem.topology,
            dimension,
            metrics = ?problem.metrics,
            sequential = sequential_id_numbering,
            "problem configured"
        );
        EvaluationFunction::new(problem, options, sequential_id_numbering)
    }
}

/// Forbidden or unregistered metrics are rejected before any run.
pub(crate) fn check_metric(
    entry: &ProblemEntry,
    reducer: &ObjectiveReducer,
    metric: &str,
) -> AppResult<()> {
    if entry.forbids(metric) {
        return Err(AppError::ForbiddenMetric {
            topology: entry.topology.to_string(),
            metric: metric.to_string(),
        });
    }
    if !reducer.is_registered(metric) {
        return Err(ResultsError::UnknownMetric {
            name: metric.to_string(),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_per_topology() {
        let catalog = ProblemCatalog::new();
        for (id, dim, expected) in [
            (1, 2, "penalized_sea"),
            (2, 5, "penalized_mass"),
            (3, 3, "load_uniformity"),
        ] {
            let p = catalog.problem(id, dim, &[]).unwrap();
            assert_eq!(p.metrics, vec![expected.to_string()]);
        }
    }

    #[test]
    fn unsupported_combinations() {
        let catalog = ProblemCatalog::new();
        for (id, dim) in [(0, 2), (4, 2), (1, 0), (1, 36), (2, 41), (3, 31)] {
            assert!(matches!(
                catalog.problem(id, dim, &[]),
                Err(AppError::UnsupportedProblem { .. })
            ));
        }
    }

    #[test]
    fn forbidden_metrics_rejected_with_arguments_too() {
        let catalog = ProblemCatalog::new();
        assert!(matches!(
            catalog.problem(1, 2, &metrics(&["penalized_mass"])),
            Err(AppError::ForbiddenMetric { .. })
        ));
        assert!(matches!(
            catalog.problem(3, 3, &metrics(&["intrusion", "absorbed_energy"])),
            Err(AppError::ForbiddenMetric { .. })
        ));
        assert!(catalog.problem(3, 3, &metrics(&["max_abs(impact_force)"])).is_ok());
    }

    #[test]
    fn unknown_metric_rejected() {
        let err = ProblemCatalog::new()
            .problem(2, 1, &metrics(&["stiffness"]))
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Results(ResultsError::UnknownMetric { .. })
        ));
    }

    #[test]
    fn invalid_options_rejected_before_pipeline() {
        let options = RunnerOptions {
            np: 0,
            open_radioss_main_path: std::env::temp_dir(),
            ..RunnerOptions::default()
        };
        assert!(matches!(
            ProblemCatalog::new().get_problem(1, 2, &[], options, false),
            Err(AppError::Config(_))
        ));
    }
}
