//! The evaluation callable: design vector in, objectives out.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Instant;

use sob_core::{Constraint, DesignVector, ProblemDefinition, RunId, RunIdentity};
use sob_deck::{DeckTemplate, ForceChannel, InputDeckWriter};
use sob_mesh::{MeshBuilder, export_vtk};
use sob_results::{
    Converters, EvaluationRecord, ObjectiveReducer, ReductionContext, ResultExtractor,
    ResultsError, RunManager, SignalRequest, SignalSet, design_fingerprint, names,
};
use sob_solver::{
    CancelToken, Phases, SlotPool, SolverDriver, SolverExecutables, SolverInvocation,
    SolverOutcome,
};
use tracing::{info, warn};

use crate::catalog::{ProblemCatalog, check_metric};
use crate::config::RunnerOptions;
use crate::error::{AppError, AppResult};
use crate::progress::{EvaluationProgress, EvaluationStage};

const MESH_VTK: &str = "mesh.vtk";

/// Outcome of one evaluation.
///
/// A solver that did not complete still yields a result: `solver` carries
/// the failure and `objectives` is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    pub evaluation_id: String,
    pub run: RunIdentity,
    pub metrics: Vec<String>,
    pub objectives: Vec<f64>,
    /// `metric - upper_limit` per constraint; feasible when `<= 0`.
    pub constraints: Vec<f64>,
    pub signals: SignalSet,
    pub solver: SolverOutcome,
    /// Converted time-history tables.
    pub tables: Vec<PathBuf>,
    pub vtk_frames: Vec<PathBuf>,
    pub design_fingerprint: String,
    pub elapsed_s: f64,
}

impl EvaluationResult {
    pub fn succeeded(&self) -> bool {
        self.solver.is_success()
    }

    /// First objective.
    pub fn objective(&self) -> Option<f64> {
        self.objectives.first().copied()
    }

    /// First objective, or `penalty` if the run failed or produced a non-finite value.
    pub fn objective_or(&self, penalty: f64) -> f64 {
        self.objective().filter(|v| v.is_finite()).unwrap_or(penalty)
    }

    pub fn is_feasible(&self) -> bool {
        self.succeeded() && self.constraints.iter().all(|c| *c <= 0.0)
    }
}

/// Mesh → deck → solver → extraction → reduction behind one call.
///
/// Holds no per-evaluation state, so one instance may be shared by many
/// worker threads; each call gets its own run directory.
#[derive(Debug, Clone)]
pub struct EvaluationFunction {
    problem: ProblemDefinition,
    options: RunnerOptions,
    sequential: bool,
    template: DeckTemplate,
    mesh_builder: MeshBuilder,
    mesh_version: u32,
    deck_writer: InputDeckWriter,
    executables: SolverExecutables,
    driver: SolverDriver,
    extractor: ResultExtractor,
    reducer: ObjectiveReducer,
    requests: Vec<SignalRequest>,
    phases: Phases,
    runs: RunManager,
}

impl EvaluationFunction {
    /// Wire the pipeline for an already validated problem and options.
    pub(crate) fn new(
        problem: ProblemDefinition,
        options: RunnerOptions,
        sequential: bool,
    ) -> AppResult<Self> {
        let template = DeckTemplate::for_topology(problem.topology);
        let executables = options.solver_executables();
        let mesh_builder = MeshBuilder::default()
            .with_h_level(options.h_level)
            .with_verbose(options.gmsh_verbosity > 0);
        let mesh_version = mesh_builder.registry().get(problem.topology)?.version();
        let reducer = ObjectiveReducer::new(ReductionContext {
            units: template.units,
            intrusion_offset: template.impactor.offset,
        });
        let driver = match options.solver_slots {
            Some(capacity) => SolverDriver::with_slots(SlotPool::new(capacity)),
            None => SolverDriver::new(),
        };
        let converters =
            Converters::from_executables(&executables).with_timeout(options.engine_timeout());
        let extractor = ResultExtractor::new(converters).with_vtk(options.write_vtk);
        let runs = RunManager::new(&options.output_root)?.with_cleanup(options.cleanup);

        let mut function = Self {
            deck_writer: InputDeckWriter::with_template(template.clone()),
            problem,
            options,
            sequential,
            template,
            mesh_builder,
            mesh_version,
            executables,
            driver,
            extractor,
            reducer,
            requests: Vec::new(),
            phases: Phases::Full,
            runs,
        };
        function.plan_signals()?;
        Ok(function)
    }

    /// Attach upper-bounded constraints, checked like objectives.
    pub fn with_constraints(mut self, constraints: Vec<Constraint>) -> AppResult<Self> {
        let entry = ProblemCatalog::new().entry(self.problem.topology.id(), self.problem.dimension)?;
        for c in &constraints {
            check_metric(entry, &self.reducer, &c.metric)?;
        }
        self.problem = self.problem.with_constraints(constraints);
        self.plan_signals()?;
        Ok(self)
    }

    /// Share a slot pool with other evaluation functions.
    pub fn with_slot_pool(mut self, pool: SlotPool) -> Self {
        self.driver = SolverDriver::with_slots(pool);
        self
    }

    pub fn problem(&self) -> &ProblemDefinition {
        &self.problem
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    pub fn run_manager(&self) -> &RunManager {
        &self.runs
    }

    /// Whether the engine phase is skipped for this problem.
    pub fn is_starter_only(&self) -> bool {
        self.phases == Phases::StarterOnly
    }

    pub fn evaluate(&self, design: &DesignVector, sim_id: u64) -> AppResult<EvaluationResult> {
        self.evaluate_with(design, sim_id, None, None)
    }

    pub fn evaluate_with_progress(
        &self,
        design: &DesignVector,
        sim_id: u64,
        progress_cb: Option<&mut dyn FnMut(EvaluationProgress)>,
    ) -> AppResult<EvaluationResult> {
        self.evaluate_with(design, sim_id, None, progress_cb)
    }

    /// Full form: optional cancellation and progress reporting.
    ///
    /// `sim_id` names the run directory under explicit numbering and is
    /// ignored under sequential numbering.
    pub fn evaluate_with(
        &self,
        design: &DesignVector,
        sim_id: u64,
        cancel: Option<&CancelToken>,
        mut progress_cb: Option<&mut dyn FnMut(EvaluationProgress)>,
    ) -> AppResult<EvaluationResult> {
        let started = Instant::now();

        emit_progress(&mut progress_cb, EvaluationStage::Meshing, started, None, None);
        let mesh = self.mesh_builder.build(&self.problem, design)?;

        emit_progress(&mut progress_cb, EvaluationStage::AllocatingRun, started, None, None);
        let run = self.runs.allocate(self.problem.topology, sim_id, self.sequential)?;
        let _claim = RunClaim {
            runs: &self.runs,
            run: run.clone(),
        };
        let run_id = Some(run.run_id);
        if self.options.save_mesh_vtk {
            export_vtk(&mesh, &run.file(MESH_VTK))?;
        }

        emit_progress(&mut progress_cb, EvaluationStage::WritingDeck, started, run_id, None);
        let decks = self.deck_writer.write(&mesh, &self.problem, &run)?;

        emit_progress(&mut progress_cb, EvaluationStage::RunningSolver, started, run_id, None);
        let mut invocation = SolverInvocation::new(self.executables.clone(), run.dir(), run.run_id)
            .with_resources(self.options.np, self.options.nt)
            .with_starter_timeout(self.options.starter_timeout())
            .with_engine_timeout(self.options.engine_timeout())
            .with_phases(self.phases);
        if let Some(token) = cancel {
            invocation = invocation.with_cancel(token.clone());
        }
        let solver = self.driver.run(&decks, &invocation);

        let mut result = EvaluationResult {
            evaluation_id: uuid::Uuid::new_v4().to_string(),
            metrics: self.problem.metrics.clone(),
            objectives: Vec::new(),
            constraints: Vec::new(),
            signals: SignalSet::new(),
            tables: Vec::new(),
            vtk_frames: Vec::new(),
            design_fingerprint: design_fingerprint(self.problem.topology, design, self.mesh_version),
            elapsed_s: 0.0,
            solver,
            run,
        };

        if !result.succeeded() {
            warn!(
                run_id = %result.run.run_id,
                status = result.solver.status(),
                "solver did not complete: {}",
                result.solver
            );
            result.elapsed_s = started.elapsed().as_secs_f64();
            self.save(design, &result)?;
            emit_progress(
                &mut progress_cb,
                EvaluationStage::Completed,
                started,
                run_id,
                Some(result.solver.to_string()),
            );
            return Ok(result);
        }

        emit_progress(&mut progress_cb, EvaluationStage::ExtractingResults, started, run_id, None);
        let extraction = self.extractor.extract_all(&result.solver, &self.requests)?;

        emit_progress(&mut progress_cb, EvaluationStage::Reducing, started, run_id, None);
        result.objectives = self
            .reducer
            .reduce_all(&extraction.signals, &self.problem.metrics)?;
        result.constraints = self
            .problem
            .constraints
            .iter()
            .map(|c| Ok(self.reducer.reduce(&extraction.signals, &c.metric)? - c.upper_limit))
            .collect::<AppResult<Vec<f64>>>()?;
        result.signals = extraction.signals;
        result.tables = extraction.tables;
        result.vtk_frames = extraction.vtk_frames;

        emit_progress(&mut progress_cb, EvaluationStage::SavingResults, started, run_id, None);
        result.elapsed_s = started.elapsed().as_secs_f64();
        self.save(design, &result)?;
        self.runs.cleanup(&result.run, &decks.base)?;

        info!(
            run_id = %result.run.run_id,
            objectives = ?result.objectives,
            elapsed_s = result.elapsed_s,
            "evaluation complete"
        );
        emit_progress(&mut progress_cb, EvaluationStage::Completed, started, run_id, None);
        Ok(result)
    }

    fn save(&self, design: &DesignVector, result: &EvaluationResult) -> AppResult<()> {
        let record = EvaluationRecord {
            evaluation_id: result.evaluation_id.clone(),
            run_id: result.run.run_id,
            numbering: result.run.numbering,
            topology: self.problem.topology,
            dimension: self.problem.dimension,
            design: design.as_slice().to_vec(),
            design_fingerprint: result.design_fingerprint.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            metrics: result.metrics.clone(),
            objectives: result.objectives.clone(),
            constraints: result.constraints.clone(),
            solver_status: result.solver.status().to_string(),
            solver_message: (!result.succeeded()).then(|| result.solver.to_string()),
            elapsed_s: result.elapsed_s,
        };
        self.runs.save_evaluation(&result.run, &record, &result.signals)?;
        Ok(())
    }

    /// Map the signals every metric and constraint reads onto deck output
    /// columns; decide whether the engine is needed at all.
    fn plan_signals(&mut self) -> AppResult<()> {
        let mut needed = BTreeSet::new();
        let metrics = self
            .problem
            .metrics
            .iter()
            .chain(self.problem.constraints.iter().map(|c| &c.metric));
        for metric in metrics {
            needed.extend(self.reducer.required_signals(metric)?);
        }

        self.requests = needed
            .iter()
            .map(|name| signal_request(&self.template, name))
            .collect::<AppResult<Vec<_>>>()?;
        self.phases = if needed.iter().all(|s| s == names::MASS) {
            Phases::StarterOnly
        } else {
            Phases::Full
        };
        Ok(())
    }
}

/// Holds the run directory until the evaluation returns, on every path.
struct RunClaim<'a> {
    runs: &'a RunManager,
    run: RunIdentity,
}

impl Drop for RunClaim<'_> {
    fn drop(&mut self) {
        self.runs.release(&self.run);
    }
}

fn signal_request(template: &DeckTemplate, name: &str) -> AppResult<SignalRequest> {
    let request = match name {
        names::INTRUSION => {
            let column = template.track_column();
            SignalRequest::column(name, column.key, column.occurrence)
        }
        names::IMPACT_FORCE => {
            let column = template.force_column();
            let request = SignalRequest::column(name, column.key, column.occurrence);
            match template.force_channel {
                ForceChannel::Impulse => request.differentiated(),
                ForceChannel::Force => request,
            }
        }
        names::MASS => {
            SignalRequest::starter_mass(name, template.rigid_mass(), template.units.mass_to_kg())
        }
        _ => {
            return Err(AppError::Results(ResultsError::MissingSignal {
                name: name.to_string(),
            }));
        }
    };
    Ok(request)
}

fn emit_progress(
    progress_cb: &mut Option<&mut dyn FnMut(EvaluationProgress)>,
    stage: EvaluationStage,
    started: Instant,
    run_id: Option<RunId>,
    message: Option<String>,
) {
    if let Some(cb) = progress_cb.as_deref_mut() {
        cb(EvaluationProgress {
            stage,
            run_id,
            elapsed_wall_s: started.elapsed().as_secs_f64(),
            message,
        });
    }
}
