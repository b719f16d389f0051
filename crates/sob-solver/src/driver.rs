//! Two-phase starter/engine state machine.

use std::path::Path;
use std::process::Command;
use std::time::Instant;

use sob_deck::DeckSet;
use tracing::{debug, info, warn};

use crate::invocation::{Phases, SolverInvocation};
use crate::listing::{Listing, check_listing, raw_outputs};
use crate::outcome::{FailureReason, OutputFiles, Phase, SolverOutcome};
use crate::process::{ProcessExit, WaitLimits, run_to_completion};
use crate::slots::SlotPool;

/// States a run passes through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Pending,
    StarterRunning,
    StarterOk,
    StarterFailed,
    EngineRunning,
    EngineOk,
    EngineFailed,
    EngineTimeout,
    Cancelled,
}

/// Runs the starter and then the engine, never retrying.
///
/// With a slot pool, the invocation's `np * nt` cores are held from before
/// the starter until the engine has terminated.
#[derive(Debug, Clone, Default)]
pub struct SolverDriver {
    slots: Option<SlotPool>,
}

impl SolverDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slots(pool: SlotPool) -> Self {
        Self { slots: Some(pool) }
    }

    pub fn slots(&self) -> Option<&SlotPool> {
        self.slots.as_ref()
    }

    pub fn run(&self, decks: &DeckSet, invocation: &SolverInvocation) -> SolverOutcome {
        self.run_traced(decks, invocation).0
    }

    /// Like [`Self::run`], also returning the visited states.
    pub fn run_traced(
        &self,
        decks: &DeckSet,
        invocation: &SolverInvocation,
    ) -> (SolverOutcome, Vec<DriverState>) {
        let mut trace = vec![DriverState::Pending];

        if let Err(err) = invocation.validate() {
            trace.push(DriverState::StarterFailed);
            let outcome = SolverOutcome::SolverFailure {
                phase: Phase::Starter,
                reason: FailureReason::Launch {
                    message: err.to_string(),
                },
                log: Phase::Starter.log(&invocation.working_dir),
            };
            return (outcome, trace);
        }

        let _slots = self
            .slots
            .as_ref()
            .map(|pool| pool.acquire(invocation.weight()));

        trace.push(DriverState::StarterRunning);
        if let Err(outcome) = run_phase(Phase::Starter, &decks.starter, &decks.base, invocation) {
            trace.push(failed_state(Phase::Starter, &outcome));
            return (outcome, trace);
        }
        trace.push(DriverState::StarterOk);

        let dir = &invocation.working_dir;
        let mut files = OutputFiles {
            dir: dir.clone(),
            base: decks.base.clone(),
            starter_listing: Phase::Starter.listing(dir, &decks.base),
            engine_listing: None,
            time_histories: Vec::new(),
            animation_frames: Vec::new(),
        };
        if invocation.phases == Phases::StarterOnly {
            info!(run_id = %invocation.run_id, "starter-only run complete");
            return (SolverOutcome::Success(files), trace);
        }

        trace.push(DriverState::EngineRunning);
        if let Err(outcome) = run_phase(Phase::Engine, &decks.engine, &decks.base, invocation) {
            trace.push(failed_state(Phase::Engine, &outcome));
            return (outcome, trace);
        }

        match collect_engine_outputs(dir, &decks.base) {
            Ok((th, anim)) if !th.is_empty() => {
                files.engine_listing = Some(Phase::Engine.listing(dir, &decks.base));
                files.time_histories = th;
                files.animation_frames = anim;
            }
            Ok(_) => {
                let expected = dir.join(format!("{}T01", decks.base));
                warn!(run_id = %invocation.run_id, expected = %expected.display(), "engine wrote no time history");
                trace.push(DriverState::EngineFailed);
                return (
                    SolverOutcome::MissingOutput {
                        phase: Phase::Engine,
                        expected,
                    },
                    trace,
                );
            }
            Err(err) => {
                warn!(run_id = %invocation.run_id, error = %err, "cannot list engine outputs");
                trace.push(DriverState::EngineFailed);
                return (
                    SolverOutcome::MissingOutput {
                        phase: Phase::Engine,
                        expected: dir.clone(),
                    },
                    trace,
                );
            }
        }
        trace.push(DriverState::EngineOk);
        info!(
            run_id = %invocation.run_id,
            time_histories = files.time_histories.len(),
            frames = files.animation_frames.len(),
            "solver run complete"
        );
        (SolverOutcome::Success(files), trace)
    }
}

fn failed_state(phase: Phase, outcome: &SolverOutcome) -> DriverState {
    match (phase, outcome) {
        (_, SolverOutcome::Cancelled { .. }) => DriverState::Cancelled,
        (Phase::Starter, _) => DriverState::StarterFailed,
        (Phase::Engine, SolverOutcome::Timeout { .. }) => DriverState::EngineTimeout,
        (Phase::Engine, _) => DriverState::EngineFailed,
    }
}

fn collect_engine_outputs(
    dir: &Path,
    base: &str,
) -> std::io::Result<(Vec<std::path::PathBuf>, Vec<std::path::PathBuf>)> {
    Ok((raw_outputs(dir, base, 'T')?, raw_outputs(dir, base, 'A')?))
}

/// Run one phase and confirm it through its listing.
fn run_phase(
    phase: Phase,
    deck: &Path,
    base: &str,
    inv: &SolverInvocation,
) -> Result<(), SolverOutcome> {
    let exe = match phase {
        Phase::Starter => &inv.executables.starter,
        Phase::Engine => &inv.executables.engine,
    };
    let log = phase.log(&inv.working_dir);

    let mut cmd = Command::new(exe);
    cmd.args(inv.arguments(deck))
        .current_dir(&inv.working_dir)
        .envs(inv.executables.environment(inv.nt));
    debug!(phase = %phase, command = ?cmd, "launching");
    info!(run_id = %inv.run_id, phase = %phase, np = inv.np, nt = inv.nt, "phase started");

    let limits = WaitLimits {
        timeout: match phase {
            Phase::Starter => inv.starter_timeout,
            Phase::Engine => inv.engine_timeout,
        },
        cancel: inv.cancel.as_ref(),
    };
    let started = Instant::now();
    let exit = run_to_completion(cmd, &log, limits);
    let elapsed = started.elapsed();

    let status = match exit {
        Ok(ProcessExit::Exited(status)) => status,
        Ok(ProcessExit::TimedOut(after)) => {
            warn!(run_id = %inv.run_id, phase = %phase, after_s = after.as_secs_f64(), "phase timed out, process killed");
            return Err(SolverOutcome::Timeout { phase, after });
        }
        Ok(ProcessExit::Cancelled) => {
            warn!(run_id = %inv.run_id, phase = %phase, "phase cancelled");
            return Err(SolverOutcome::Cancelled { phase });
        }
        Err(err) => {
            warn!(run_id = %inv.run_id, phase = %phase, exe = %exe.display(), error = %err, "launch failed");
            return Err(SolverOutcome::SolverFailure {
                phase,
                reason: FailureReason::Launch {
                    message: format!("{}: {err}", exe.display()),
                },
                log,
            });
        }
    };

    if !status.success() {
        warn!(run_id = %inv.run_id, phase = %phase, code = ?status.code(), "phase exited with failure");
        return Err(SolverOutcome::SolverFailure {
            phase,
            reason: FailureReason::Crash {
                code: status.code(),
            },
            log,
        });
    }

    // exit status alone is not trusted
    let listing = phase.listing(&inv.working_dir, base);
    match check_listing(&listing) {
        Ok(Listing::Normal) => {
            info!(run_id = %inv.run_id, phase = %phase, elapsed_s = elapsed.as_secs_f64(), "phase finished");
            Ok(())
        }
        Ok(Listing::Abnormal) => {
            warn!(run_id = %inv.run_id, phase = %phase, listing = %listing.display(), "no normal termination");
            Err(SolverOutcome::SolverFailure {
                phase,
                reason: FailureReason::NonConvergence,
                log: listing,
            })
        }
        Ok(Listing::Missing) | Err(_) => {
            warn!(run_id = %inv.run_id, phase = %phase, listing = %listing.display(), "listing missing");
            Err(SolverOutcome::MissingOutput {
                phase,
                expected: listing,
            })
        }
    }
}
