//! Typed results of a solver run.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Starter,
    Engine,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Phase::Starter => "starter",
            Phase::Engine => "engine",
        }
    }

    /// `<base>_0000.out` or `<base>_0001.out`.
    pub fn listing(self, dir: &Path, base: &str) -> PathBuf {
        let suffix = match self {
            Phase::Starter => "0000",
            Phase::Engine => "0001",
        };
        dir.join(format!("{base}_{suffix}.out"))
    }

    pub fn log(self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.log", self.name()))
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The process finished but the listing reports no normal termination.
    NonConvergence,
    /// Non-zero exit or killed by a signal.
    Crash { code: Option<i32> },
    /// The executable could not be started.
    Launch { message: String },
}

/// Files a successful run left in the working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFiles {
    pub dir: PathBuf,
    pub base: String,
    pub starter_listing: PathBuf,
    /// `None` for starter-only runs.
    pub engine_listing: Option<PathBuf>,
    /// Raw time-history files, `<base>T01`, ...
    pub time_histories: Vec<PathBuf>,
    /// Raw animation frames, `<base>A001`, ...
    pub animation_frames: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverOutcome {
    Success(OutputFiles),
    SolverFailure {
        phase: Phase,
        reason: FailureReason,
        log: PathBuf,
    },
    Timeout {
        phase: Phase,
        after: Duration,
    },
    MissingOutput {
        phase: Phase,
        expected: PathBuf,
    },
    Cancelled {
        phase: Phase,
    },
}

impl SolverOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SolverOutcome::Success(_))
    }

    pub fn outputs(&self) -> Option<&OutputFiles> {
        match self {
            SolverOutcome::Success(files) => Some(files),
            _ => None,
        }
    }

    /// Short machine-readable status.
    pub fn status(&self) -> &'static str {
        match self {
            SolverOutcome::Success(_) => "success",
            SolverOutcome::SolverFailure {
                reason: FailureReason::NonConvergence,
                ..
            } => "non_convergence",
            SolverOutcome::SolverFailure {
                reason: FailureReason::Crash { .. },
                ..
            } => "crash",
            SolverOutcome::SolverFailure {
                reason: FailureReason::Launch { .. },
                ..
            } => "launch_failed",
            SolverOutcome::Timeout { .. } => "timeout",
            SolverOutcome::MissingOutput { .. } => "missing_output",
            SolverOutcome::Cancelled { .. } => "cancelled",
        }
    }
}

impl fmt::Display for SolverOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverOutcome::Success(files) => write!(f, "success in {}", files.dir.display()),
            SolverOutcome::SolverFailure { phase, reason, log } => match reason {
                FailureReason::NonConvergence => write!(
                    f,
                    "{phase} did not terminate normally (see {})",
                    log.display()
                ),
                FailureReason::Crash { code: Some(code) } => {
                    write!(f, "{phase} exited with code {code} (see {})", log.display())
                }
                FailureReason::Crash { code: None } => {
                    write!(f, "{phase} killed by a signal (see {})", log.display())
                }
                FailureReason::Launch { message } => {
                    write!(f, "{phase} could not be launched: {message}")
                }
            },
            SolverOutcome::Timeout { phase, after } => {
                write!(f, "{phase} timed out after {:.1}s", after.as_secs_f64())
            }
            SolverOutcome::MissingOutput { phase, expected } => {
                write!(f, "{phase} did not produce {}", expected.display())
            }
            SolverOutcome::Cancelled { phase } => write!(f, "{phase} cancelled"),
        }
    }
}
