//! One solver execution's resources and paths.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sob_core::RunId;

use crate::cancel::CancelToken;
use crate::error::{SolverError, SolverResult};
use crate::executables::SolverExecutables;

/// Which phases to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phases {
    #[default]
    Full,
    /// Starter only, for metrics read from the starter listing.
    StarterOnly,
}

#[derive(Debug, Clone)]
pub struct SolverInvocation {
    pub executables: SolverExecutables,
    pub np: u32,
    pub nt: u32,
    pub working_dir: PathBuf,
    pub run_id: RunId,
    pub starter_timeout: Option<Duration>,
    pub engine_timeout: Option<Duration>,
    pub phases: Phases,
    pub cancel: Option<CancelToken>,
}

impl SolverInvocation {
    pub fn new(
        executables: SolverExecutables,
        working_dir: impl Into<PathBuf>,
        run_id: RunId,
    ) -> Self {
        Self {
            executables,
            np: 1,
            nt: 1,
            working_dir: working_dir.into(),
            run_id,
            starter_timeout: None,
            engine_timeout: None,
            phases: Phases::Full,
            cancel: None,
        }
    }

    pub fn with_resources(mut self, np: u32, nt: u32) -> Self {
        self.np = np;
        self.nt = nt;
        self
    }

    pub fn with_starter_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.starter_timeout = timeout;
        self
    }

    pub fn with_engine_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.engine_timeout = timeout;
        self
    }

    /// Starter-only runs always use a single process and thread.
    pub fn with_phases(mut self, phases: Phases) -> Self {
        self.phases = phases;
        if phases == Phases::StarterOnly {
            self.np = 1;
            self.nt = 1;
        }
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Cores this invocation occupies while running.
    pub fn weight(&self) -> usize {
        (self.np as usize).saturating_mul(self.nt as usize).max(1)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    pub fn validate(&self) -> SolverResult<()> {
        if self.np == 0 || self.nt == 0 {
            return Err(SolverError::InvalidInvocation {
                what: format!("np and nt must be at least 1 (np={}, nt={})", self.np, self.nt),
            });
        }
        for (phase, timeout) in [("starter", self.starter_timeout), ("engine", self.engine_timeout)] {
            if timeout.is_some_and(|t| t.is_zero()) {
                return Err(SolverError::InvalidInvocation {
                    what: format!("{phase} timeout must be positive"),
                });
            }
        }
        if !self.working_dir.is_dir() {
            return Err(SolverError::MissingWorkingDir(self.working_dir.clone()));
        }
        Ok(())
    }

    /// `-i <deck> -np <np> -nt <nt>`
    pub(crate) fn arguments(&self, deck: &Path) -> Vec<std::ffi::OsString> {
        vec![
            "-i".into(),
            deck_argument(&self.working_dir, deck),
            "-np".into(),
            self.np.to_string().into(),
            "-nt".into(),
            self.nt.to_string().into(),
        ]
    }
}

/// Decks inside the working directory are passed by file name.
fn deck_argument(working_dir: &Path, deck: &Path) -> std::ffi::OsString {
    match (deck.parent(), deck.file_name()) {
        (Some(parent), Some(name)) if parent == working_dir => name.to_os_string(),
        _ => deck.as_os_str().to_os_string(),
    }
}
