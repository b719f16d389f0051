//! Run directory allocation, persistence and cleanup.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use sob_core::{NumberingMode, RunId, RunIdentity, Topology, parse_run_dir_name, run_dir_name};
use sob_solver::raw_outputs;
use tracing::{debug, info, warn};

use crate::error::{ResultsError, ResultsResult};
use crate::record::EvaluationRecord;
use crate::signal::{SignalRecord, SignalSet};

/// Sequential allocation gives up after this many collisions.
pub const MAX_ALLOCATION_ATTEMPTS: usize = 128;

const RECORD_FILE: &str = "evaluation.json";
const SIGNALS_FILE: &str = "signals.jsonl";

/// What to delete once results are extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupPolicy {
    #[default]
    RetainAll,
    /// Remove raw time histories, animation frames and restart files.
    RemoveBinaries,
}

/// Allocates and persists run directories under one output root.
///
/// Clones share the set of directories currently in use, so an explicit id
/// that another evaluation still holds is refused instead of wiped.
/// Separate processes writing to the same root are not arbitrated.
#[derive(Debug, Clone)]
pub struct RunManager {
    output_root: PathBuf,
    cleanup: CleanupPolicy,
    active: Arc<Mutex<BTreeSet<PathBuf>>>,
}

impl RunManager {
    pub fn new(output_root: impl Into<PathBuf>) -> ResultsResult<Self> {
        let output_root = output_root.into();
        fs::create_dir_all(&output_root)?;
        Ok(Self {
            output_root,
            cleanup: CleanupPolicy::default(),
            active: Arc::default(),
        })
    }

    pub fn with_cleanup(mut self, cleanup: CleanupPolicy) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn cleanup_policy(&self) -> CleanupPolicy {
        self.cleanup
    }

    pub fn run_dir(&self, topology: Topology, run_id: RunId) -> PathBuf {
        self.output_root.join(run_dir_name(topology.slug(), run_id))
    }

    /// Claim a run directory until [`Self::release`].
    ///
    /// Explicit numbering uses `sim_id` verbatim and clears a stale directory
    /// of the same name; a directory still claimed by another evaluation is a
    /// `DirectoryAllocationConflict`. Sequential numbering ignores `sim_id`,
    /// takes the next unused id and relies on exclusive `create_dir` to
    /// arbitrate races.
    pub fn allocate(
        &self,
        topology: Topology,
        sim_id: u64,
        sequential: bool,
    ) -> ResultsResult<RunIdentity> {
        if sequential {
            self.allocate_sequential(topology)
        } else {
            self.allocate_explicit(topology, RunId::new(sim_id))
        }
    }

    /// Give up the claim taken by [`Self::allocate`]. Idempotent.
    pub fn release(&self, run: &RunIdentity) {
        self.active().remove(run.dir());
    }

    fn active(&self) -> MutexGuard<'_, BTreeSet<PathBuf>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn allocate_explicit(&self, topology: Topology, run_id: RunId) -> ResultsResult<RunIdentity> {
        let dir = self.run_dir(topology, run_id);
        let mut active = self.active();
        if active.contains(&dir) {
            warn!(%run_id, dir = %dir.display(), "run directory in use by another evaluation");
            return Err(ResultsError::DirectoryAllocationConflict { attempts: 1 });
        }
        if dir.exists() {
            warn!(dir = %dir.display(), "reusing run directory, previous contents removed");
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;
        active.insert(dir.clone());
        info!(%run_id, dir = %dir.display(), "run allocated");
        Ok(RunIdentity::new(run_id, dir, NumberingMode::Explicit))
    }

    fn allocate_sequential(&self, topology: Topology) -> ResultsResult<RunIdentity> {
        let mut run_id = self
            .existing_runs(topology)?
            .last()
            .map_or(RunId::new(1), |id| id.next());
        for attempt in 0..MAX_ALLOCATION_ATTEMPTS {
            let dir = self.run_dir(topology, run_id);
            match fs::create_dir(&dir) {
                Ok(()) => {
                    self.active().insert(dir.clone());
                    info!(%run_id, attempt, dir = %dir.display(), "run allocated");
                    return Ok(RunIdentity::new(run_id, dir, NumberingMode::Sequential));
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(%run_id, "run directory taken, trying next id");
                    run_id = run_id.next();
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(ResultsError::DirectoryAllocationConflict {
            attempts: MAX_ALLOCATION_ATTEMPTS,
        })
    }

    /// Ids of existing run directories for `topology`, ascending.
    pub fn existing_runs(&self, topology: Topology) -> ResultsResult<Vec<RunId>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.output_root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && let Some(id) = parse_run_dir_name(topology.slug(), name)
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Apply the cleanup policy; returns the number of files removed.
    pub fn cleanup(&self, run: &RunIdentity, base: &str) -> ResultsResult<usize> {
        if self.cleanup == CleanupPolicy::RetainAll {
            return Ok(0);
        }
        let mut doomed = raw_outputs(run.dir(), base, 'T')?;
        doomed.extend(raw_outputs(run.dir(), base, 'A')?);
        for entry in fs::read_dir(run.dir())? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "rst") {
                doomed.push(path);
            }
        }
        let mut removed = 0;
        for path in doomed {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(err) => warn!(path = %path.display(), error = %err, "cleanup failed"),
            }
        }
        debug!(run_id = %run.run_id, removed, "binary outputs removed");
        Ok(removed)
    }

    pub fn save_evaluation(
        &self,
        run: &RunIdentity,
        record: &EvaluationRecord,
        signals: &SignalSet,
    ) -> ResultsResult<()> {
        let record_json = serde_json::to_string_pretty(record)?;
        fs::write(run.file(RECORD_FILE), record_json)?;

        let mut lines = String::new();
        for signal in signals.to_records() {
            lines.push_str(&serde_json::to_string(&signal)?);
            lines.push('\n');
        }
        fs::write(run.file(SIGNALS_FILE), lines)?;
        Ok(())
    }

    pub fn load_evaluation(
        &self,
        topology: Topology,
        run_id: RunId,
    ) -> ResultsResult<(EvaluationRecord, SignalSet)> {
        load_evaluation_at(&self.run_dir(topology, run_id))
    }

    /// Records of every evaluated run of `topology`, by run id.
    pub fn list_evaluations(&self, topology: Topology) -> ResultsResult<Vec<EvaluationRecord>> {
        let mut records = Vec::new();
        for run_id in self.existing_runs(topology)? {
            let path = self.run_dir(topology, run_id).join(RECORD_FILE);
            if path.exists() {
                records.push(serde_json::from_str(&fs::read_to_string(path)?)?);
            }
        }
        Ok(records)
    }
}

/// Read `evaluation.json` and `signals.jsonl` from a run directory.
pub fn load_evaluation_at(dir: &Path) -> ResultsResult<(EvaluationRecord, SignalSet)> {
    let record_path = dir.join(RECORD_FILE);
    if !record_path.exists() {
        return Err(ResultsError::RunNotFound {
            dir: dir.to_path_buf(),
        });
    }
    let record: EvaluationRecord = serde_json::from_str(&fs::read_to_string(record_path)?)?;

    let signals_path = dir.join(SIGNALS_FILE);
    let mut records = Vec::new();
    if signals_path.exists() {
        for line in fs::read_to_string(signals_path)?.lines() {
            if !line.trim().is_empty() {
                records.push(serde_json::from_str::<SignalRecord>(line)?);
            }
        }
    }
    Ok((record, SignalSet::from_records(records)))
}
