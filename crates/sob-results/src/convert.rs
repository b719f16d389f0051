//! External converters: time history to CSV, animation frame to VTK.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use sob_solver::{ProcessExit, SolverExecutables, WaitLimits, run_to_completion, run_with_stdout};
use tracing::{debug, warn};

use crate::error::{ResultsError, ResultsResult};

const TH_TO_CSV: &str = "th_to_csv";
const ANIM_TO_VTK: &str = "anim_to_vtk";

#[derive(Debug, Clone)]
pub struct Converters {
    th_to_csv: PathBuf,
    anim_to_vtk: PathBuf,
    env: Vec<(&'static str, OsString)>,
    timeout: Option<Duration>,
}

impl Converters {
    pub fn from_executables(exe: &SolverExecutables) -> Self {
        Self {
            th_to_csv: exe.th_to_csv.clone(),
            anim_to_vtk: exe.anim_to_vtk.clone(),
            env: exe.environment(1),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// `<raw>` to `<raw>.csv`, written next to it.
    pub fn time_history_to_csv(&self, raw: &Path) -> ResultsResult<PathBuf> {
        let (dir, name) = split_path(raw, TH_TO_CSV)?;
        let csv = dir.join(format!("{name}.csv"));
        let log = dir.join(format!("{name}_{TH_TO_CSV}.log"));

        let mut cmd = Command::new(&self.th_to_csv);
        cmd.arg(&name).current_dir(&dir).envs(self.env.iter().cloned());
        let exit = run_to_completion(cmd, &log, self.limits());
        verify(TH_TO_CSV, exit, &csv)?;
        debug!(csv = %csv.display(), "time history converted");
        Ok(csv)
    }

    /// `<raw>` to `<raw>.vtk`; the converter writes the mesh to stdout.
    pub fn frame_to_vtk(&self, raw: &Path) -> ResultsResult<PathBuf> {
        let (dir, name) = split_path(raw, ANIM_TO_VTK)?;
        let vtk = dir.join(format!("{name}.vtk"));
        let log = dir.join(format!("{name}_{ANIM_TO_VTK}.log"));

        let mut cmd = Command::new(&self.anim_to_vtk);
        cmd.arg(&name).current_dir(&dir).envs(self.env.iter().cloned());
        let exit = run_with_stdout(cmd, &vtk, &log, self.limits());
        verify(ANIM_TO_VTK, exit, &vtk)?;
        Ok(vtk)
    }

    fn limits(&self) -> WaitLimits<'static> {
        WaitLimits {
            timeout: self.timeout,
            cancel: None,
        }
    }
}

fn split_path(raw: &Path, converter: &'static str) -> ResultsResult<(PathBuf, String)> {
    let name = raw
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ResultsError::ConversionFailed {
            converter,
            reason: format!("invalid input path {}", raw.display()),
        })?;
    let dir = raw
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    Ok((dir.to_path_buf(), name.to_string()))
}

/// Exit status and a non-empty product are both required.
fn verify(
    converter: &'static str,
    exit: std::io::Result<ProcessExit>,
    product: &Path,
) -> ResultsResult<()> {
    let failed = |reason: String| -> ResultsResult<()> {
        warn!(converter, product = %product.display(), %reason, "conversion failed");
        Err(ResultsError::ConversionFailed { converter, reason })
    };
    match exit {
        Ok(ProcessExit::Exited(status)) if status.success() => {}
        Ok(ProcessExit::Exited(status)) => return failed(format!("exited with {status}")),
        Ok(ProcessExit::TimedOut(after)) => {
            return failed(format!("timed out after {:.1}s", after.as_secs_f64()));
        }
        Ok(ProcessExit::Cancelled) => return failed("cancelled".into()),
        Err(err) => return failed(format!("could not run: {err}")),
    }
    match fs::metadata(product) {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => failed(format!("{} is empty", product.display())),
        Err(_) => failed(format!("{} was not written", product.display())),
    }
}
