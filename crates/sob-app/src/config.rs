//! Runner configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sob_mesh::MAX_H_LEVEL;
use sob_results::CleanupPolicy;
use sob_solver::SolverExecutables;

use crate::error::{AppError, AppResult};

const DEFAULT_STARTER_TIMEOUT_S: f64 = 600.0;

/// Explicit executable paths, each replacing the install-root default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutableOverrides {
    pub starter: Option<PathBuf>,
    pub engine: Option<PathBuf>,
    pub th_to_csv: Option<PathBuf>,
    pub anim_to_vtk: Option<PathBuf>,
}

/// Options shared by every evaluation of a problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerOptions {
    /// Solver install root; binaries live under `exec/`.
    pub open_radioss_main_path: PathBuf,
    /// Convert animation frames to VTK.
    pub write_vtk: bool,
    pub np: u32,
    pub nt: u32,
    /// Mesh refinement level, `1..=MAX_H_LEVEL`; element size halves per level.
    pub h_level: u32,
    /// 0 quiet, 1 verbose mesh backend.
    pub gmsh_verbosity: u8,
    /// Export the generated mesh as `mesh.vtk`.
    pub save_mesh_vtk: bool,
    /// Parent of all run directories.
    pub output_root: PathBuf,
    /// Wall-clock limit on the starter phase.
    pub starter_timeout_s: Option<f64>,
    pub engine_timeout_s: Option<f64>,
    /// Cores shared by concurrent evaluations.
    pub solver_slots: Option<usize>,
    pub cleanup: CleanupPolicy,
    pub executables: ExecutableOverrides,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            open_radioss_main_path: PathBuf::from("/opt/OpenRadioss"),
            write_vtk: false,
            np: 1,
            nt: 1,
            h_level: 1,
            gmsh_verbosity: 0,
            save_mesh_vtk: false,
            output_root: PathBuf::from("."),
            starter_timeout_s: Some(DEFAULT_STARTER_TIMEOUT_S),
            engine_timeout_s: None,
            solver_slots: None,
            cleanup: CleanupPolicy::RetainAll,
            executables: ExecutableOverrides::default(),
        }
    }
}

impl RunnerOptions {
    /// Load from YAML (`.yaml`, `.yml`) or JSON (`.json`).
    pub fn load(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AppError::ConfigFileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml_str(&content),
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| AppError::Config(format!("Failed to parse options JSON: {e}"))),
            _ => Err(AppError::Config(format!(
                "unrecognised options file extension: {}",
                path.display()
            ))),
        }
    }

    pub fn from_yaml_str(content: &str) -> AppResult<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse options YAML: {e}")))
    }

    pub fn validate(&self) -> AppResult<()> {
        let bad = |msg: String| Err(AppError::Config(msg));
        if self.np < 1 {
            return bad(format!("np must be at least 1, got {}", self.np));
        }
        if self.nt < 1 {
            return bad(format!("nt must be at least 1, got {}", self.nt));
        }
        if !(1..=MAX_H_LEVEL).contains(&self.h_level) {
            return bad(format!(
                "h_level must be between 1 and {MAX_H_LEVEL}, got {}",
                self.h_level
            ));
        }
        if self.gmsh_verbosity > 1 {
            return bad(format!(
                "gmsh_verbosity must be 0 or 1, got {}",
                self.gmsh_verbosity
            ));
        }
        if !self.open_radioss_main_path.exists() {
            return bad(format!(
                "open_radioss_main_path does not exist: {}",
                self.open_radioss_main_path.display()
            ));
        }
        timeout("starter_timeout_s", self.starter_timeout_s)?;
        timeout("engine_timeout_s", self.engine_timeout_s)?;
        if self.solver_slots == Some(0) {
            return bad("solver_slots must be at least 1".into());
        }
        Ok(())
    }

    pub fn solver_executables(&self) -> SolverExecutables {
        let mut exe = SolverExecutables::from_install_root(&self.open_radioss_main_path);
        let o = &self.executables;
        if let Some(p) = &o.starter {
            exe = exe.with_starter(p);
        }
        if let Some(p) = &o.engine {
            exe = exe.with_engine(p);
        }
        if let Some(p) = &o.th_to_csv {
            exe = exe.with_th_to_csv(p);
        }
        if let Some(p) = &o.anim_to_vtk {
            exe = exe.with_anim_to_vtk(p);
        }
        exe
    }

    /// `None` when unset or not representable; `validate` rejects the latter.
    pub fn starter_timeout(&self) -> Option<Duration> {
        timeout("starter_timeout_s", self.starter_timeout_s).ok().flatten()
    }

    pub fn engine_timeout(&self) -> Option<Duration> {
        timeout("engine_timeout_s", self.engine_timeout_s).ok().flatten()
    }
}

fn timeout(name: &str, seconds: Option<f64>) -> AppResult<Option<Duration>> {
    let Some(t) = seconds else {
        return Ok(None);
    };
    match Duration::try_from_secs_f64(t) {
        Ok(d) if !d.is_zero() => Ok(Some(d)),
        _ => Err(AppError::Config(format!(
            "{name} must be a positive number of seconds, got {t}"
        ))),
    }
}
