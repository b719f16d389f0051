//! Locations of the solver and converter binaries.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

const STARTER: &str = "starter_linux64_gf";
const ENGINE: &str = "engine_linux64_gf";
const TH_TO_CSV: &str = "th_to_csv_linux64_gf";
const ANIM_TO_VTK: &str = "anim_to_vtk_linux64_gf";

/// Stack size for OpenMP worker threads.
const KMP_STACKSIZE: &str = "400m";

/// Paths of the four external programs plus the install root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverExecutables {
    pub root: PathBuf,
    pub starter: PathBuf,
    pub engine: PathBuf,
    pub th_to_csv: PathBuf,
    pub anim_to_vtk: PathBuf,
}

impl SolverExecutables {
    /// Standard install layout: binaries under `<root>/exec/`.
    pub fn from_install_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let exec = root.join("exec");
        Self {
            starter: exec.join(STARTER),
            engine: exec.join(ENGINE),
            th_to_csv: exec.join(TH_TO_CSV),
            anim_to_vtk: exec.join(ANIM_TO_VTK),
            root,
        }
    }

    pub fn with_starter(mut self, path: impl Into<PathBuf>) -> Self {
        self.starter = path.into();
        self
    }

    pub fn with_engine(mut self, path: impl Into<PathBuf>) -> Self {
        self.engine = path.into();
        self
    }

    pub fn with_th_to_csv(mut self, path: impl Into<PathBuf>) -> Self {
        self.th_to_csv = path.into();
        self
    }

    pub fn with_anim_to_vtk(mut self, path: impl Into<PathBuf>) -> Self {
        self.anim_to_vtk = path.into();
        self
    }

    /// Environment every solver and converter process runs with.
    pub fn environment(&self, threads: u32) -> Vec<(&'static str, OsString)> {
        vec![
            ("OMP_NUM_THREADS", threads.to_string().into()),
            ("KMP_STACKSIZE", KMP_STACKSIZE.into()),
            ("RAD_CFG_PATH", self.root.join("hm_cfg_files").into_os_string()),
            (
                "RAD_H3D_PATH",
                self.root
                    .join("extlib")
                    .join("h3d")
                    .join("lib")
                    .join("linux64")
                    .into_os_string(),
            ),
        ]
    }

    pub fn all(&self) -> [(&'static str, &Path); 4] {
        [
            ("starter", self.starter.as_path()),
            ("engine", self.engine.as_path()),
            ("th_to_csv", self.th_to_csv.as_path()),
            ("anim_to_vtk", self.anim_to_vtk.as_path()),
        ]
    }
}
