use core::fmt;
use std::path::{Path, PathBuf};

/// Numeric run identifier, unique within one topology's output namespace.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RunId(u64);

impl RunId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Debug for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RunId({})", self.0)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RunId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// How a run directory name was chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum NumberingMode {
    /// Caller-supplied id used verbatim.
    Explicit,
    /// Next unused integer discovered under the output root.
    Sequential,
}

/// The id/directory pairing that isolates one evaluation's artifacts.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunIdentity {
    pub run_id: RunId,
    pub dir: PathBuf,
    pub numbering: NumberingMode,
}

impl RunIdentity {
    pub fn new(run_id: RunId, dir: impl Into<PathBuf>, numbering: NumberingMode) -> Self {
        Self {
            run_id,
            dir: dir.into(),
            numbering,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a file inside the run directory.
    pub fn file(&self, name: impl AsRef<Path>) -> PathBuf {
        self.dir.join(name)
    }
}

/// Directory name for a run: `<slug>_deck<id>`.
pub fn run_dir_name(slug: &str, run_id: RunId) -> String {
    format!("{slug}_deck{run_id}")
}

/// Inverse of [`run_dir_name`]; `None` if `name` is not a run directory of `slug`.
pub fn parse_run_dir_name(slug: &str, name: &str) -> Option<RunId> {
    let digits = name.strip_prefix(slug)?.strip_prefix("_deck")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u64>().ok().map(RunId)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_name_round_trip() {
        for raw in [1_u64, 7, 253, 10_000] {
            let name = run_dir_name("starbox", RunId::new(raw));
            assert_eq!(parse_run_dir_name("starbox", &name), Some(RunId::new(raw)));
        }
    }

    #[test]
    fn foreign_names_are_ignored() {
        assert_eq!(parse_run_dir_name("starbox", "crashtube_deck3"), None);
        assert_eq!(parse_run_dir_name("starbox", "starbox_deck"), None);
        assert_eq!(parse_run_dir_name("starbox", "starbox_deck12a"), None);
        assert_eq!(parse_run_dir_name("starbox", "starbox_deck-1"), None);
    }

    #[test]
    fn identity_resolves_files_inside_dir() {
        let run = RunIdentity::new(RunId::new(4), "/tmp/out/starbox_deck4", NumberingMode::Explicit);
        assert_eq!(
            run.file("combine.k"),
            PathBuf::from("/tmp/out/starbox_deck4/combine.k")
        );
    }
}
