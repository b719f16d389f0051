//! Solver output discovery and listing checks.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const NORMAL_TERMINATION: &str = "NORMAL TERMINATION";

/// Listing verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    Missing,
    Normal,
    Abnormal,
}

pub fn check_listing(path: &Path) -> io::Result<Listing> {
    match fs::read(path) {
        Ok(bytes) => {
            let text = String::from_utf8_lossy(&bytes);
            Ok(if text.contains(NORMAL_TERMINATION) {
                Listing::Normal
            } else {
                Listing::Abnormal
            })
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Listing::Missing),
        Err(err) => Err(err),
    }
}

/// Non-empty files named `<base><tag><digits>` with no extension, sorted.
///
/// `tag` is `T` for time histories and `A` for animation frames.
pub fn raw_outputs(dir: &Path, base: &str, tag: char) -> io::Result<Vec<PathBuf>> {
    let prefix = format!("{base}{tag}");
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(digits) = name.strip_prefix(&prefix) else {
            continue;
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        if entry.metadata()?.len() > 0 {
            found.push(entry.path());
        }
    }
    found.sort();
    Ok(found)
}
