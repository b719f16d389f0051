use std::path::PathBuf;

use thiserror::Error;

pub type DeckResult<T> = Result<T, DeckError>;

#[derive(Error, Debug)]
pub enum DeckError {
    /// Mesh and template disagree on entity ids.
    #[error("Template mismatch: {what}")]
    TemplateMismatch { what: String },

    #[error("Failed to write deck file: {path}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl DeckError {
    pub(crate) fn mismatch(what: impl Into<String>) -> Self {
        DeckError::TemplateMismatch { what: what.into() }
    }
}
