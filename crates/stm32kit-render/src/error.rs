//! Rendering errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while rendering a project.
///
/// Rendering is staged entirely in memory, so any of these means nothing
/// was emitted.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template not found: {}", path.display())]
    MissingTemplate { path: PathBuf },

    #[error("{template}:{line}: no value for token '{token}'")]
    MissingToken {
        template: String,
        token: String,
        line: usize,
    },

    #[error("{template}:{line}: {detail}")]
    Syntax {
        template: String,
        line: usize,
        detail: String,
    },

    #[error("invalid render option: {detail}")]
    InvalidOption { detail: String },

    #[error("I/O error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result type for rendering operations.
pub type Result<T> = std::result::Result<T, RenderError>;
