//! Project reconciler error types.

use std::path::PathBuf;

use stm32kit_profile::ProfileError;
use stm32kit_render::RenderError;

/// Errors that can occur while creating, opening, or regenerating a project.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    /// `new` was asked to create a project where a descriptor already exists.
    #[error("a project already exists at {}", path.display())]
    AlreadyExists { path: PathBuf },

    /// No descriptor on disk, or its generation never completed.
    #[error("no generated project at {} (run `stm32kit new` first)", path.display())]
    NotGenerated { path: PathBuf },

    /// The descriptor exists but cannot be used.
    #[error("invalid project descriptor {}: {detail}", path.display())]
    Descriptor { path: PathBuf, detail: String },

    /// Another regeneration, build or flash holds the project lock.
    #[error("another operation is already running on this project ({} exists)", path.display())]
    Busy { path: PathBuf },

    /// A forced path is not part of the rendered project.
    #[error("'{path}' is not a generated file of this project")]
    UnknownFile { path: String },

    /// Loading or merging declarations failed.
    #[error(transparent)]
    Profile(#[from] ProfileError),

    /// Rendering failed; nothing was written.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ProjectError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| ProjectError::Io { path, source }
    }
}

/// Result type for project operations.
pub type Result<T> = std::result::Result<T, ProjectError>;
