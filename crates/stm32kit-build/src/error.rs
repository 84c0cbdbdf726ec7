//! Build and flash error types.

use std::path::PathBuf;

use stm32kit_project::ProjectError;

use crate::flash::FlashError;

/// Errors that can occur while configuring, building, or flashing a project.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A required executable is not on `PATH`.
    #[error("required tool '{tool}' was not found on PATH")]
    ToolchainNotFound { tool: String },

    /// A tool ran and exited unsuccessfully.
    #[error("{step} failed ({}){}", exit_description(*exit_code), tail_block(tail))]
    BuildFailure {
        /// The command line that failed.
        step: String,
        /// `None` when the process was terminated by a signal.
        exit_code: Option<i32>,
        /// The last lines of combined output.
        tail: Vec<String>,
    },

    /// The operation was cancelled and its process group terminated.
    #[error("operation cancelled")]
    Cancelled,

    /// Another regeneration, build or flash holds the project lock.
    #[error("another operation is already running on this project ({} exists)", path.display())]
    Busy { path: PathBuf },

    /// No complete descriptor on disk.
    #[error("no generated project at {} (run `stm32kit new` first)", path.display())]
    NotGenerated { path: PathBuf },

    /// Flash was requested without a successful build of the current sources.
    #[error("no successful build of the current sources; run `stm32kit build` first")]
    BuildRequired,

    /// The build reported success but produced no image.
    #[error("no .elf artifact found under {}", dir.display())]
    ArtifactNotFound { dir: PathBuf },

    #[error(transparent)]
    Flash(#[from] FlashError),

    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("build state error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Project(ProjectError),
}

impl From<ProjectError> for BuildError {
    fn from(e: ProjectError) -> Self {
        match e {
            ProjectError::Busy { path } => BuildError::Busy { path },
            ProjectError::NotGenerated { path } => BuildError::NotGenerated { path },
            other => BuildError::Project(other),
        }
    }
}

impl BuildError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| BuildError::Io { path, source }
    }
}

fn exit_description(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

fn tail_block(tail: &[String]) -> String {
    if tail.is_empty() {
        return String::new();
    }
    let mut out = String::from("\n");
    for line in tail {
        out.push_str("  | ");
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Result type for build operations.
pub type Result<T> = std::result::Result<T, BuildError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_failure_message_includes_tail() {
        let err = BuildError::BuildFailure {
            step: "make".into(),
            exit_code: Some(2),
            tail: vec!["main.c:3: error: expected ';'".into()],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("make failed (exit code 2)"));
        assert!(msg.contains("  | main.c:3: error: expected ';'"));
    }

    #[test]
    fn project_lock_and_ordering_errors_keep_their_kind() {
        let path = PathBuf::from("/p/.stm32kit/operation.lock");
        let err = BuildError::from(ProjectError::Busy { path: path.clone() });
        assert!(matches!(err, BuildError::Busy { path: p } if p == path));
        let err = BuildError::from(ProjectError::NotGenerated { path: "/p".into() });
        assert!(matches!(err, BuildError::NotGenerated { .. }));
    }

    #[test]
    fn signal_exit_is_described() {
        let err = BuildError::BuildFailure {
            step: "cmake --build build".into(),
            exit_code: None,
            tail: Vec::new(),
        };
        assert_eq!(err.to_string(), "cmake --build build failed (terminated by signal)");
    }
}
