//! Render options and the staged, in-memory output.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// Build tool the generated project targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// CMake with the Ninja generator.
    #[default]
    Cmake,
    Make,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Cmake => "cmake",
            BackendKind::Make => "make",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cmake" | "ninja" => Ok(BackendKind::Cmake),
            "make" => Ok(BackendKind::Make),
            other => Err(RenderError::InvalidOption {
                detail: format!("unknown build backend '{other}' (expected cmake or make)"),
            }),
        }
    }
}

/// What a generated file is, for preserve-policy decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileKind {
    /// C sources, headers and assembly.
    Source,
    /// The application entry point.
    EntryPoint,
    Linker,
    ProbeConfig,
    BuildScript,
}

impl FileKind {
    /// Whether users are expected to edit files of this kind.
    pub fn is_source(&self) -> bool {
        matches!(self, FileKind::Source | FileKind::EntryPoint)
    }
}

/// Caller-chosen rendering options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RenderOptions {
    /// Used for the firmware target name in build files.
    pub project_name: String,
    pub backend: BackendKind,
    /// Project-relative path of the entry-point source.
    pub entry_point: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            project_name: "firmware".into(),
            backend: BackendKind::default(),
            entry_point: "main.c".into(),
        }
    }
}

impl RenderOptions {
    pub(crate) fn validate(&self) -> Result<(), RenderError> {
        let name_ok = !self.project_name.is_empty()
            && self
                .project_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !name_ok {
            return Err(RenderError::InvalidOption {
                detail: format!(
                    "project name '{}' must be non-empty and use only [A-Za-z0-9_-]",
                    self.project_name
                ),
            });
        }
        let entry = &self.entry_point;
        let entry_ok = entry.ends_with(".c")
            && !entry.starts_with('/')
            && !entry.contains('\\')
            && entry.split('/').all(|part| !part.is_empty() && part != "..");
        if !entry_ok {
            return Err(RenderError::InvalidOption {
                detail: format!("entry point '{entry}' must be a relative path to a .c file"),
            });
        }
        Ok(())
    }
}

/// One staged output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// Project-relative path with `/` separators.
    pub path: String,
    pub content: String,
    pub kind: FileKind,
}

/// The complete staged file set, sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedProject {
    files: Vec<GeneratedFile>,
}

impl RenderedProject {
    pub(crate) fn new(mut files: Vec<GeneratedFile>) -> Self {
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Self { files }
    }

    pub fn files(&self) -> &[GeneratedFile] {
        &self.files
    }

    pub fn get(&self, path: &str) -> Option<&GeneratedFile> {
        self.files
            .binary_search_by(|f| f.path.as_str().cmp(path))
            .ok()
            .map(|i| &self.files[i])
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.path.as_str())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
