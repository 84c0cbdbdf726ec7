//! The persisted outcome of the last build.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stm32kit_project::fs::write_atomic;
use stm32kit_project::{ProjectDescriptor, STATE_DIR};
use stm32kit_render::BackendKind;

use crate::error::{BuildError, Result};

const STATE_FILE: &str = "build-state.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildStatus {
    /// Recorded before the tools start; survives a crash as non-success.
    Running,
    Success,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct BuildState {
    pub status: BuildStatus,
    pub backend: BackendKind,
    /// Project-relative path of the linked image, when the build succeeded.
    #[serde(default)]
    pub artifact: Option<String>,
    /// Descriptor generation the build compiled. A regeneration that changes
    /// files moves the descriptor past it.
    #[serde(default)]
    pub generation: u64,
}

impl BuildState {
    pub fn path(root: &Path) -> PathBuf {
        root.join(STATE_DIR).join(STATE_FILE)
    }

    /// `Ok(None)` when no build has been recorded.
    pub fn load(root: &Path) -> Result<Option<Self>> {
        let path = Self::path(root);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BuildError::io(&path)(e)),
        };
        Ok(Some(serde_json::from_str(&text)?))
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        write_atomic(&Self::path(root), json.as_bytes())?;
        Ok(())
    }

    /// Forget the last build; the next build starts clean.
    pub fn clear(root: &Path) -> Result<()> {
        let path = Self::path(root);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BuildError::io(&path)(e)),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == BuildStatus::Success
    }

    /// A successful build of the sources as they are now.
    pub fn is_current(&self, descriptor: &ProjectDescriptor) -> bool {
        self.succeeded() && self.generation == descriptor.generation
    }
}
