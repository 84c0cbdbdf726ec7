//! Project-level configure, build, flash and clean with ordering rules.
//!
//! Every operation holds the project [`OperationLock`], the same lock
//! regeneration takes. A build needs a descriptor on disk; a flash needs the
//! last recorded build to have succeeded on the descriptor's current
//! generation, so sources regenerated since then must be rebuilt. Anything
//! other than a successful build leaves the recorded state non-successful,
//! so the next build starts from an empty build tree.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use stm32kit_profile::{MemoryRegion, ProbeConfig};
use stm32kit_project::{OperationLock, ProjectDescriptor};
use stm32kit_render::{BackendKind, BUILD_DIR};

use crate::backend::{backend_for, find_artifact, BuildBackend, BuildContext};
use crate::error::{BuildError, Result};
use crate::flash::{FlashPlan, FlashReport, ResetPrompt};
use crate::process::{CancelToken, CommandRunner, SystemRunner};
use crate::state::{BuildState, BuildStatus};

/// Result of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    /// Project-relative path of the linked image.
    pub artifact: PathBuf,
    /// Whether the build tree was wiped first.
    pub clean: bool,
}

/// Build and flash operations for one generated project.
#[derive(Clone)]
pub struct BuildPipeline {
    root: PathBuf,
    backend: BackendKind,
    runner: Arc<dyn CommandRunner>,
}

impl BuildPipeline {
    pub fn new(root: impl Into<PathBuf>, backend: BackendKind) -> Self {
        Self::with_runner(root, backend, Arc::new(SystemRunner))
    }

    pub fn with_runner(
        root: impl Into<PathBuf>,
        backend: BackendKind,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            root: root.into(),
            backend,
            runner,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    fn context<'a>(&'a self, cancel: &'a CancelToken) -> BuildContext<'a> {
        BuildContext {
            root: &self.root,
            runner: self.runner.as_ref(),
            cancel,
        }
    }

    fn ensure_generated(&self) -> Result<()> {
        if ProjectDescriptor::exists(&self.root) {
            Ok(())
        } else {
            Err(BuildError::NotGenerated {
                path: self.root.clone(),
            })
        }
    }

    /// Run the backend's configure step on its own.
    pub fn configure(&self, cancel: &CancelToken) -> Result<()> {
        self.ensure_generated()?;
        let _lock = OperationLock::acquire(&self.root, "configure")?;
        backend_for(self.backend).configure(&self.context(cancel))
    }

    /// Configure if needed, build, and record the outcome.
    pub fn build(&self, cancel: &CancelToken) -> Result<BuildOutcome> {
        self.ensure_generated()?;
        let _lock = OperationLock::acquire(&self.root, "build")?;
        let generation = ProjectDescriptor::load(&self.root)?.generation;
        let backend = backend_for(self.backend);

        let previous = BuildState::load(&self.root)?;
        let clean = !matches!(
            &previous,
            Some(state) if state.succeeded() && state.backend == self.backend
        );
        if clean {
            self.remove_build_dir()?;
        }

        self.record(BuildStatus::Running, None, generation)?;
        match self.run_build(backend.as_ref(), cancel) {
            Ok(artifact) => {
                self.record(BuildStatus::Success, Some(&artifact), generation)?;
                log::info!("built {}", artifact.display());
                Ok(BuildOutcome { artifact, clean })
            }
            Err(e) => {
                let status = match e {
                    BuildError::Cancelled => BuildStatus::Cancelled,
                    _ => BuildStatus::Failed,
                };
                if let Err(record_err) = self.record(status, None, generation) {
                    log::warn!("failed to record build state: {record_err}");
                }
                Err(e)
            }
        }
    }

    fn run_build(&self, backend: &dyn BuildBackend, cancel: &CancelToken) -> Result<PathBuf> {
        let ctx = self.context(cancel);
        if !backend.is_configured(&self.root) {
            backend.configure(&ctx)?;
        }
        backend.build(&ctx)?;
        find_artifact(&self.root)
    }

    fn record(&self, status: BuildStatus, artifact: Option<&Path>, generation: u64) -> Result<()> {
        BuildState {
            status,
            backend: self.backend,
            artifact: artifact.map(|p| p.to_string_lossy().replace('\\', "/")),
            generation,
        }
        .save(&self.root)
    }

    /// Program the artifact of the last successful build, provided nothing
    /// was regenerated since.
    pub fn flash(
        &self,
        probe: ProbeConfig,
        flash: MemoryRegion,
        prompt: &mut dyn ResetPrompt,
        cancel: &CancelToken,
    ) -> Result<FlashReport> {
        self.ensure_generated()?;
        let _lock = OperationLock::acquire(&self.root, "flash")?;
        let descriptor = ProjectDescriptor::load(&self.root)?;
        let state = BuildState::load(&self.root)?
            .filter(|state| state.is_current(&descriptor))
            .ok_or(BuildError::BuildRequired)?;
        let artifact = match state.artifact {
            Some(path) if self.root.join(&path).is_file() => PathBuf::from(path),
            _ => find_artifact(&self.root)?,
        };
        let plan = FlashPlan {
            root: self.root.clone(),
            artifact,
            probe,
            flash,
        };
        backend_for(self.backend).flash(&self.context(cancel), plan, prompt)
    }

    /// Remove the build tree and forget the last build.
    pub fn clean(&self) -> Result<bool> {
        let _lock = OperationLock::acquire(&self.root, "clean")?;
        let removed = self.remove_build_dir()?;
        BuildState::clear(&self.root)?;
        Ok(removed)
    }

    fn remove_build_dir(&self) -> Result<bool> {
        let dir = self.root.join(BUILD_DIR);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => {
                log::info!("removed {}", dir.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BuildError::io(&dir)(e)),
        }
    }
}

impl std::fmt::Debug for BuildPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildPipeline")
            .field("root", &self.root)
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}
