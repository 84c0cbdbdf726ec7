//! The explicit per-project session passed to every project command.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use stm32kit_build::BuildPipeline;
use stm32kit_profile::{MergedProfile, PinRequest, ProbeConfig};
use stm32kit_project::{Force, ProjectDescriptor, Reconciler, RegenerationReport};
use stm32kit_render::{BackendKind, RenderOptions};

use crate::config::Settings;

/// One project: its directory, resolved profile and descriptor.
pub struct ProjectSession {
    root: PathBuf,
    reconciler: Reconciler,
    profile: MergedProfile,
    descriptor: ProjectDescriptor,
}

impl ProjectSession {
    /// Generate a new project at `root`.
    pub fn create(
        settings: &Settings,
        root: &Path,
        board: &str,
        request: &PinRequest,
        options: &RenderOptions,
    ) -> Result<(Self, RegenerationReport)> {
        let profile = settings.catalog()?.resolve(board, request)?;
        let reconciler = Reconciler::new(root, settings.preserve);
        let (descriptor, report) = reconciler
            .create(&profile, options)
            .with_context(|| format!("creating project in {}", root.display()))?;
        let session = Self {
            root: root.to_path_buf(),
            reconciler,
            profile,
            descriptor,
        };
        Ok((session, report))
    }

    /// Load an existing project and re-resolve its profile from the catalog.
    pub fn open(settings: &Settings, root: &Path) -> Result<Self> {
        let reconciler = Reconciler::new(root, settings.preserve);
        let descriptor = reconciler.open()?;
        let profile = settings
            .catalog()?
            .resolve(&descriptor.board, &descriptor.pin_request)
            .with_context(|| format!("resolving board '{}'", descriptor.board))?;
        if profile.pack.id != descriptor.pack {
            bail!(
                "board '{}' now uses pack '{}' but the project was generated for '{}'",
                descriptor.board,
                profile.pack.id,
                descriptor.pack
            );
        }
        Ok(Self {
            root: root.to_path_buf(),
            reconciler,
            profile,
            descriptor,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn profile(&self) -> &MergedProfile {
        &self.profile
    }

    pub fn descriptor(&self) -> &ProjectDescriptor {
        &self.descriptor
    }

    /// Re-render, optionally with a new pin request or backend.
    pub fn regenerate(
        &mut self,
        request: Option<&PinRequest>,
        backend: Option<BackendKind>,
        force: &Force,
    ) -> Result<RegenerationReport> {
        let profile = match request {
            Some(request) => self.profile.repin(request)?,
            None => self.profile.clone(),
        };
        let mut options = self.descriptor.render_options();
        if let Some(backend) = backend {
            options.backend = backend;
        }
        let (descriptor, report) = self.reconciler.regenerate(&profile, &options, force)?;
        self.profile = profile;
        self.descriptor = descriptor;
        Ok(report)
    }

    pub fn pipeline(&self) -> BuildPipeline {
        BuildPipeline::new(&self.root, self.descriptor.backend)
    }

    /// Probe settings with the speed override applied.
    pub fn probe(&self, speed_khz: Option<u32>) -> ProbeConfig {
        self.profile.probe.clone().with_speed_khz(speed_khz)
    }
}
