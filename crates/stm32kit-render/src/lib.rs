//! Deterministic project rendering for stm32kit.
//!
//! [`render`] turns a [`MergedProfile`] into a [`RenderedProject`]: an
//! in-memory, path-sorted set of files. Nothing is written to disk here.
//! Identical inputs always produce byte-identical output; every value comes
//! from ordered maps and no timestamps are emitted.

pub mod context;
pub mod error;
pub mod output;
pub mod template;
pub mod vectors;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use stm32kit_profile::MergedProfile;

pub use context::{build_context, bundled_target_path, BUILD_DIR, ELF_STEM, OPENOCD_CFG};
pub use error::{RenderError, Result};
pub use output::{BackendKind, FileKind, GeneratedFile, RenderOptions, RenderedProject};
pub use template::Context;

/// Where template text comes from.
pub trait TemplateSource {
    /// Return the text of the template `name`.
    fn read(&self, name: &str) -> Result<String>;
}

/// Templates read from a pack's `templates/` directory.
#[derive(Debug, Clone)]
pub struct DirTemplates {
    dir: PathBuf,
}

impl DirTemplates {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl TemplateSource for DirTemplates {
    fn read(&self, name: &str) -> Result<String> {
        let path = self.dir.join(name);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(RenderError::MissingTemplate { path })
            }
            Err(source) => Err(RenderError::Io { path, source }),
        }
    }
}

impl TemplateSource for BTreeMap<String, String> {
    fn read(&self, name: &str) -> Result<String> {
        self.get(name)
            .cloned()
            .ok_or_else(|| RenderError::MissingTemplate {
                path: Path::new(name).to_path_buf(),
            })
    }
}

/// Render a project from the pack's own templates.
pub fn render(profile: &MergedProfile, options: &RenderOptions) -> Result<RenderedProject> {
    render_with(
        &DirTemplates::new(profile.pack.templates_dir()),
        profile,
        options,
    )
}

/// Render a project from an explicit template source.
pub fn render_with(
    templates: &dyn TemplateSource,
    profile: &MergedProfile,
    options: &RenderOptions,
) -> Result<RenderedProject> {
    options.validate()?;
    let ctx = build_context(profile, options);
    let set = &profile.pack.templates;
    let startup = profile
        .pack
        .startup
        .template_for(profile.exception_model());

    let mut plan: Vec<(String, &str, FileKind)> = vec![
        ("hal.h".into(), set.hal_header.as_str(), FileKind::Source),
        ("hal.c".into(), set.hal_source.as_str(), FileKind::Source),
        ("app_pins.h".into(), set.pins_header.as_str(), FileKind::Source),
        ("app_pins.c".into(), set.pins_source.as_str(), FileKind::Source),
        (options.entry_point.clone(), set.main.as_str(), FileKind::EntryPoint),
        ("startup.s".into(), startup, FileKind::Source),
        ("linker.ld".into(), set.linker.as_str(), FileKind::Linker),
        (OPENOCD_CFG.into(), set.openocd.as_str(), FileKind::ProbeConfig),
    ];
    match options.backend {
        BackendKind::Cmake => {
            plan.push(("CMakeLists.txt".into(), set.cmake.as_str(), FileKind::BuildScript));
            plan.push((
                "cmake/toolchain-arm-none-eabi.cmake".into(),
                set.cmake_toolchain.as_str(),
                FileKind::BuildScript,
            ));
        }
        BackendKind::Make => {
            plan.push(("Makefile".into(), set.makefile.as_str(), FileKind::BuildScript));
        }
    }

    let mut files = Vec::with_capacity(plan.len());
    for (path, name, kind) in plan {
        let source = templates.read(name)?;
        let content = template::substitute(name, &source, &ctx)?;
        files.push(GeneratedFile {
            path,
            content,
            kind,
        });
    }

    if let (Some(source), Some(path)) = (
        profile.probe.bundled_target.as_ref(),
        bundled_target_path(&profile.probe),
    ) {
        let content = match std::fs::read_to_string(source) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RenderError::MissingTemplate {
                    path: source.clone(),
                })
            }
            Err(e) => {
                return Err(RenderError::Io {
                    path: source.clone(),
                    source: e,
                })
            }
        };
        files.push(GeneratedFile {
            path,
            content,
            kind: FileKind::ProbeConfig,
        });
    }

    let mut seen = BTreeSet::new();
    if let Some(dup) = files.iter().find(|f| !seen.insert(f.path.as_str())) {
        return Err(RenderError::InvalidOption {
            detail: format!("'{}' would be generated twice", dup.path),
        });
    }
    let project = RenderedProject::new(files);
    log::debug!(
        "rendered {} files for board '{}' ({} backend)",
        project.len(),
        profile.board.id,
        options.backend
    );
    Ok(project)
}
