//! Create, open and regenerate projects without destroying user edits.
//!
//! The renderer stages every file in memory; the reconciler then plans, for
//! every file, whether the rendering may reach disk before writing any of
//! them. A file is overwritten only while its on-disk content still matches
//! the fingerprint recorded when it was last generated, or when the caller
//! forces it. The descriptor is written last, so a project whose descriptor
//! exists is fully generated. If a write fails partway, the descriptor is
//! still updated for the files that did change, so they are never mistaken
//! for user edits.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stm32kit_profile::MergedProfile;
use stm32kit_render::{render, FileKind, GeneratedFile, RenderOptions, RenderedProject};

use crate::descriptor::{FileRecord, Origin, ProjectDescriptor};
use crate::error::{ProjectError, Result};
use crate::fingerprint::Fingerprint;
use crate::fs::write_atomic;
use crate::lock::OperationLock;

/// Which generated files may become user-owned when edited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PreservePolicy {
    /// Any generated file.
    #[default]
    All,
    /// Only sources, headers, assembly and the entry point. Edited linker
    /// scripts, probe scripts and build files are overwritten with a warning.
    Sources,
}

impl PreservePolicy {
    pub fn preserves(&self, kind: FileKind) -> bool {
        match self {
            PreservePolicy::All => true,
            PreservePolicy::Sources => kind.is_source(),
        }
    }
}

/// Files to overwrite regardless of ownership.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Force {
    #[default]
    None,
    All,
    Paths(BTreeSet<String>),
}

impl Force {
    pub fn includes(&self, path: &str) -> bool {
        match self {
            Force::None => false,
            Force::All => true,
            Force::Paths(paths) => paths.contains(path),
        }
    }
}

/// What a create or regenerate did, file by file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegenerationReport {
    /// Files (re)written with fresh content.
    pub written: Vec<String>,
    /// Generated files whose content was already current.
    pub unchanged: Vec<String>,
    /// User-owned files left untouched.
    pub skipped: Vec<String>,
    /// Edited files overwritten because the preserve policy does not cover them.
    pub overwritten: Vec<String>,
    /// Recorded files the renderer no longer produces; left on disk.
    pub orphaned: Vec<String>,
}

impl RegenerationReport {
    /// Whether the operation changed anything on disk.
    pub fn is_noop(&self) -> bool {
        self.written.is_empty() && self.overwritten.is_empty()
    }
}

/// Drives the on-disk state of one project directory.
#[derive(Debug, Clone)]
pub struct Reconciler {
    root: PathBuf,
    policy: PreservePolicy,
}

impl Reconciler {
    pub fn new(root: impl Into<PathBuf>, policy: PreservePolicy) -> Self {
        Self {
            root: root.into(),
            policy,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn policy(&self) -> PreservePolicy {
        self.policy
    }

    /// Generate a new project.
    ///
    /// Fails if a descriptor already exists. A pre-existing file that differs
    /// from its rendering is adopted as user-owned instead of being replaced.
    pub fn create(
        &self,
        profile: &MergedProfile,
        options: &RenderOptions,
    ) -> Result<(ProjectDescriptor, RegenerationReport)> {
        if ProjectDescriptor::exists(&self.root) {
            return Err(ProjectError::AlreadyExists {
                path: self.root.clone(),
            });
        }
        let rendered = render(profile, options)?;
        let mut descriptor = ProjectDescriptor::new(profile, options);
        let steps = self.plan(&descriptor, &rendered, &Force::None)?;
        // Without a descriptor a failed create stays "not generated"; a retry
        // recognises the files it already wrote by their content.
        let mut report = RegenerationReport::default();
        self.commit(&mut descriptor, steps, &rendered, write_atomic, &mut report)?;
        descriptor.save(&self.root)?;
        log::info!(
            "created project for board '{}' in {} ({} files)",
            descriptor.board,
            self.root.display(),
            rendered.len()
        );
        Ok((descriptor, report))
    }

    /// Load the descriptor and flip every edited generated file to user-owned.
    ///
    /// Flips are persisted immediately. Missing files keep their origin.
    pub fn open(&self) -> Result<ProjectDescriptor> {
        let mut descriptor = ProjectDescriptor::load(&self.root)?;
        if self.refresh_origins(&mut descriptor)? {
            descriptor.save(&self.root)?;
        }
        Ok(descriptor)
    }

    /// Re-render the project and write what ownership allows.
    ///
    /// Holds the project [`OperationLock`], so it never runs alongside a
    /// build or flash. `profile` and `options` may differ from the recorded
    /// ones (new pin request, other backend); the descriptor is updated to
    /// match. Render failures, unknown forced paths and unreadable files
    /// abort before anything is written, the descriptor included.
    pub fn regenerate(
        &self,
        profile: &MergedProfile,
        options: &RenderOptions,
        force: &Force,
    ) -> Result<(ProjectDescriptor, RegenerationReport)> {
        if !ProjectDescriptor::exists(&self.root) {
            return Err(ProjectError::NotGenerated {
                path: self.root.clone(),
            });
        }
        let _lock = OperationLock::acquire(&self.root, "regenerate")?;
        self.regenerate_with(profile, options, force, write_atomic)
    }

    fn regenerate_with<W>(
        &self,
        profile: &MergedProfile,
        options: &RenderOptions,
        force: &Force,
        write: W,
    ) -> Result<(ProjectDescriptor, RegenerationReport)>
    where
        W: FnMut(&Path, &[u8]) -> Result<()>,
    {
        let mut current = ProjectDescriptor::load(&self.root)?;
        self.refresh_origins(&mut current)?;
        let rendered = render(profile, options)?;
        if let Force::Paths(paths) = force {
            if let Some(unknown) = paths.iter().find(|p| rendered.get(p).is_none()) {
                return Err(ProjectError::UnknownFile {
                    path: unknown.clone(),
                });
            }
        }
        let steps = self.plan(&current, &rendered, force)?;

        let mut next = current.clone();
        next.update_from(profile, options);
        let mut report = RegenerationReport::default();
        if let Err(e) = self.commit(&mut next, steps, &rendered, write, &mut report) {
            if !report.is_noop() {
                current.files = next.files;
                current.generation += 1;
                if let Err(save_err) = current.save(&self.root) {
                    log::warn!("failed to record partially regenerated files: {save_err}");
                }
            }
            return Err(e);
        }

        if !report.is_noop() {
            next.generation += 1;
        }
        next.save(&self.root)?;
        log::info!(
            "regenerated {}: {} written, {} unchanged, {} skipped",
            self.root.display(),
            report.written.len() + report.overwritten.len(),
            report.unchanged.len(),
            report.skipped.len()
        );
        Ok((next, report))
    }

    /// Returns whether any origin changed.
    fn refresh_origins(&self, descriptor: &mut ProjectDescriptor) -> Result<bool> {
        let mut changed = false;
        for (path, record) in descriptor.files.iter_mut() {
            if record.origin != Origin::Generated || !self.policy.preserves(record.kind) {
                continue;
            }
            let full = self.root.join(path);
            let on_disk = Fingerprint::of_file(&full).map_err(ProjectError::io(&full))?;
            if matches!(on_disk, Some(fp) if fp != record.fingerprint) {
                log::info!("{path} was edited; it is now user-owned");
                record.origin = Origin::UserOwned;
                changed = true;
            }
        }
        Ok(changed)
    }

    /// Decide every file before touching any.
    fn plan<'a>(
        &self,
        descriptor: &ProjectDescriptor,
        rendered: &'a RenderedProject,
        force: &Force,
    ) -> Result<Vec<Step<'a>>> {
        rendered
            .files()
            .iter()
            .map(|file| self.plan_file(descriptor, file, force))
            .collect()
    }

    fn plan_file<'a>(
        &self,
        descriptor: &ProjectDescriptor,
        file: &'a GeneratedFile,
        force: &Force,
    ) -> Result<Step<'a>> {
        let full = self.root.join(&file.path);
        let fresh = Fingerprint::compute(file.content.as_bytes());
        let on_disk = Fingerprint::of_file(&full).map_err(ProjectError::io(&full))?;
        let record = descriptor.files.get(&file.path);

        // Content on disk that the generator did not write.
        let foreign = match (&on_disk, record) {
            (None, _) => false,
            (Some(_), Some(r)) if r.origin == Origin::UserOwned => true,
            (Some(current), Some(r)) => *current != r.fingerprint,
            (Some(current), None) => *current != fresh,
        };

        let action = if foreign && !force.includes(&file.path) {
            if self.policy.preserves(file.kind) {
                let fingerprint = record.map_or_else(|| fresh.clone(), |r| r.fingerprint.clone());
                return Ok(Step {
                    file,
                    action: Action::Skip,
                    record: FileRecord {
                        fingerprint,
                        origin: Origin::UserOwned,
                        kind: file.kind,
                    },
                });
            }
            Action::Overwrite
        } else if on_disk.as_ref() == Some(&fresh) {
            Action::Unchanged
        } else {
            Action::Write
        };
        Ok(Step {
            file,
            action,
            record: FileRecord {
                fingerprint: fresh,
                origin: Origin::Generated,
                kind: file.kind,
            },
        })
    }

    /// Carry out a plan. Each file's record is updated as soon as it is on
    /// disk, so after an error `descriptor` describes exactly what was written.
    fn commit<W>(
        &self,
        descriptor: &mut ProjectDescriptor,
        steps: Vec<Step<'_>>,
        rendered: &RenderedProject,
        mut write: W,
        report: &mut RegenerationReport,
    ) -> Result<()>
    where
        W: FnMut(&Path, &[u8]) -> Result<()>,
    {
        for step in steps {
            let path = &step.file.path;
            match step.action {
                Action::Write => {
                    write(&self.root.join(path), step.file.content.as_bytes())?;
                    log::debug!("wrote {path}");
                    report.written.push(path.clone());
                }
                Action::Overwrite => {
                    write(&self.root.join(path), step.file.content.as_bytes())?;
                    log::warn!(
                        "{path} was edited but is not preserved by the {:?} policy; overwritten",
                        self.policy
                    );
                    report.overwritten.push(path.clone());
                }
                Action::Unchanged => report.unchanged.push(path.clone()),
                Action::Skip => {
                    log::warn!("{path} is user-owned; not regenerated");
                    report.skipped.push(path.clone());
                }
            }
            descriptor.files.insert(path.clone(), step.record);
        }

        // Only once everything is written: an aborted commit keeps the
        // records of the previous rendering.
        let orphaned: Vec<String> = descriptor
            .files
            .keys()
            .filter(|path| rendered.get(path).is_none())
            .cloned()
            .collect();
        for path in orphaned {
            descriptor.files.remove(&path);
            log::warn!("{path} is no longer generated; left on disk");
            report.orphaned.push(path);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Write,
    Overwrite,
    Unchanged,
    Skip,
}

/// One planned file and the record it gets once the action is carried out.
struct Step<'a> {
    file: &'a GeneratedFile,
    action: Action,
    record: FileRecord,
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use stm32kit_profile::{Catalog, PinRequest};

    use super::*;
    use crate::descriptor::FileState;

    fn profile(request: &PinRequest) -> MergedProfile {
        let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..");
        Catalog::open(root)
            .unwrap()
            .resolve("nucleo_l552ze_q", request)
            .unwrap()
    }

    fn renamed_led() -> PinRequest {
        PinRequest::default().with_led_alias("STATUS")
    }

    fn origin(descriptor: &ProjectDescriptor, path: &str) -> Origin {
        descriptor.files[path].origin
    }

    #[test]
    fn failed_write_records_the_files_already_written() {
        let dir = tempfile::tempdir().unwrap();
        let reconciler = Reconciler::new(dir.path(), PreservePolicy::All);
        let options = RenderOptions::default();
        reconciler.create(&profile(&PinRequest::default()), &options).unwrap();
        let main_before = std::fs::read(dir.path().join("main.c")).unwrap();

        let failing = |path: &Path, data: &[u8]| {
            if path.ends_with("main.c") {
                return Err(ProjectError::Io {
                    path: path.to_path_buf(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                });
            }
            write_atomic(path, data)
        };
        let err = reconciler
            .regenerate_with(&profile(&renamed_led()), &options, &Force::None, failing)
            .unwrap_err();
        assert!(matches!(err, ProjectError::Io { .. }));
        assert_eq!(std::fs::read(dir.path().join("main.c")).unwrap(), main_before);

        let opened = reconciler.open().unwrap();
        assert_eq!(opened.generation, 1);
        for path in ["app_pins.c", "app_pins.h", "main.c"] {
            assert_eq!(origin(&opened, path), Origin::Generated, "{path}");
        }
        assert!(opened
            .file_states(dir.path())
            .unwrap()
            .iter()
            .all(|(_, state)| *state == FileState::Clean));

        let (descriptor, report) = reconciler
            .regenerate(&profile(&renamed_led()), &options, &Force::None)
            .unwrap();
        assert!(report.skipped.is_empty());
        assert!(report.written.contains(&"main.c".to_string()));
        assert!(!report.written.iter().any(|p| p.starts_with("app_pins")));
        assert_eq!(descriptor.generation, 2);
        assert_eq!(descriptor.pin_request.led_alias.as_deref(), Some("STATUS"));
    }

    #[test]
    fn regenerate_refuses_while_locked() {
        let dir = tempfile::tempdir().unwrap();
        let reconciler = Reconciler::new(dir.path(), PreservePolicy::All);
        let profile = profile(&PinRequest::default());
        reconciler.create(&profile, &RenderOptions::default()).unwrap();
        let descriptor_before = std::fs::read(ProjectDescriptor::path(dir.path())).unwrap();

        let _held = OperationLock::acquire(dir.path(), "build").unwrap();
        assert!(matches!(
            reconciler.regenerate(&profile, &RenderOptions::default(), &Force::All),
            Err(ProjectError::Busy { .. })
        ));
        assert_eq!(
            std::fs::read(ProjectDescriptor::path(dir.path())).unwrap(),
            descriptor_before
        );
    }
}
