//! The persisted per-project record.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stm32kit_profile::{MergedProfile, PinMap, PinRequest};
use stm32kit_render::{BackendKind, FileKind, RenderOptions};

use crate::error::{ProjectError, Result};
use crate::fingerprint::Fingerprint;
use crate::fs::write_atomic;

/// File name of the descriptor, at the project root.
pub const DESCRIPTOR_FILE: &str = "stm32kit.project.json";

/// Descriptor schema version written by this crate.
pub const DESCRIPTOR_SCHEMA_VERSION: u32 = 1;

/// Who owns the current content of a generated file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Origin {
    /// Content is exactly what was last rendered.
    Generated,
    /// The user has edited the file; regeneration leaves it alone.
    UserOwned,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Origin::Generated => "generated",
            Origin::UserOwned => "user-owned",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileRecord {
    /// Fingerprint of the content last written by the generator.
    pub fingerprint: Fingerprint,
    pub origin: Origin,
    pub kind: FileKind,
}

/// On-disk state of a recorded file relative to its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Clean,
    Modified,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ProjectDescriptor {
    pub schema_version: u32,
    pub project_name: String,
    pub board: String,
    pub pack: String,
    pub backend: BackendKind,
    /// Project-relative path of the entry-point source.
    pub entry_point: String,
    /// The request the pin map was resolved from.
    pub pin_request: PinRequest,
    pub pins: PinMap,
    /// Per generated file, keyed by project-relative path.
    pub files: BTreeMap<String, FileRecord>,
    /// Bumped whenever regeneration changes a file on disk. A build records
    /// the generation it compiled, so images older than the sources are
    /// recognisable.
    #[serde(default)]
    pub generation: u64,
}

impl ProjectDescriptor {
    /// An empty descriptor for a profile about to be generated.
    pub fn new(profile: &MergedProfile, options: &RenderOptions) -> Self {
        let mut descriptor = Self {
            schema_version: DESCRIPTOR_SCHEMA_VERSION,
            project_name: String::new(),
            board: String::new(),
            pack: String::new(),
            backend: options.backend,
            entry_point: String::new(),
            pin_request: PinRequest::default(),
            pins: PinMap::default(),
            files: BTreeMap::new(),
            generation: 0,
        };
        descriptor.update_from(profile, options);
        descriptor
    }

    pub(crate) fn update_from(&mut self, profile: &MergedProfile, options: &RenderOptions) {
        self.project_name = options.project_name.clone();
        self.board = profile.board.id.clone();
        self.pack = profile.pack.id.clone();
        self.backend = options.backend;
        self.entry_point = options.entry_point.clone();
        self.pin_request = profile.request().clone();
        self.pins = profile.pins().clone();
    }

    pub fn path(root: &Path) -> PathBuf {
        root.join(DESCRIPTOR_FILE)
    }

    pub fn exists(root: &Path) -> bool {
        Self::path(root).is_file()
    }

    /// Load the descriptor of the project at `root`.
    pub fn load(root: &Path) -> Result<Self> {
        let path = Self::path(root);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProjectError::NotGenerated {
                    path: root.to_path_buf(),
                });
            }
            Err(source) => return Err(ProjectError::Io { path, source }),
        };
        let descriptor: Self =
            serde_json::from_str(&text).map_err(|e| ProjectError::Descriptor {
                path: path.clone(),
                detail: e.to_string(),
            })?;
        if descriptor.schema_version != DESCRIPTOR_SCHEMA_VERSION {
            return Err(ProjectError::Descriptor {
                path,
                detail: format!(
                    "unsupported schema-version {} (expected {DESCRIPTOR_SCHEMA_VERSION})",
                    descriptor.schema_version
                ),
            });
        }
        Ok(descriptor)
    }

    /// Write the descriptor atomically.
    pub fn save(&self, root: &Path) -> Result<()> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        write_atomic(&Self::path(root), json.as_bytes())
    }

    /// Render options that reproduce this project.
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            project_name: self.project_name.clone(),
            backend: self.backend,
            entry_point: self.entry_point.clone(),
        }
    }

    /// Compare every recorded file with the disk.
    pub fn file_states(&self, root: &Path) -> Result<Vec<(String, FileState)>> {
        let mut states = Vec::with_capacity(self.files.len());
        for (path, record) in &self.files {
            let full = root.join(path);
            let state = match Fingerprint::of_file(&full).map_err(ProjectError::io(&full))? {
                None => FileState::Missing,
                Some(fp) if fp == record.fingerprint => FileState::Clean,
                Some(_) => FileState::Modified,
            };
            states.push((path.clone(), state));
        }
        Ok(states)
    }
}
