//! `stm32kit regenerate`: re-render without clobbering user edits.

use std::path::Path;

use anyhow::Result;
use stm32kit_profile::PinRequest;
use stm32kit_project::Force;
use stm32kit_render::BackendKind;

use crate::config::Settings;
use crate::session::ProjectSession;

pub fn run(
    settings: &Settings,
    project: &Path,
    force_all: bool,
    force_paths: Vec<String>,
    backend: Option<BackendKind>,
    request: Option<PinRequest>,
) -> Result<()> {
    let force = if force_all {
        Force::All
    } else if force_paths.is_empty() {
        Force::None
    } else {
        Force::Paths(force_paths.into_iter().collect())
    };

    let mut session = ProjectSession::open(settings, project)?;
    let report = session.regenerate(request.as_ref(), backend, &force)?;

    if report.is_noop() && report.orphaned.is_empty() {
        println!("Up to date ({} files unchanged)", report.unchanged.len());
    }
    for file in &report.written {
        println!("  wrote       {file}");
    }
    for file in &report.overwritten {
        println!("  overwrote   {file} (edited, but not preserved by policy)");
    }
    for file in &report.skipped {
        println!("  skipped     {file} (user-owned; use --force-path {file} to replace)");
    }
    for file in &report.orphaned {
        println!("  orphaned    {file} (no longer generated; left on disk)");
    }
    Ok(())
}
