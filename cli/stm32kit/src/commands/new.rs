//! `stm32kit new`: generate a project.

use std::path::Path;

use anyhow::{Context, Result};
use stm32kit_profile::PinRequest;
use stm32kit_render::{BackendKind, RenderOptions};

use crate::config::Settings;
use crate::session::ProjectSession;

pub fn run(
    settings: &Settings,
    path: &Path,
    board: &str,
    name: Option<&str>,
    backend: Option<BackendKind>,
    entry_point: &str,
    request: &PinRequest,
) -> Result<()> {
    let project_name = match name {
        Some(name) => name.to_string(),
        None => path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .context("cannot derive a project name from the path; pass --name")?,
    };
    let options = RenderOptions {
        project_name,
        backend: backend.unwrap_or(settings.backend),
        entry_point: entry_point.to_string(),
    };

    let (session, report) = ProjectSession::create(settings, path, board, request, &options)?;
    let descriptor = session.descriptor();
    println!(
        "Created {} for {} ({}) in {}",
        descriptor.project_name,
        session.profile().board.display_name(),
        descriptor.backend,
        session.root().display()
    );
    for file in &report.written {
        println!("  wrote   {file}");
    }
    for file in &report.skipped {
        println!("  kept    {file} (existing content adopted as user-owned)");
    }
    println!();
    println!("Next: stm32kit build --project {}", path.display());
    Ok(())
}
