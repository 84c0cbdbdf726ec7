//! `stm32kit status` (alias `open`): project state at a glance.

use std::path::Path;

use anyhow::Result;
use stm32kit_build::{BuildState, OperationLock};
use stm32kit_project::FileState;

use crate::config::Settings;
use crate::session::ProjectSession;

pub fn run(settings: &Settings, project: &Path) -> Result<()> {
    let session = ProjectSession::open(settings, project)?;
    let descriptor = session.descriptor();

    println!("=== Project: {} ===", descriptor.project_name);
    println!("Directory:   {}", project.display());
    println!("Board:       {} (pack {})", descriptor.board, descriptor.pack);
    println!("Backend:     {}", descriptor.backend);
    println!("Entry point: {}", descriptor.entry_point);
    println!();

    println!("--- Pins ---");
    for pin in descriptor.pins.iter() {
        println!("  {:<6} {}", pin.pin.to_string(), pin.name);
    }
    println!();

    println!("--- Files ---");
    for (path, state) in descriptor.file_states(project)? {
        let origin = descriptor.files[&path].origin;
        let note = match state {
            FileState::Clean => "",
            FileState::Modified => " (modified)",
            FileState::Missing => " (missing; recreated on regenerate)",
        };
        println!("  {path:<40} {origin}{note}");
    }
    println!();

    println!("--- Build ---");
    match BuildState::load(project)? {
        Some(state) => {
            println!("  Last build: {:?} ({})", state.status, state.backend);
            if state.succeeded() && !state.is_current(descriptor) {
                println!("  Sources were regenerated since; rebuild before flashing.");
            }
            if let Some(artifact) = state.artifact {
                println!("  Artifact:   {artifact}");
            }
        }
        None => println!("  Last build: none"),
    }
    if OperationLock::is_held(project) {
        println!("  An operation is in progress.");
    }
    Ok(())
}
