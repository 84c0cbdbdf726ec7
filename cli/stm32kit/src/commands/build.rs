//! `stm32kit configure` and `stm32kit build`.

use std::path::Path;

use anyhow::Result;
use crate::config::Settings;
use crate::interrupt::run_operation;
use crate::session::ProjectSession;

/// Run the backend's configure step.
pub fn configure(settings: &Settings, project: &Path) -> Result<()> {
    let session = ProjectSession::open(settings, project)?;
    let pipeline = session.pipeline();
    run_operation("configure", move |cancel| pipeline.configure(&cancel))?;
    println!("Configured {} ({})", project.display(), session.descriptor().backend);
    Ok(())
}

/// Build the firmware image; configures first when needed.
pub fn build(settings: &Settings, project: &Path) -> Result<()> {
    let session = ProjectSession::open(settings, project)?;
    let pipeline = session.pipeline();
    let outcome = run_operation("build", move |cancel| pipeline.build(&cancel))?;
    println!(
        "Built {} ({} build)",
        outcome.artifact.display(),
        if outcome.clean { "clean" } else { "incremental" }
    );
    Ok(())
}
