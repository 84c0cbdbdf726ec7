//! `stm32kit clean`: remove build output.

use std::path::Path;

use anyhow::Result;
use stm32kit_render::BUILD_DIR;

use crate::config::Settings;
use crate::session::ProjectSession;

/// Remove `build/` and forget the last build, so flash is refused until
/// the next successful build.
pub fn run(settings: &Settings, project: &Path) -> Result<()> {
    let session = ProjectSession::open(settings, project)?;
    let dir = project.join(BUILD_DIR);
    if session.pipeline().clean()? {
        println!("Removed {}", dir.display());
    } else {
        println!("Already clean: {} does not exist", dir.display());
    }
    Ok(())
}
