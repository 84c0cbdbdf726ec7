//! `stm32kit flash`: program the last built image.

use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::Result;
use stm32kit_build::flash::AutoRetry;
use stm32kit_build::{ResetPrompt, MAX_CONNECT_ATTEMPTS};

use crate::config::Settings;
use crate::interrupt::run_operation;
use crate::session::ProjectSession;

/// Asks on the terminal before each manual-reset retry.
struct TerminalPrompt;

impl ResetPrompt for TerminalPrompt {
    fn hold_reset(&mut self, attempt: u32, last_error: &str) -> bool {
        if let Some(line) = last_error.lines().rev().find(|l| !l.trim().is_empty()) {
            log::warn!("probe could not attach: {line}");
        }
        eprintln!();
        eprintln!("Attempt {attempt}/{MAX_CONNECT_ATTEMPTS}: connect with manual reset.");
        eprintln!("Press and hold the board's RESET button, press Enter, then release RESET.");
        eprint!("[Enter to retry, q to abort] ");
        let _ = std::io::stderr().flush();

        let mut answer = String::new();
        match std::io::stdin().lock().read_line(&mut answer) {
            Ok(0) | Err(_) => false,
            Ok(_) => !answer.trim().eq_ignore_ascii_case("q"),
        }
    }
}

pub fn run(settings: &Settings, project: &Path, speed: Option<u32>, non_interactive: bool) -> Result<()> {
    let session = ProjectSession::open(settings, project)?;
    let probe = session.probe(speed.or(settings.adapter_speed_khz));
    let region = session.profile().memory.flash;
    let pipeline = session.pipeline();
    let interactive = settings.interactive_reset && !non_interactive;

    let report = run_operation("flash", move |cancel| {
        if interactive {
            pipeline.flash(probe, region, &mut TerminalPrompt, &cancel)
        } else {
            pipeline.flash(probe, region, &mut AutoRetry, &cancel)
        }
    })?;

    println!(
        "Flashed {} ({} connection attempt{})",
        session.profile().board.display_name(),
        report.attempts,
        if report.attempts == 1 { "" } else { "s" }
    );
    Ok(())
}
