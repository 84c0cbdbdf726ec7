//! Ctrl-C handling for long-running operations.
//!
//! The first Ctrl-C cancels the operation in progress, which stops its tools
//! and releases the project lock on the way out. A second one, or one with
//! nothing running, exits at once.

use std::sync::{Mutex, PoisonError};

use stm32kit_build::{CancelToken, Operation, Result};

static CURRENT: Mutex<Option<CancelToken>> = Mutex::new(None);

/// Exit status of a process ended by SIGINT.
const INTERRUPTED: i32 = 130;

pub fn install() {
    if let Err(e) = ctrlc::set_handler(on_interrupt) {
        log::warn!("Ctrl-C will not cancel running operations: {e}");
    }
}

fn on_interrupt() {
    match current() {
        Some(token) if !token.is_cancelled() => {
            eprintln!();
            log::warn!("interrupted; stopping (Ctrl-C again to quit immediately)");
            token.cancel();
        }
        _ => std::process::exit(INTERRUPTED),
    }
}

fn current() -> Option<CancelToken> {
    CURRENT.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

fn register(token: Option<CancelToken>) {
    *CURRENT.lock().unwrap_or_else(PoisonError::into_inner) = token;
}

/// Run `work` on a worker thread that Ctrl-C can cancel, and wait for it.
pub fn run_operation<T, F>(name: &str, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(CancelToken) -> Result<T> + Send + 'static,
{
    let operation = Operation::spawn(name, work)?;
    register(Some(operation.cancel_token()));
    let result = operation.wait();
    register(None);
    result
}
