//! One mutating operation at a time per project.
//!
//! Regeneration, builds and flashes all hold the same lock file. It records
//! the holder's operation and PID, so a lock left behind by a process that
//! died without cleaning up is detected and taken over.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{ProjectError, Result};

/// Directory holding per-project tool state.
pub const STATE_DIR: &str = ".stm32kit";

const LOCK_FILE: &str = "operation.lock";

/// Held while an operation runs; the lock file is removed on drop.
#[derive(Debug)]
pub struct OperationLock {
    path: PathBuf,
}

impl OperationLock {
    /// Create the lock file exclusively. A live holder makes this fail with
    /// [`ProjectError::Busy`] rather than wait.
    pub fn acquire(root: &Path, operation: &str) -> Result<Self> {
        let dir = root.join(STATE_DIR);
        fs::create_dir_all(&dir).map_err(ProjectError::io(&dir))?;
        let path = dir.join(LOCK_FILE);

        let mut file = match create_new(&path)? {
            Some(file) => file,
            None => {
                let holder = read_holder(&path)?;
                match holder {
                    Some((stale_op, pid)) if !process_alive(pid) => {
                        log::warn!(
                            "removing stale lock left by '{stale_op}' (pid {pid} is no longer running)"
                        );
                        match fs::remove_file(&path) {
                            Ok(()) => {}
                            Err(e) if e.kind() == ErrorKind::NotFound => {}
                            Err(e) => return Err(ProjectError::io(&path)(e)),
                        }
                        create_new(&path)?.ok_or_else(|| ProjectError::Busy { path: path.clone() })?
                    }
                    _ => return Err(ProjectError::Busy { path }),
                }
            }
        };
        writeln!(file, "{operation} {}", std::process::id()).map_err(ProjectError::io(&path))?;
        log::debug!("acquired {} for {operation}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a running process currently holds the project lock.
    pub fn is_held(root: &Path) -> bool {
        let path = root.join(STATE_DIR).join(LOCK_FILE);
        match read_holder(&path) {
            Ok(Some((_, pid))) => process_alive(pid),
            Ok(None) => path.exists(),
            Err(_) => true,
        }
    }
}

impl Drop for OperationLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("failed to release {}: {e}", self.path.display());
        }
    }
}

/// `Ok(None)` when the file already exists.
fn create_new(path: &Path) -> Result<Option<fs::File>> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => Ok(Some(file)),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
        Err(e) => Err(ProjectError::io(path)(e)),
    }
}

/// The `operation pid` line of a lock file. `None` while the holder has not
/// written it yet, or when the file has gone.
fn read_holder(path: &Path) -> Result<Option<(String, u32)>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ProjectError::io(path)(e)),
    };
    let mut words = text.split_whitespace();
    let holder = match (words.next(), words.next().and_then(|p| p.parse().ok())) {
        (Some(operation), Some(pid)) => Some((operation.to_string(), pid)),
        _ => None,
    };
    Ok(holder)
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: signal 0 only checks that `pid` exists and may be signalled.
    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_busy() {
        let dir = tempfile::tempdir().unwrap();
        let held = OperationLock::acquire(dir.path(), "build").unwrap();
        assert!(OperationLock::is_held(dir.path()));

        let err = OperationLock::acquire(dir.path(), "flash").unwrap_err();
        assert!(matches!(err, ProjectError::Busy { .. }));

        drop(held);
        assert!(!OperationLock::is_held(dir.path()));
        OperationLock::acquire(dir.path(), "flash").unwrap();
    }

    #[test]
    fn half_written_lock_counts_as_held() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(STATE_DIR)).unwrap();
        fs::write(dir.path().join(STATE_DIR).join(LOCK_FILE), "").unwrap();
        assert!(OperationLock::is_held(dir.path()));
        assert!(matches!(
            OperationLock::acquire(dir.path(), "build"),
            Err(ProjectError::Busy { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn lock_of_exited_process_is_taken_over() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let dead_pid = child.id();
        child.wait().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join(STATE_DIR).join(LOCK_FILE);
        fs::create_dir_all(lock_path.parent().unwrap()).unwrap();
        fs::write(&lock_path, format!("build {dead_pid}\n")).unwrap();
        assert!(!OperationLock::is_held(dir.path()));

        let lock = OperationLock::acquire(dir.path(), "clean").unwrap();
        let text = fs::read_to_string(lock.path()).unwrap();
        assert_eq!(text, format!("clean {}\n", std::process::id()));
    }
}
