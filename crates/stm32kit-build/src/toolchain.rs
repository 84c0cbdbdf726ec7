//! Locating external tools on `PATH`.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use stm32kit_render::BackendKind;

use crate::error::{BuildError, Result};

pub const GCC: &str = "arm-none-eabi-gcc";
pub const OBJCOPY: &str = "arm-none-eabi-objcopy";
pub const CMAKE: &str = "cmake";
pub const NINJA: &str = "ninja";
pub const MAKE: &str = "make";
pub const OPENOCD: &str = "openocd";

/// Every tool the workflow may invoke, in the order `doctor` reports them.
pub const KNOWN_TOOLS: [&str; 6] = [GCC, OBJCOPY, CMAKE, NINJA, MAKE, OPENOCD];

/// Tools a backend needs to configure and build.
pub fn required_for(backend: BackendKind) -> &'static [&'static str] {
    match backend {
        BackendKind::Cmake => &[CMAKE, NINJA, GCC, OBJCOPY],
        BackendKind::Make => &[MAKE, GCC, OBJCOPY],
    }
}

/// Search `PATH` for an executable.
pub fn find_program(name: &str) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    find_in(name, &path)
}

fn find_in(name: &str, path: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(path)
        .flat_map(|dir| executable_names(name).into_iter().map(move |n| dir.join(n)))
        .find(|candidate| is_executable(candidate))
}

#[cfg(windows)]
fn executable_names(name: &str) -> Vec<String> {
    vec![format!("{name}.exe"), name.to_string()]
}

#[cfg(not(windows))]
fn executable_names(name: &str) -> Vec<String> {
    vec![name.to_string()]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Like [`find_program`], but a missing tool is an error.
pub fn require(name: &str) -> Result<PathBuf> {
    find_program(name).ok_or_else(|| BuildError::ToolchainNotFound {
        tool: name.to_string(),
    })
}

/// Availability of one tool, as reported by `doctor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStatus {
    pub name: &'static str,
    pub path: Option<PathBuf>,
    /// First line the tool prints for `--version`.
    pub version: Option<String>,
}

impl ToolStatus {
    pub fn is_available(&self) -> bool {
        self.path.is_some()
    }
}

/// Locate a tool and ask it for its version.
pub fn probe(name: &'static str) -> ToolStatus {
    let path = find_program(name);
    let version = path.as_ref().and_then(|p| {
        // OpenOCD prints its banner on stderr.
        let output = Command::new(p).arg("--version").output().ok()?;
        let text = if output.stdout.is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        String::from_utf8_lossy(&text)
            .lines()
            .next()
            .map(|line| line.trim().to_string())
    });
    ToolStatus {
        name,
        path,
        version,
    }
}

/// Probe every known tool.
pub fn survey() -> Vec<ToolStatus> {
    KNOWN_TOOLS.iter().map(|name| probe(name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backends_need_the_cross_compiler() {
        for backend in [BackendKind::Cmake, BackendKind::Make] {
            assert!(required_for(backend).contains(&GCC));
        }
        assert!(required_for(BackendKind::Cmake).contains(&NINJA));
        assert!(!required_for(BackendKind::Make).contains(&CMAKE));
    }

    #[cfg(unix)]
    #[test]
    fn finds_only_executables_in_path() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("arm-none-eabi-gcc");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        std::fs::write(dir.path().join("openocd"), "not executable").unwrap();

        let path = std::env::join_paths([dir.path()]).unwrap();
        assert_eq!(find_in("arm-none-eabi-gcc", &path), Some(tool));
        assert_eq!(find_in("openocd", &path), None);
        assert_eq!(find_in("make", &path), None);
    }

    #[test]
    fn missing_tool_is_reported_by_name() {
        let err = require("stm32kit-no-such-tool").unwrap_err();
        assert!(matches!(err, BuildError::ToolchainNotFound { ref tool } if tool == "stm32kit-no-such-tool"));
    }
}
