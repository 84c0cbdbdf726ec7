//! Atomic file replacement.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{ProjectError, Result};

/// Write `data` to `path` through a temporary file in the same directory,
/// creating parent directories as needed. Readers see either the old or the
/// new content, never a mix.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(ProjectError::io(parent))?;
    let mut tmp = NamedTempFile::new_in(parent).map_err(ProjectError::io(parent))?;
    tmp.write_all(data).map_err(ProjectError::io(path))?;
    tmp.as_file().sync_all().map_err(ProjectError::io(path))?;
    tmp.persist(path).map_err(|e| ProjectError::Io {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_parents_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openocd/target.cfg");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("openocd"))
            .unwrap()
            .collect();
        assert_eq!(leftovers.len(), 1);
    }
}
