//! `stm32kit.toml` tool configuration and setting precedence.
//!
//! Precedence, highest first: command-line flags, the `STM32KIT_DATA`
//! environment variable (catalog root only), `stm32kit.toml` found by
//! walking up from the working directory, built-in defaults.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use stm32kit_profile::Catalog;
use stm32kit_project::PreservePolicy;
use stm32kit_render::BackendKind;

pub const CONFIG_FILE: &str = "stm32kit.toml";

/// Environment variable naming the catalog root.
pub const DATA_ENV: &str = "STM32KIT_DATA";

/// Contents of `stm32kit.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ToolConfig {
    /// Catalog root; relative paths are resolved against the file's directory.
    #[serde(default)]
    pub catalog: Option<PathBuf>,
    /// Backend for new projects.
    #[serde(default)]
    pub backend: Option<BackendKind>,
    #[serde(default)]
    pub preserve: Option<PreservePolicy>,
    /// Replaces the board's adapter speed when flashing.
    #[serde(default)]
    pub adapter_speed_khz: Option<u32>,
    /// Prompt before manual reset retries (default: when stdin is a terminal).
    #[serde(default)]
    pub interactive_reset: Option<bool>,
}

impl ToolConfig {
    /// Search upward from `start_dir` for `stm32kit.toml`, returning the parsed
    /// file and the directory it was found in.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.is_file() {
                let content = std::fs::read_to_string(&candidate)
                    .with_context(|| format!("reading {}", candidate.display()))?;
                let config = Self::from_str(&content)
                    .with_context(|| format!("parsing {}", candidate.display()))?;
                return Ok(Some((config, dir)));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    pub fn from_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}

/// Effective settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub catalog_root: Option<PathBuf>,
    pub backend: BackendKind,
    pub preserve: PreservePolicy,
    pub adapter_speed_khz: Option<u32>,
    pub interactive_reset: bool,
}

impl Settings {
    pub fn resolve(cwd: &Path, catalog_flag: Option<&Path>) -> Result<Self> {
        let found = ToolConfig::find_and_load(cwd)?;
        if let Some((_, dir)) = &found {
            log::debug!("using {}", dir.join(CONFIG_FILE).display());
        }
        let env = std::env::var_os(DATA_ENV).map(PathBuf::from);
        Ok(Self::combine(
            cwd,
            catalog_flag,
            env.as_deref(),
            found.as_ref().map(|(c, d)| (c, d.as_path())),
            std::io::stdin().is_terminal(),
        ))
    }

    fn combine(
        cwd: &Path,
        catalog_flag: Option<&Path>,
        env: Option<&Path>,
        config: Option<(&ToolConfig, &Path)>,
        terminal: bool,
    ) -> Self {
        let from_config = config.and_then(|(c, dir)| c.catalog.as_ref().map(|p| dir.join(p)));
        let catalog_root = catalog_flag
            .map(|p| cwd.join(p))
            .or_else(|| env.map(|p| cwd.join(p)))
            .or(from_config)
            .or_else(|| find_catalog(cwd));
        let config = config.map(|(c, _)| c.clone()).unwrap_or_default();
        Self {
            catalog_root,
            backend: config.backend.unwrap_or_default(),
            preserve: config.preserve.unwrap_or_default(),
            adapter_speed_khz: config.adapter_speed_khz,
            interactive_reset: config.interactive_reset.unwrap_or(terminal),
        }
    }

    pub fn catalog(&self) -> Result<Catalog> {
        let root = self.catalog_root.as_ref().with_context(|| {
            format!("no catalog found; pass --catalog, set {DATA_ENV}, or set `catalog` in {CONFIG_FILE}")
        })?;
        Catalog::open(root).with_context(|| format!("opening catalog {}", root.display()))
    }
}

/// The nearest ancestor holding both `packs/` and `boards/`.
fn find_catalog(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join("packs").is_dir() && dir.join("boards").is_dir())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let config = ToolConfig::from_str(
            r#"
catalog = "hw"
backend = "make"
preserve = "sources"
adapter-speed-khz = 950
interactive-reset = false
"#,
        )
        .unwrap();
        assert_eq!(config.catalog.as_deref(), Some(Path::new("hw")));
        assert_eq!(config.backend, Some(BackendKind::Make));
        assert_eq!(config.preserve, Some(PreservePolicy::Sources));
        assert_eq!(config.adapter_speed_khz, Some(950));
        assert_eq!(config.interactive_reset, Some(false));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(ToolConfig::from_str("colour = \"blue\"").is_err());
    }

    #[test]
    fn found_upward_from_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "backend = \"make\"\n").unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        let (config, found_in) = ToolConfig::find_and_load(&nested).unwrap().unwrap();
        assert_eq!(config.backend, Some(BackendKind::Make));
        assert_eq!(found_in, dir.path());
    }

    #[test]
    fn flag_beats_env_beats_config() {
        let cwd = Path::new("/work");
        let config = ToolConfig {
            catalog: Some(PathBuf::from("hw")),
            ..ToolConfig::default()
        };
        let with_config = Some((&config, Path::new("/etc/kit")));

        let s = Settings::combine(cwd, Some(Path::new("flag")), Some(Path::new("/env")), with_config, false);
        assert_eq!(s.catalog_root, Some(PathBuf::from("/work/flag")));
        let s = Settings::combine(cwd, None, Some(Path::new("/env")), with_config, false);
        assert_eq!(s.catalog_root, Some(PathBuf::from("/env")));
        let s = Settings::combine(cwd, None, None, with_config, false);
        assert_eq!(s.catalog_root, Some(PathBuf::from("/etc/kit/hw")));
    }

    #[test]
    fn defaults_without_config() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::combine(dir.path(), None, None, None, true);
        assert_eq!(s.backend, BackendKind::Cmake);
        assert_eq!(s.preserve, PreservePolicy::All);
        assert!(s.interactive_reset);
        assert_eq!(s.adapter_speed_khz, None);
    }

    #[test]
    fn catalog_discovered_from_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("packs")).unwrap();
        std::fs::create_dir_all(dir.path().join("boards")).unwrap();
        let nested = dir.path().join("projects/blinky");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_catalog(&nested), Some(dir.path().to_path_buf()));
    }
}
