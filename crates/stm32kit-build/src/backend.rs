//! Interchangeable build tools behind one configure/build/flash contract.

use std::path::{Path, PathBuf};

use stm32kit_render::{BackendKind, BUILD_DIR, ELF_STEM};

use crate::error::{BuildError, Result};
use crate::flash::{FlashPlan, FlashReport, FlashSession, OpenOcdBridge, ResetPrompt};
use crate::process::{CancelToken, CommandRunner, CommandSpec};
use crate::toolchain::{self, CMAKE, GCC, MAKE, NINJA, OPENOCD};

/// Project-relative path of the generated CMake toolchain file.
pub const CMAKE_TOOLCHAIN_FILE: &str = "cmake/toolchain-arm-none-eabi.cmake";

/// Everything a backend step needs from its caller.
pub struct BuildContext<'a> {
    pub root: &'a Path,
    pub runner: &'a dyn CommandRunner,
    pub cancel: &'a CancelToken,
}

impl BuildContext<'_> {
    fn require_all(&self, tools: &[&str]) -> Result<()> {
        tools.iter().try_for_each(|tool| self.runner.require(tool))
    }

    fn run(&self, spec: CommandSpec) -> Result<()> {
        log::info!("$ {spec}");
        self.runner.run(&spec, self.cancel)?.check(&spec)?;
        Ok(())
    }
}

pub trait BuildBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Whether `configure` has produced a usable build tree.
    fn is_configured(&self, root: &Path) -> bool;

    fn configure(&self, ctx: &BuildContext<'_>) -> Result<()>;

    fn build(&self, ctx: &BuildContext<'_>) -> Result<()>;

    /// Program the target through the flash session state machine.
    fn flash(
        &self,
        ctx: &BuildContext<'_>,
        plan: FlashPlan,
        prompt: &mut dyn ResetPrompt,
    ) -> Result<FlashReport> {
        ctx.runner.require(OPENOCD)?;
        log::info!("flashing {}", plan.artifact.display());
        let bridge = OpenOcdBridge::new(ctx.runner, plan);
        Ok(FlashSession::new(bridge, prompt, ctx.cancel.clone()).run()?)
    }
}

/// CMake with the Ninja generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct CmakeBackend;

impl BuildBackend for CmakeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Cmake
    }

    fn is_configured(&self, root: &Path) -> bool {
        root.join(BUILD_DIR).join("CMakeCache.txt").is_file()
    }

    fn configure(&self, ctx: &BuildContext<'_>) -> Result<()> {
        ctx.require_all(&[CMAKE, NINJA, GCC])?;
        ctx.run(
            CommandSpec::new(CMAKE, ctx.root)
                .args(["-S", ".", "-B", BUILD_DIR, "-G", "Ninja"])
                .arg(format!("-DCMAKE_TOOLCHAIN_FILE={CMAKE_TOOLCHAIN_FILE}")),
        )
    }

    fn build(&self, ctx: &BuildContext<'_>) -> Result<()> {
        ctx.require_all(toolchain::required_for(BackendKind::Cmake))?;
        ctx.run(CommandSpec::new(CMAKE, ctx.root).args(["--build", BUILD_DIR]))
    }
}

/// Plain `make` against the generated Makefile.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeBackend;

impl BuildBackend for MakeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Make
    }

    fn is_configured(&self, _root: &Path) -> bool {
        true
    }

    fn configure(&self, _ctx: &BuildContext<'_>) -> Result<()> {
        log::debug!("make needs no configure step");
        Ok(())
    }

    fn build(&self, ctx: &BuildContext<'_>) -> Result<()> {
        ctx.require_all(toolchain::required_for(BackendKind::Make))?;
        ctx.run(CommandSpec::new(MAKE, ctx.root))
    }
}

pub fn backend_for(kind: BackendKind) -> Box<dyn BuildBackend> {
    match kind {
        BackendKind::Cmake => Box::new(CmakeBackend),
        BackendKind::Make => Box::new(MakeBackend),
    }
}

/// Locate the linked image: `build/firmware.elf`, else the first `*.elf`
/// under `build/` in path order. Returns a project-relative path.
pub fn find_artifact(root: &Path) -> Result<PathBuf> {
    let build = root.join(BUILD_DIR);
    let preferred = Path::new(BUILD_DIR).join(format!("{ELF_STEM}.elf"));
    if root.join(&preferred).is_file() {
        return Ok(preferred);
    }
    let mut found = Vec::new();
    collect_elves(&build, &mut found)?;
    found.sort();
    found
        .into_iter()
        .next()
        .and_then(|path| path.strip_prefix(root).ok().map(Path::to_path_buf))
        .ok_or(BuildError::ArtifactNotFound { dir: build })
}

fn collect_elves(dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(BuildError::io(dir)(e)),
    };
    for entry in entries {
        let path = entry.map_err(BuildError::io(dir))?.path();
        if path.is_dir() {
            collect_elves(&path, found)?;
        } else if path.extension().is_some_and(|ext| ext == "elf") {
            found.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::process::fixtures::{Scripted, ScriptedRunner};

    fn ctx<'a>(root: &'a Path, runner: &'a ScriptedRunner, cancel: &'a CancelToken) -> BuildContext<'a> {
        BuildContext {
            root,
            runner,
            cancel,
        }
    }

    #[test]
    fn cmake_configures_with_ninja_and_toolchain_file() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::default();
        let cancel = CancelToken::new();
        CmakeBackend.configure(&ctx(dir.path(), &runner, &cancel)).unwrap();
        CmakeBackend.build(&ctx(dir.path(), &runner, &cancel)).unwrap();
        assert_eq!(
            runner.command_lines(),
            [
                "cmake -S . -B build -G Ninja -DCMAKE_TOOLCHAIN_FILE=cmake/toolchain-arm-none-eabi.cmake",
                "cmake --build build",
            ]
        );
    }

    #[test]
    fn make_configure_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::default();
        let cancel = CancelToken::new();
        MakeBackend.configure(&ctx(dir.path(), &runner, &cancel)).unwrap();
        assert!(runner.calls().is_empty());
        assert!(MakeBackend.is_configured(dir.path()));
        MakeBackend.build(&ctx(dir.path(), &runner, &cancel)).unwrap();
        assert_eq!(runner.command_lines(), ["make"]);
    }

    #[test]
    fn missing_tool_fails_before_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::default().without(NINJA);
        let cancel = CancelToken::new();
        let err = CmakeBackend
            .configure(&ctx(dir.path(), &runner, &cancel))
            .unwrap_err();
        assert!(matches!(err, BuildError::ToolchainNotFound { ref tool } if tool == "ninja"));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn failed_build_reports_exit_code_and_tail() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new([Scripted::Fail(2, vec!["main.c:4: error: 'x' undeclared"])]);
        let cancel = CancelToken::new();
        let err = MakeBackend.build(&ctx(dir.path(), &runner, &cancel)).unwrap_err();
        match err {
            BuildError::BuildFailure {
                step,
                exit_code,
                tail,
            } => {
                assert_eq!(step, "make");
                assert_eq!(exit_code, Some(2));
                assert_eq!(tail, ["main.c:4: error: 'x' undeclared"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn flash_requires_openocd() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::default().without(OPENOCD);
        let cancel = CancelToken::new();
        let plan = FlashPlan {
            root: dir.path().to_path_buf(),
            artifact: PathBuf::from("build/firmware.elf"),
            probe: stm32kit_profile::ProbeConfig {
                interface_cfg: "interface/stlink.cfg".into(),
                target_cfg: PathBuf::from("target/stm32f0x.cfg"),
                bundled_target: None,
                transport: Default::default(),
                speed_khz: 1800,
                reset_strategy: Default::default(),
                reset_config: Vec::new(),
            },
            flash: stm32kit_profile::MemoryRegion::new(0x0800_0000, 0x4_0000),
        };
        let err = MakeBackend
            .flash(&ctx(dir.path(), &runner, &cancel), plan, &mut crate::flash::AutoRetry)
            .unwrap_err();
        assert!(matches!(err, BuildError::ToolchainNotFound { ref tool } if tool == "openocd"));
    }

    #[test]
    fn artifact_prefers_firmware_elf() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("build/sub")).unwrap();
        fs::write(dir.path().join("build/sub/a.elf"), b"").unwrap();
        assert_eq!(find_artifact(dir.path()).unwrap(), PathBuf::from("build/sub/a.elf"));
        fs::write(dir.path().join("build/firmware.elf"), b"").unwrap();
        assert_eq!(find_artifact(dir.path()).unwrap(), PathBuf::from("build/firmware.elf"));
    }

    #[test]
    fn artifact_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            find_artifact(dir.path()),
            Err(BuildError::ArtifactNotFound { .. })
        ));
    }
}
