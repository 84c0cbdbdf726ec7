//! [`ProbeBridge`] over the OpenOCD command line.
//!
//! Each step is a separate `openocd` invocation against the generated
//! `openocd/target.cfg`, so a failing step leaves no daemon behind and its
//! output is the step's diagnostic.

use std::path::PathBuf;

use stm32kit_profile::{MemoryRegion, ProbeConfig, ResetStrategy};
use stm32kit_render::OPENOCD_CFG;

use crate::error::BuildError;
use crate::process::{CancelToken, CommandRunner, CommandSpec};
use crate::toolchain::OPENOCD;

use super::session::{BridgeError, ConnectMode, ProbeBridge};

/// Reset lines used for connect-under-reset when the board declares none.
pub const CONNECT_UNDER_RESET: &str = "reset_config srst_only srst_nogate connect_assert_srst";

/// Reset lines for a manual retry: the user drives NRST.
pub const MANUAL_RESET: &str = "reset_config none";

/// What to write and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashPlan {
    /// Project directory; OpenOCD runs here.
    pub root: PathBuf,
    /// Image to program, relative to `root` or absolute.
    pub artifact: PathBuf,
    pub probe: ProbeConfig,
    /// Region erased before programming.
    pub flash: MemoryRegion,
}

pub struct OpenOcdBridge<'a> {
    runner: &'a dyn CommandRunner,
    plan: FlashPlan,
    mode: Option<ConnectMode>,
}

impl<'a> OpenOcdBridge<'a> {
    pub fn new(runner: &'a dyn CommandRunner, plan: FlashPlan) -> Self {
        Self {
            runner,
            plan,
            mode: None,
        }
    }

    pub fn plan(&self) -> &FlashPlan {
        &self.plan
    }

    fn command(&self, mode: ConnectMode, steps: &[String]) -> CommandSpec {
        let probe = &self.plan.probe;
        let mut spec = CommandSpec::new(OPENOCD, &self.plan.root)
            .args(["-f", OPENOCD_CFG])
            .args(["-c".to_string(), format!("adapter speed {}", probe.speed_khz)]);
        match mode {
            // Board reset lines are already part of the generated script.
            ConnectMode::UnderReset if probe.reset_config.is_empty() => {
                spec = spec.args(["-c", CONNECT_UNDER_RESET]);
            }
            ConnectMode::UnderReset => {}
            ConnectMode::Manual => spec = spec.args(["-c", MANUAL_RESET]),
        }
        spec = spec.args(["-c", "init"]);
        for step in steps {
            spec = spec.args(["-c", step.as_str()]);
        }
        spec.args(["-c", "shutdown"])
    }

    fn invoke(&self, mode: ConnectMode, steps: &[String], cancel: &CancelToken) -> Result<(), BridgeError> {
        let spec = self.command(mode, steps);
        match self.runner.run(&spec, cancel) {
            Ok(output) if output.success => Ok(()),
            Ok(output) => Err(BridgeError::Failed {
                diagnostic: output.diagnostic(),
            }),
            Err(BuildError::Cancelled) => Err(BridgeError::Cancelled),
            Err(e) => Err(BridgeError::Failed {
                diagnostic: e.to_string(),
            }),
        }
    }

    fn connected_mode(&self) -> ConnectMode {
        self.mode.unwrap_or(ConnectMode::UnderReset)
    }

    /// The artifact path as an OpenOCD word (braced, `/`-separated).
    fn artifact_word(&self) -> String {
        let path = self.plan.artifact.to_string_lossy().replace('\\', "/");
        format!("{{{path}}}")
    }
}

impl ProbeBridge for OpenOcdBridge<'_> {
    fn connect(&mut self, mode: ConnectMode, cancel: &CancelToken) -> Result<(), BridgeError> {
        self.invoke(mode, &["reset halt".to_string()], cancel)?;
        self.mode = Some(mode);
        Ok(())
    }

    fn erase(&mut self, cancel: &CancelToken) -> Result<(), BridgeError> {
        let flash = &self.plan.flash;
        let steps = [
            "reset halt".to_string(),
            format!("flash erase_address 0x{:08X} 0x{:X}", flash.origin, flash.length),
        ];
        self.invoke(self.connected_mode(), &steps, cancel)
    }

    fn program(&mut self, cancel: &CancelToken) -> Result<(), BridgeError> {
        let steps = ["reset halt".to_string(), format!("program {}", self.artifact_word())];
        self.invoke(self.connected_mode(), &steps, cancel)
    }

    fn verify(&mut self, cancel: &CancelToken) -> Result<(), BridgeError> {
        let steps = [
            "reset halt".to_string(),
            format!("verify_image {}", self.artifact_word()),
        ];
        self.invoke(self.connected_mode(), &steps, cancel)
    }

    fn reset(&mut self, cancel: &CancelToken) -> Result<(), BridgeError> {
        let steps: Vec<String> = match self.plan.probe.reset_strategy {
            ResetStrategy::Hardware => vec!["reset run".into()],
            ResetStrategy::Software => vec![
                "cortex_m reset_config sysresetreq".into(),
                "reset run".into(),
            ],
        };
        self.invoke(self.connected_mode(), &steps, cancel)
    }
}
