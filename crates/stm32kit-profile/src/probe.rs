//! Debug-probe configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Debug transport selected on the probe adapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Transport {
    #[default]
    Swd,
    Jtag,
    DapdirectSwd,
    HlaSwd,
}

impl Transport {
    /// Name understood by `transport select`.
    pub fn as_openocd(&self) -> &'static str {
        match self {
            Transport::Swd => "swd",
            Transport::Jtag => "jtag",
            Transport::DapdirectSwd => "dapdirect_swd",
            Transport::HlaSwd => "hla_swd",
        }
    }
}

/// How the target is restarted once programming has finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResetStrategy {
    /// Pulse the NRST line.
    #[default]
    Hardware,
    /// Request a system reset through the debug port (SYSRESETREQ).
    Software,
}

/// Probe settings declared by a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct BoardProbe {
    /// OpenOCD interface script, e.g. `interface/stlink.cfg`.
    pub interface_cfg: String,
    /// Replaces the pack's target script.
    #[serde(default)]
    pub target_cfg: Option<String>,
    #[serde(default)]
    pub transport: Option<Transport>,
    #[serde(default)]
    pub speed_khz: Option<u32>,
    #[serde(default)]
    pub reset_strategy: ResetStrategy,
    /// Extra OpenOCD commands issued before `init`, verbatim.
    #[serde(default)]
    pub reset_config: Vec<String>,
}

/// Fully resolved probe configuration handed to the flash session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProbeConfig {
    pub interface_cfg: String,
    /// Target script as declared, relative to OpenOCD's search path.
    pub target_cfg: PathBuf,
    /// The pack's own copy of `target_cfg`, when it ships one. Rendered
    /// projects carry this script under `openocd/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundled_target: Option<PathBuf>,
    pub transport: Transport,
    pub speed_khz: u32,
    pub reset_strategy: ResetStrategy,
    pub reset_config: Vec<String>,
}

impl ProbeConfig {
    /// Override the adapter speed (from tool configuration or the command line).
    pub fn with_speed_khz(mut self, speed_khz: Option<u32>) -> Self {
        if let Some(speed) = speed_khz {
            self.speed_khz = speed;
        }
        self
    }
}
