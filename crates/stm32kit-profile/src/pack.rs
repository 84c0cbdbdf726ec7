//! MCU family pack declaration.
//!
//! A pack describes everything shared by a family of parts: the CPU core,
//! default memory map, GPIO ports, peripheral base addresses, the template
//! files used to render a project, and probe-tool target defaults.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::memory::MemoryMap;
use crate::probe::Transport;

/// The only declaration schema version this crate understands.
pub const SCHEMA_VERSION: u32 = 1;

/// Supported Cortex-M cores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CoreVariant {
    #[serde(rename = "cortex-m0")]
    CortexM0,
    #[serde(rename = "cortex-m0+")]
    CortexM0Plus,
    #[serde(rename = "cortex-m3")]
    CortexM3,
    #[serde(rename = "cortex-m4")]
    CortexM4,
    #[serde(rename = "cortex-m7")]
    CortexM7,
    #[serde(rename = "cortex-m33")]
    CortexM33,
}

impl CoreVariant {
    pub fn exception_model(&self) -> ExceptionModel {
        match self {
            CoreVariant::CortexM0 | CoreVariant::CortexM0Plus => ExceptionModel::Armv6m,
            CoreVariant::CortexM3 | CoreVariant::CortexM4 | CoreVariant::CortexM7 => {
                ExceptionModel::Armv7m
            }
            CoreVariant::CortexM33 => ExceptionModel::Armv8mMainline,
        }
    }

    /// Value for GCC's `-mcpu=`.
    pub fn gcc_cpu(&self) -> &'static str {
        match self {
            CoreVariant::CortexM0 => "cortex-m0",
            CoreVariant::CortexM0Plus => "cortex-m0plus",
            CoreVariant::CortexM3 => "cortex-m3",
            CoreVariant::CortexM4 => "cortex-m4",
            CoreVariant::CortexM7 => "cortex-m7",
            CoreVariant::CortexM33 => "cortex-m33",
        }
    }

    /// Floating-point flags for GCC, empty for soft-float cores.
    pub fn float_flags(&self) -> &'static str {
        match self {
            CoreVariant::CortexM4 => "-mfloat-abi=hard -mfpu=fpv4-sp-d16",
            CoreVariant::CortexM7 => "-mfloat-abi=hard -mfpu=fpv5-d16",
            CoreVariant::CortexM33 => "-mfloat-abi=hard -mfpu=fpv5-sp-d16",
            _ => "-mfloat-abi=soft",
        }
    }
}

impl std::fmt::Display for CoreVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.gcc_cpu())
    }
}

/// Exception model of a core: decides the layout of the system vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExceptionModel {
    Armv6m,
    Armv7m,
    Armv8mMainline,
}

const ARMV6M_SYSTEM_VECTORS: [Option<&str>; 15] = [
    Some("Reset_Handler"),
    Some("NMI_Handler"),
    Some("HardFault_Handler"),
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    Some("SVC_Handler"),
    None,
    None,
    Some("PendSV_Handler"),
    Some("SysTick_Handler"),
];

const ARMV7M_SYSTEM_VECTORS: [Option<&str>; 15] = [
    Some("Reset_Handler"),
    Some("NMI_Handler"),
    Some("HardFault_Handler"),
    Some("MemManage_Handler"),
    Some("BusFault_Handler"),
    Some("UsageFault_Handler"),
    None,
    None,
    None,
    None,
    Some("SVC_Handler"),
    Some("DebugMon_Handler"),
    None,
    Some("PendSV_Handler"),
    Some("SysTick_Handler"),
];

const ARMV8M_SYSTEM_VECTORS: [Option<&str>; 15] = [
    Some("Reset_Handler"),
    Some("NMI_Handler"),
    Some("HardFault_Handler"),
    Some("MemManage_Handler"),
    Some("BusFault_Handler"),
    Some("UsageFault_Handler"),
    Some("SecureFault_Handler"),
    None,
    None,
    None,
    Some("SVC_Handler"),
    Some("DebugMon_Handler"),
    None,
    Some("PendSV_Handler"),
    Some("SysTick_Handler"),
];

impl ExceptionModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExceptionModel::Armv6m => "armv6m",
            ExceptionModel::Armv7m => "armv7m",
            ExceptionModel::Armv8mMainline => "armv8m-mainline",
        }
    }

    /// Handlers for vector slots 1..=15 (slot 0 is the initial stack pointer).
    /// `None` marks a reserved slot.
    pub fn system_vectors(&self) -> &'static [Option<&'static str>; 15] {
        match self {
            ExceptionModel::Armv6m => &ARMV6M_SYSTEM_VECTORS,
            ExceptionModel::Armv7m => &ARMV7M_SYSTEM_VECTORS,
            ExceptionModel::Armv8mMainline => &ARMV8M_SYSTEM_VECTORS,
        }
    }

    /// Architectural limit on external interrupt lines.
    pub fn max_external_irqs(&self) -> u16 {
        match self {
            ExceptionModel::Armv6m => 32,
            ExceptionModel::Armv7m => 496,
            ExceptionModel::Armv8mMainline => 480,
        }
    }

    /// Whether the core has stack-limit registers (`MSPLIM`/`PSPLIM`).
    pub fn has_stack_limit(&self) -> bool {
        matches!(self, ExceptionModel::Armv8mMainline)
    }
}

/// Template files (relative to the pack's `templates/` directory).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TemplateSet {
    pub hal_header: String,
    pub hal_source: String,
    pub pins_header: String,
    pub pins_source: String,
    pub main: String,
    pub linker: String,
    pub openocd: String,
    pub cmake: String,
    pub cmake_toolchain: String,
    pub makefile: String,
}

impl TemplateSet {
    /// `(field, file)` pairs in declaration order.
    pub fn entries(&self) -> [(&'static str, &str); 10] {
        [
            ("hal-header", &self.hal_header),
            ("hal-source", &self.hal_source),
            ("pins-header", &self.pins_header),
            ("pins-source", &self.pins_source),
            ("main", &self.main),
            ("linker", &self.linker),
            ("openocd", &self.openocd),
            ("cmake", &self.cmake),
            ("cmake-toolchain", &self.cmake_toolchain),
            ("makefile", &self.makefile),
        ]
    }
}

/// Startup-file template selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct StartupTemplates {
    /// Template used when no per-model override exists.
    pub template: String,
    /// Number of device-specific interrupt vectors.
    pub irq_count: u16,
    /// Per-exception-model overrides, keyed by model name (`armv6m`, ...).
    #[serde(default)]
    pub per_model: BTreeMap<String, String>,
}

impl StartupTemplates {
    pub fn template_for(&self, model: ExceptionModel) -> &str {
        self.per_model
            .get(model.as_str())
            .map(String::as_str)
            .unwrap_or(&self.template)
    }
}

/// Probe-tool defaults shared by every board of the family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PackProbeDefaults {
    /// OpenOCD target script, e.g. `target/stm32l5x.cfg`.
    pub target_cfg: String,
    #[serde(default)]
    pub transport: Transport,
    #[serde(default = "default_speed_khz")]
    pub speed_khz: u32,
}

fn default_speed_khz() -> u32 {
    4000
}

fn default_gpio_ports() -> Vec<char> {
    vec!['A', 'B', 'C', 'D', 'E', 'F', 'G', 'H']
}

/// An MCU family pack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Pack {
    pub schema_version: u32,
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub core: CoreVariant,
    pub memory: MemoryMap,
    pub system_clock_hz: u32,
    #[serde(default = "default_gpio_ports")]
    pub gpio_ports: Vec<char>,
    /// Peripheral base addresses, e.g. `GPIOA = 0x42020000`.
    #[serde(default)]
    pub peripherals: BTreeMap<String, u64>,
    pub templates: TemplateSet,
    pub startup: StartupTemplates,
    pub probe: PackProbeDefaults,
    /// Directory the pack was loaded from.
    #[serde(skip)]
    pub root: PathBuf,
}

impl Pack {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.root.join("templates")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exception_models_by_core() {
        assert_eq!(CoreVariant::CortexM0.exception_model(), ExceptionModel::Armv6m);
        assert_eq!(CoreVariant::CortexM4.exception_model(), ExceptionModel::Armv7m);
        assert_eq!(
            CoreVariant::CortexM33.exception_model(),
            ExceptionModel::Armv8mMainline
        );
    }

    #[test]
    fn armv8m_adds_secure_fault() {
        let v7 = ExceptionModel::Armv7m.system_vectors();
        let v8 = ExceptionModel::Armv8mMainline.system_vectors();
        assert_eq!(v7[6], None);
        assert_eq!(v8[6], Some("SecureFault_Handler"));
        assert_eq!(ExceptionModel::Armv6m.system_vectors()[3], None);
    }

    #[test]
    fn startup_override_selection() {
        let mut startup = StartupTemplates {
            template: "startup.s.tmpl".into(),
            irq_count: 32,
            per_model: BTreeMap::new(),
        };
        assert_eq!(startup.template_for(ExceptionModel::Armv8mMainline), "startup.s.tmpl");
        startup
            .per_model
            .insert("armv8m-mainline".into(), "startup_v8m.s.tmpl".into());
        assert_eq!(
            startup.template_for(ExceptionModel::Armv8mMainline),
            "startup_v8m.s.tmpl"
        );
        assert_eq!(startup.template_for(ExceptionModel::Armv7m), "startup.s.tmpl");
    }
}
