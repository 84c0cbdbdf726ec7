//! TOML parsing, validation, and discovery for pack and board declarations.
//!
//! Packs live in `<root>/packs/<id>/pack.toml` next to a `templates/`
//! directory; boards live in `<root>/boards/<id>.toml`. Declarations are
//! strict: unknown fields, missing required fields, and unsupported schema
//! versions are all schema errors.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::board::Board;
use crate::error::{ProfileError, Result};
use crate::pack::{ExceptionModel, Pack, SCHEMA_VERSION};
use crate::pin::{is_identifier, PinId, DEBUG_PINS, PINS_PER_PORT};

const EXCEPTION_MODELS: [ExceptionModel; 3] = [
    ExceptionModel::Armv6m,
    ExceptionModel::Armv7m,
    ExceptionModel::Armv8mMainline,
];

/// Severity of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A validation issue found in a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub message: String,
}

impl ValidationIssue {
    fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

/// Load and validate a pack from its `pack.toml`.
pub fn load_pack_toml(path: &Path) -> Result<Pack> {
    let content = read(path)?;
    let mut pack = parse_pack_toml(&content, &path.display().to_string())?;
    pack.root = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    ensure_valid(&path.display().to_string(), validate_pack(&pack))?;
    Ok(pack)
}

/// Parse a pack from a TOML string without validating it.
pub fn parse_pack_toml(toml_str: &str, origin: &str) -> Result<Pack> {
    toml::from_str(toml_str).map_err(|e| ProfileError::schema(origin, e.to_string()))
}

/// Load and validate a board from its TOML file.
pub fn load_board_toml(path: &Path) -> Result<Board> {
    let content = read(path)?;
    let board = parse_board_toml(&content, &path.display().to_string())?;
    ensure_valid(&path.display().to_string(), validate_board(&board))?;
    Ok(board)
}

/// Parse a board from a TOML string without validating it.
pub fn parse_board_toml(toml_str: &str, origin: &str) -> Result<Board> {
    toml::from_str(toml_str).map_err(|e| ProfileError::schema(origin, e.to_string()))
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| ProfileError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Turn validation findings into a schema error, logging warnings.
pub fn ensure_valid(
    origin: &str,
    outcome: std::result::Result<(), Vec<ValidationIssue>>,
) -> Result<()> {
    let issues = match outcome {
        Ok(()) => return Ok(()),
        Err(issues) => issues,
    };
    let mut errors = Vec::new();
    for issue in issues {
        match issue.severity {
            Severity::Warning => log::warn!("{origin}: {}", issue.message),
            Severity::Error => errors.push(issue.message),
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ProfileError::schema(origin, errors.join("; ")))
    }
}

/// Validate a pack for structural correctness.
///
/// Returns `Ok(())` if there are no findings, or `Err(issues)`; warnings
/// alone do not make a pack unusable.
pub fn validate_pack(pack: &Pack) -> std::result::Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    if pack.schema_version != SCHEMA_VERSION {
        issues.push(ValidationIssue::error(format!(
            "unsupported schema-version {} (expected {SCHEMA_VERSION})",
            pack.schema_version
        )));
    }

    if pack.id.trim().is_empty() {
        issues.push(ValidationIssue::error("pack id is empty"));
    }

    if pack.memory.flash.length == 0 {
        issues.push(ValidationIssue::error("flash region has zero length"));
    }
    if pack.memory.ram.length == 0 {
        issues.push(ValidationIssue::error("ram region has zero length"));
    }
    if pack.memory.flash.overlaps(&pack.memory.ram) {
        issues.push(ValidationIssue::error(format!(
            "flash (0x{:08X}..0x{:08X}) and ram (0x{:08X}..0x{:08X}) overlap",
            pack.memory.flash.origin,
            pack.memory.flash.end(),
            pack.memory.ram.origin,
            pack.memory.ram.end()
        )));
    }

    check_ports(&pack.gpio_ports, "gpio-ports", &mut issues);
    if !pack.gpio_ports.contains(&'A') {
        issues.push(ValidationIssue::error(
            "gpio-ports must include port A (debug pins live there)",
        ));
    }

    for (field, file) in pack.templates.entries() {
        if file.trim().is_empty() {
            issues.push(ValidationIssue::error(format!(
                "templates.{field} is empty"
            )));
        }
    }
    if pack.startup.template.trim().is_empty() {
        issues.push(ValidationIssue::error("startup.template is empty"));
    }
    for model in pack.startup.per_model.keys() {
        if !EXCEPTION_MODELS.iter().any(|m| m.as_str() == model) {
            issues.push(ValidationIssue::error(format!(
                "startup.per-model: unknown exception model '{model}'"
            )));
        }
    }

    let model = pack.core.exception_model();
    if pack.startup.irq_count == 0 {
        issues.push(ValidationIssue::error("startup.irq-count is zero"));
    } else if pack.startup.irq_count > model.max_external_irqs() {
        issues.push(ValidationIssue::error(format!(
            "startup.irq-count {} exceeds the {} interrupts supported by {}",
            pack.startup.irq_count,
            model.max_external_irqs(),
            pack.core
        )));
    }

    if pack.system_clock_hz == 0 {
        issues.push(ValidationIssue::warning("system-clock-hz is zero"));
    }

    if pack.probe.target_cfg.trim().is_empty() {
        issues.push(ValidationIssue::error("probe.target-cfg is empty"));
    }
    if pack.probe.speed_khz == 0 {
        issues.push(ValidationIssue::error("probe.speed-khz is zero"));
    }

    for port in &pack.gpio_ports {
        if !pack.peripherals.contains_key(&format!("GPIO{port}")) {
            issues.push(ValidationIssue::error(format!(
                "peripherals: missing base address for GPIO{port}"
            )));
        }
    }

    for name in pack.peripherals.keys() {
        if !is_identifier(name) {
            issues.push(ValidationIssue::error(format!(
                "peripheral name '{name}' is not a C identifier"
            )));
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

/// Validate a board on its own (port membership is checked at merge time,
/// once the pack is known).
pub fn validate_board(board: &Board) -> std::result::Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    if board.schema_version != SCHEMA_VERSION {
        issues.push(ValidationIssue::error(format!(
            "unsupported schema-version {} (expected {SCHEMA_VERSION})",
            board.schema_version
        )));
    }
    if board.id.trim().is_empty() {
        issues.push(ValidationIssue::error("board id is empty"));
    }
    if board.pack.trim().is_empty() {
        issues.push(ValidationIssue::error("pack reference is empty"));
    }

    if !is_identifier(&board.led.alias) {
        issues.push(ValidationIssue::error(format!(
            "led.alias '{}' is not a valid pin name",
            board.led.alias
        )));
    }
    if let Some(button) = &board.button {
        if !is_identifier(&button.alias) {
            issues.push(ValidationIssue::error(format!(
                "button.alias '{}' is not a valid pin name",
                button.alias
            )));
        }
    }
    if !is_identifier(&board.serial.usart) {
        issues.push(ValidationIssue::error(format!(
            "serial.usart '{}' is not a valid peripheral name",
            board.serial.usart
        )));
    }
    if board.serial.baud == 0 {
        issues.push(ValidationIssue::error("serial.baud is zero"));
    }
    if board.serial.tx.id() == board.serial.rx.id() {
        issues.push(ValidationIssue::error(format!(
            "serial tx and rx share {}",
            board.serial.tx.id()
        )));
    }
    for (field, af) in [("tx", board.serial.tx.af), ("rx", board.serial.rx.af)] {
        if af > 15 {
            issues.push(ValidationIssue::error(format!(
                "serial.{field}.af {af} is out of range 0..=15"
            )));
        }
    }

    let mut pins: Vec<(&str, PinId)> = vec![
        ("led", board.led_pin()),
        ("serial.tx", board.serial.tx.id()),
        ("serial.rx", board.serial.rx.id()),
    ];
    if let Some(button) = &board.button {
        pins.push(("button", PinId::new(button.port, button.pin)));
    }
    for reserved in &board.reserved_pins {
        pins.push(("reserved-pins", reserved.id()));
    }
    for spec in &board.pins {
        pins.push(("pins", spec.id()));
    }
    for (field, pin) in &pins {
        if pin.pin >= PINS_PER_PORT || !pin.port.is_ascii_uppercase() {
            issues.push(ValidationIssue::error(format!(
                "{field}: {pin} is not a valid pin"
            )));
        }
    }

    let reserved: BTreeSet<PinId> = DEBUG_PINS
        .iter()
        .map(|(pin, _)| *pin)
        .chain(board.reserved_pins.iter().map(|r| r.id()))
        .collect();
    if reserved.contains(&board.led_pin()) {
        issues.push(ValidationIssue::error(format!(
            "led {} is on a reserved pin",
            board.led_pin()
        )));
    }
    for reserved_pin in &board.reserved_pins {
        if DEBUG_PINS.iter().any(|(pin, _)| *pin == reserved_pin.id()) {
            issues.push(ValidationIssue::warning(format!(
                "reserved-pins: {} is always reserved for debugging",
                reserved_pin.id()
            )));
        }
    }

    if let Some(ports) = &board.gpio_ports {
        check_ports(ports, "gpio-ports", &mut issues);
    }

    if board.probe.interface_cfg.trim().is_empty() {
        issues.push(ValidationIssue::error("probe.interface-cfg is empty"));
    }
    if board.probe.speed_khz == Some(0) {
        issues.push(ValidationIssue::error("probe.speed-khz is zero"));
    }
    if let Some(flash) = board.memory.flash {
        if flash.length == 0 {
            issues.push(ValidationIssue::error("memory.flash has zero length"));
        }
    }
    if let Some(ram) = board.memory.ram {
        if ram.length == 0 {
            issues.push(ValidationIssue::error("memory.ram has zero length"));
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

fn check_ports(ports: &[char], field: &str, issues: &mut Vec<ValidationIssue>) {
    if ports.is_empty() {
        issues.push(ValidationIssue::error(format!("{field} is empty")));
    }
    let mut seen = BTreeSet::new();
    for port in ports {
        if !port.is_ascii_uppercase() {
            issues.push(ValidationIssue::error(format!(
                "{field}: '{port}' is not an upper-case port letter"
            )));
        }
        if !seen.insert(*port) {
            issues.push(ValidationIssue::error(format!(
                "{field}: port {port} listed twice"
            )));
        }
    }
}

/// Discover `packs/<id>/pack.toml` files under a catalog root.
///
/// Returns `(id, path)` pairs sorted by id.
pub fn discover_packs(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    let packs_dir = root.join("packs");
    let mut packs = Vec::new();
    for entry in read_dir_sorted(&packs_dir)? {
        let manifest = entry.join("pack.toml");
        if !manifest.is_file() {
            continue;
        }
        if let Some(id) = entry.file_name().and_then(|n| n.to_str()) {
            packs.push((id.to_string(), manifest));
        }
    }
    Ok(packs)
}

/// Discover `boards/<id>.toml` files under a catalog root.
pub fn discover_boards(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    let boards_dir = root.join("boards");
    let mut boards = Vec::new();
    for path in read_dir_sorted(&boards_dir)? {
        if path.extension().and_then(|e| e.to_str()) != Some("toml") {
            continue;
        }
        if let Some(id) = path.file_stem().and_then(|n| n.to_str()) {
            boards.push((id.to_string(), path));
        }
    }
    Ok(boards)
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let io_err = |source| ProfileError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        paths.push(entry.map_err(io_err)?.path());
    }
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
pub(crate) mod fixtures {
    pub const PACK_TOML: &str = r#"
schema-version = 1
id = "stm32l5"
name = "STM32L5 family"
core = "cortex-m33"
system-clock-hz = 4000000
gpio-ports = ["A", "B", "C", "D", "E", "F", "G", "H"]

[memory.flash]
origin = 0x08000000
length = 0x80000

[memory.ram]
origin = 0x20000000
length = 0x40000

[peripherals]
GPIOA = 0x42020000
GPIOB = 0x42020400
GPIOC = 0x42020800
GPIOD = 0x42020C00
GPIOE = 0x42021000
GPIOF = 0x42021400
GPIOG = 0x42021800
GPIOH = 0x42021C00
RCC = 0x40021000

[templates]
hal-header = "hal.h.tmpl"
hal-source = "hal.c.tmpl"
pins-header = "app_pins.h.tmpl"
pins-source = "app_pins.c.tmpl"
main = "main.c.tmpl"
linker = "linker.ld.tmpl"
openocd = "target.cfg.tmpl"
cmake = "CMakeLists.txt.tmpl"
cmake-toolchain = "toolchain.cmake.tmpl"
makefile = "Makefile.tmpl"

[startup]
template = "startup.s.tmpl"
irq-count = 109

[probe]
target-cfg = "target/stm32l5x.cfg"
"#;

    pub const BOARD_TOML: &str = r#"
schema-version = 1
id = "nucleo_l552ze_q"
name = "NUCLEO-L552ZE-Q"
pack = "stm32l5"
mcu = "STM32L552ZETxQ"

[led]
alias = "LD2"
port = "B"
pin = 7

[button]
alias = "B1"
port = "C"
pin = 13

[serial]
usart = "LPUART1"
tx = { port = "G", pin = 7, af = 8 }
rx = { port = "G", pin = 8, af = 8 }

[[reserved-pins]]
port = "C"
pin = 14
reason = "LSE oscillator"

[probe]
interface-cfg = "interface/stlink.cfg"
transport = "hla-swd"
"#;
}
