//! Token values derived from a merged profile.

use std::fmt::Write;
use std::path::Path;

use stm32kit_profile::pin::{Level, PinMode, PinRole, Pull};
use stm32kit_profile::{MergedProfile, NamedPin, ProbeConfig};

use crate::output::RenderOptions;
use crate::template::Context;
use crate::vectors;

/// Directory (relative to the project) the backends build into.
pub const BUILD_DIR: &str = "build";

/// Output file stem of the linked image.
pub const ELF_STEM: &str = "firmware";

/// Project-relative path of the generated OpenOCD script.
pub const OPENOCD_CFG: &str = "openocd/target.cfg";

const OPENOCD_DIR: &str = "openocd";

/// Non-entry-point sources compiled into every project.
const LIBRARY_SOURCES: [&str; 3] = ["app_pins.c", "hal.c", "startup.s"];

/// Build the token context for one render.
pub fn build_context(profile: &MergedProfile, options: &RenderOptions) -> Context {
    let mut ctx = Context::new();
    let pack = &profile.pack;
    let board = &profile.board;
    let model = profile.exception_model();

    ctx.set(
        "generated_header",
        format!(
            "/* Generated by stm32kit for {} ({}). */",
            board.display_name(),
            pack.id
        ),
    );
    ctx.set(
        "generated_notice",
        format!("Generated by stm32kit for {} ({}).", board.display_name(), pack.id),
    );
    ctx.set("project_name", options.project_name.as_str());
    ctx.set("backend", options.backend.as_str());
    ctx.set("entry_point", options.entry_point.as_str());
    ctx.set("sources", sources(options).join(" "));
    ctx.set("build_dir", BUILD_DIR);
    ctx.set("elf_stem", ELF_STEM);
    ctx.set("elf_name", format!("{ELF_STEM}.elf"));

    ctx.set("board_id", board.id.as_str());
    ctx.set("board_name", board.display_name());
    ctx.set("mcu", board.mcu.as_str());
    ctx.set("pack_id", pack.id.as_str());
    ctx.set("pack_name", pack.display_name());

    ctx.set("core", pack.core.to_string());
    ctx.set("gcc_cpu", pack.core.gcc_cpu());
    ctx.set("float_flags", pack.core.float_flags());
    ctx.set("exception_model", model.as_str());
    ctx.set("has_stack_limit", flag(model.has_stack_limit()));
    ctx.set("system_clock_hz", pack.system_clock_hz.to_string());

    ctx.set("flash_origin", format!("0x{:08X}", profile.memory.flash.origin));
    ctx.set("flash_length", format!("0x{:X}", profile.memory.flash.length));
    ctx.set("ram_origin", format!("0x{:08X}", profile.memory.ram.origin));
    ctx.set("ram_length", format!("0x{:X}", profile.memory.ram.length));
    ctx.set("stack_top", format!("0x{:08X}", profile.memory.stack_top()));

    let irq_count = pack.startup.irq_count;
    ctx.set("irq_count", irq_count.to_string());
    ctx.set("vector_table", vectors::vector_table(model, irq_count));
    ctx.set("weak_handlers", vectors::weak_handlers(model, irq_count));

    ctx.set("peripheral_defines", peripheral_defines(profile));

    let pins: Vec<&NamedPin> = profile.pins().iter().collect();
    ctx.set("pin_count", pins.len().to_string());
    ctx.set("pin_enum", pin_enum(&pins));
    ctx.set("pin_table", pin_table(&pins));
    ctx.set("pin_roles", pin_roles(&pins));
    let led = profile
        .pins()
        .led()
        .map(NamedPin::symbol)
        .unwrap_or_default();
    ctx.set("led_symbol", led);

    ctx.set("serial_usart", board.serial.usart.to_ascii_uppercase());
    ctx.set("serial_baud", board.serial.baud.to_string());

    let probe = &profile.probe;
    ctx.set("openocd_cfg", OPENOCD_CFG);
    ctx.set("openocd_interface", probe.interface_cfg.as_str());
    let target = match bundled_target_path(probe) {
        Some(path) => format!("source [find {path}]"),
        None => script_source(&probe.target_cfg),
    };
    ctx.set("openocd_target", target);
    ctx.set("openocd_transport", probe.transport.as_openocd());
    ctx.set("openocd_speed_khz", probe.speed_khz.to_string());
    ctx.set("openocd_reset_config", reset_config(&probe.reset_config));

    ctx
}

/// Source files of the project, entry point first.
pub fn sources(options: &RenderOptions) -> Vec<String> {
    std::iter::once(options.entry_point.clone())
        .chain(LIBRARY_SOURCES.iter().map(|s| s.to_string()))
        .collect()
}

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

fn peripheral_defines(profile: &MergedProfile) -> String {
    let mut out = String::new();
    for (name, base) in &profile.peripherals {
        let _ = writeln!(out, "#define {}_BASE 0x{base:08X}UL", name.to_ascii_uppercase());
    }
    out
}

fn mode_constant(mode: PinMode) -> &'static str {
    match mode {
        PinMode::Input => "HAL_MODE_INPUT",
        PinMode::Output => "HAL_MODE_OUTPUT",
        PinMode::Alternate => "HAL_MODE_ALTERNATE",
        PinMode::Analog => "HAL_MODE_ANALOG",
    }
}

fn pull_constant(pull: Pull) -> &'static str {
    match pull {
        Pull::None => "HAL_PULL_NONE",
        Pull::Up => "HAL_PULL_UP",
        Pull::Down => "HAL_PULL_DOWN",
    }
}

fn pin_enum(pins: &[&NamedPin]) -> String {
    let mut out = String::new();
    for (index, pin) in pins.iter().enumerate() {
        let _ = writeln!(
            out,
            "    {} = {index}, /* {} */",
            pin.symbol(),
            pin.pin
        );
    }
    out
}

fn pin_table(pins: &[&NamedPin]) -> String {
    let mut out = String::new();
    for pin in pins {
        let port = pin.pin.port;
        let port_index = u32::from(port) - u32::from('A');
        let _ = writeln!(
            out,
            "    [{}] = {{ GPIO{port}_BASE, {port_index}u, {}u, {}, {}, {}u, {}u, {}u }},",
            pin.symbol(),
            pin.pin.pin,
            mode_constant(pin.mode),
            pull_constant(pin.pull),
            pin.af.unwrap_or(0),
            flag(pin.active_high),
            flag(pin.initial == Level::High),
        );
    }
    out
}

fn pin_roles(pins: &[&NamedPin]) -> String {
    let mut out = String::new();
    for pin in pins {
        let alias = match pin.role {
            PinRole::Led => "APP_LED",
            PinRole::Button => "APP_BUTTON",
            PinRole::SerialTx => "APP_SERIAL_TX",
            PinRole::SerialRx => "APP_SERIAL_RX",
            _ => continue,
        };
        let _ = writeln!(out, "#define {alias} {}", pin.symbol());
    }
    out
}

/// Project-relative path the pack's own target script is copied to, if any.
/// OpenOCD runs from the project root, so `find` resolves it there.
pub fn bundled_target_path(probe: &ProbeConfig) -> Option<String> {
    probe.bundled_target.as_ref()?;
    let relative: Vec<_> = probe
        .target_cfg
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    Some(format!("{OPENOCD_DIR}/{}", relative.join("/")))
}

fn script_source(path: &Path) -> String {
    if path.is_absolute() {
        format!("source \"{}\"", path.display())
    } else {
        format!("source [find {}]", path.display())
    }
}

fn reset_config(lines: &[String]) -> String {
    let mut out = String::new();
    for line in lines {
        let _ = writeln!(out, "{line}");
    }
    out
}
