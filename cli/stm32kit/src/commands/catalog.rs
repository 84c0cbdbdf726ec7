//! `stm32kit boards`, `packs` and `describe`: catalog listing.

use anyhow::Result;
use stm32kit_profile::{MergedProfile, NamedPin, PinRequest};

use crate::config::Settings;

/// List every board in the catalog.
pub fn boards(settings: &Settings) -> Result<()> {
    let catalog = settings.catalog()?;
    println!("Boards in {}:", catalog.root().display());
    println!();
    for id in catalog.boards()? {
        match catalog.board(&id) {
            Ok(board) => println!(
                "  {id:<22} {} ({}, pack {})",
                board.display_name(),
                board.mcu,
                board.pack
            ),
            Err(e) => println!("  {id:<22} invalid: {e}"),
        }
    }
    println!();
    println!("Use 'stm32kit describe <board>' for details.");
    Ok(())
}

/// List every pack in the catalog.
pub fn packs(settings: &Settings) -> Result<()> {
    let catalog = settings.catalog()?;
    println!("Packs in {}:", catalog.root().display());
    println!();
    for id in catalog.packs()? {
        match catalog.pack(&id) {
            Ok(pack) => println!(
                "  {id:<22} {} ({}, ports {})",
                pack.display_name(),
                pack.core,
                pack.gpio_ports.iter().collect::<String>()
            ),
            Err(e) => println!("  {id:<22} invalid: {e}"),
        }
    }
    Ok(())
}

/// Print the resolved profile of a board.
pub fn describe(settings: &Settings, board: &str, request: &PinRequest) -> Result<()> {
    let profile = settings.catalog()?.resolve(board, request)?;
    print_profile(&profile);
    Ok(())
}

fn print_profile(profile: &MergedProfile) {
    let board = &profile.board;
    let pack = &profile.pack;
    println!("=== Board: {} ===", board.display_name());
    println!("Id:   {}", board.id);
    println!("MCU:  {}", board.mcu);
    println!("Pack: {} ({})", pack.display_name(), pack.id);
    println!();

    println!("--- Core ---");
    println!("  Core:            {}", profile.core());
    println!("  Exception model: {}", profile.exception_model().as_str());
    println!("  External IRQs:   {}", pack.startup.irq_count);
    println!("  System clock:    {} Hz", pack.system_clock_hz);
    println!();

    println!("--- Memory ---");
    for (name, region) in [("FLASH", &profile.memory.flash), ("RAM", &profile.memory.ram)] {
        println!(
            "  {name:<5} 0x{:08X} - 0x{:08X} ({} KiB)",
            region.origin,
            region.end(),
            region.length / 1024
        );
    }
    println!();

    println!("--- Probe ---");
    let probe = &profile.probe;
    println!("  Interface: {}", probe.interface_cfg);
    match &probe.bundled_target {
        Some(_) => println!("  Target:    {} (shipped with the pack)", probe.target_cfg.display()),
        None => println!("  Target:    {}", probe.target_cfg.display()),
    }
    println!("  Transport: {}", probe.transport.as_openocd());
    println!("  Speed:     {} kHz", probe.speed_khz);
    for line in &probe.reset_config {
        println!("  Reset:     {line}");
    }
    println!();

    println!("--- Pins ---");
    for pin in profile.pins().iter() {
        print_pin(pin);
    }
    println!("  Reserved:");
    for (pin, reason) in profile.reserved() {
        println!("    {:<6} {reason}", pin.to_string());
    }
    println!("  Unassigned: {}", profile.unassigned_pins().len());
}

fn print_pin(pin: &NamedPin) {
    let af = pin.af.map(|af| format!(" AF{af}")).unwrap_or_default();
    println!(
        "    {:<6} {:<16} {:?}/{:?}{af}",
        pin.pin.to_string(),
        pin.name,
        pin.role,
        pin.mode
    );
}
