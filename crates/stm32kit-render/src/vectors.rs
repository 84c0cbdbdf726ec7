//! Interrupt vector table generation.

use std::fmt::Write;

use stm32kit_profile::ExceptionModel;

/// Name of the handler for external interrupt `n`.
pub fn irq_handler(n: u16) -> String {
    format!("IRQ{n}_Handler")
}

/// The full vector table layout: slot 0 is the initial stack pointer, then
/// the 15 system slots for `model`, then `irq_count` device interrupts.
/// Reserved slots are `None`.
pub fn vector_slots(model: ExceptionModel, irq_count: u16) -> Vec<Option<String>> {
    let mut slots = Vec::with_capacity(16 + usize::from(irq_count));
    slots.push(Some("_estack".to_string()));
    slots.extend(
        model
            .system_vectors()
            .iter()
            .map(|slot| slot.map(str::to_string)),
    );
    slots.extend((0..irq_count).map(|n| Some(irq_handler(n))));
    slots
}

/// Assembly `.word` lines for the vector table.
pub fn vector_table(model: ExceptionModel, irq_count: u16) -> String {
    let mut out = String::new();
    for (index, slot) in vector_slots(model, irq_count).iter().enumerate() {
        match slot {
            Some(handler) => {
                let _ = writeln!(out, "    .word {handler}");
            }
            None => {
                let _ = writeln!(out, "    .word 0 /* {index}: reserved */");
            }
        }
    }
    out
}

/// `.weak` aliases pointing every handler except the reset handler at
/// `Default_Handler`.
pub fn weak_handlers(model: ExceptionModel, irq_count: u16) -> String {
    let mut out = String::new();
    for handler in vector_slots(model, irq_count)
        .into_iter()
        .skip(1)
        .flatten()
        .filter(|h| h != "Reset_Handler")
    {
        let _ = writeln!(out, "    .weak {handler}");
        let _ = writeln!(out, "    .thumb_set {handler}, Default_Handler");
    }
    out
}
