//! Concrete board declaration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::memory::MemoryOverrides;
use crate::pin::{Level, NamedPin, PinId, PinMode, PinRole, PinSpec, Pull};
use crate::probe::BoardProbe;

/// The board's user LED.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct LedAlias {
    pub alias: String,
    pub port: char,
    pub pin: u8,
    #[serde(default = "default_true")]
    pub active_high: bool,
}

/// The board's user button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ButtonAlias {
    pub alias: String,
    pub port: char,
    pub pin: u8,
    #[serde(default = "default_true")]
    pub active_high: bool,
    #[serde(default)]
    pub pull: Pull,
}

/// A pin routed to an alternate function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct AfPin {
    pub port: char,
    pub pin: u8,
    pub af: u8,
}

impl AfPin {
    pub fn id(&self) -> PinId {
        PinId::new(self.port, self.pin)
    }
}

/// Serial console wiring (usually the probe's virtual COM port).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SerialPins {
    /// Peripheral instance, e.g. `LPUART1`.
    pub usart: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
    pub tx: AfPin,
    pub rx: AfPin,
}

/// A pin the application must not use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ReservedPin {
    pub port: char,
    pub pin: u8,
    #[serde(default)]
    pub reason: String,
}

impl ReservedPin {
    pub fn id(&self) -> PinId {
        PinId::new(self.port, self.pin)
    }
}

fn default_true() -> bool {
    true
}

fn default_baud() -> u32 {
    115_200
}

/// A concrete board referencing a pack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Board {
    pub schema_version: u32,
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Identifier of the pack this board is built on.
    pub pack: String,
    #[serde(default)]
    pub mcu: String,
    #[serde(default)]
    pub memory: MemoryOverrides,
    pub led: LedAlias,
    #[serde(default)]
    pub button: Option<ButtonAlias>,
    pub serial: SerialPins,
    #[serde(default)]
    pub reserved_pins: Vec<ReservedPin>,
    /// Extra named pins wired on the board.
    #[serde(default)]
    pub pins: Vec<PinSpec>,
    /// Replaces the pack's GPIO port list for smaller packages.
    #[serde(default)]
    pub gpio_ports: Option<Vec<char>>,
    /// Peripheral base-address overrides merged over the pack's.
    #[serde(default)]
    pub peripherals: BTreeMap<String, u64>,
    pub probe: BoardProbe,
}

impl Board {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn led_pin(&self) -> PinId {
        PinId::new(self.led.port, self.led.pin)
    }

    /// Board aliases as pin-map entries, LED first.
    pub fn aliases(&self) -> Vec<NamedPin> {
        let mut aliases = Vec::new();
        aliases.push(NamedPin {
            name: self.led.alias.clone(),
            pin: self.led_pin(),
            role: PinRole::Led,
            mode: PinMode::Output,
            pull: Pull::None,
            initial: Level::Low,
            active_high: self.led.active_high,
            af: None,
        });
        if let Some(button) = &self.button {
            aliases.push(NamedPin {
                name: button.alias.clone(),
                pin: PinId::new(button.port, button.pin),
                role: PinRole::Button,
                mode: PinMode::Input,
                pull: button.pull,
                initial: Level::Low,
                active_high: button.active_high,
                af: None,
            });
        }
        let usart = self.serial.usart.to_ascii_uppercase();
        for (suffix, role, pin) in [
            ("TX", PinRole::SerialTx, self.serial.tx),
            ("RX", PinRole::SerialRx, self.serial.rx),
        ] {
            aliases.push(NamedPin {
                name: format!("{usart}_{suffix}"),
                pin: pin.id(),
                role,
                mode: PinMode::Alternate,
                pull: Pull::None,
                initial: Level::Low,
                active_high: true,
                af: Some(pin.af),
            });
        }
        aliases.extend(
            self.pins
                .iter()
                .map(|spec| NamedPin::from_spec(spec, PinRole::Board)),
        );
        aliases
    }
}
