//! Pack + board merging.

use std::collections::BTreeMap;
use std::path::{Component, PathBuf};

use serde::Serialize;

use crate::board::Board;
use crate::error::{ProfileError, Result};
use crate::memory::MemoryMap;
use crate::pack::{CoreVariant, ExceptionModel, Pack};
use crate::pin::{resolve_pins, PinId, PinLayout, PinMap, PinRequest, DEBUG_PINS};
use crate::probe::ProbeConfig;

/// Which of the three disjoint sets a physical pin falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PinClass {
    Reserved,
    Named,
    Unassigned,
}

/// A pack and a board resolved into one hardware profile.
///
/// Every physical pin is exactly one of reserved, named, or unassigned;
/// reserved pins never appear in the pin map and the LED alias always does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedProfile {
    pub pack: Pack,
    pub board: Board,
    pub memory: MemoryMap,
    pub peripherals: BTreeMap<String, u64>,
    pub probe: ProbeConfig,
    pins: PinMap,
    request: PinRequest,
    layout: PinLayout,
}

impl MergedProfile {
    /// Merge a board over its pack and resolve the pin map for `request`.
    pub fn merge(pack: Pack, board: Board, request: &PinRequest) -> Result<Self> {
        if board.pack != pack.id {
            return Err(ProfileError::Reference {
                kind: "pack",
                id: board.pack.clone(),
                referenced_by: Some(board.id.clone()),
            });
        }

        let origin = format!("board '{}'", board.id);

        let ports = match &board.gpio_ports {
            Some(ports) => {
                if let Some(port) = ports.iter().find(|p| !pack.gpio_ports.contains(p)) {
                    return Err(ProfileError::schema(
                        origin,
                        format!("gpio-ports: port {port} is not provided by pack '{}'", pack.id),
                    ));
                }
                ports.clone()
            }
            None => pack.gpio_ports.clone(),
        };

        let memory = pack.memory.apply(&board.memory);
        if memory.flash.overlaps(&memory.ram) {
            return Err(ProfileError::schema(origin, "memory overrides make flash and ram overlap"));
        }

        let mut peripherals = pack.peripherals.clone();
        peripherals.extend(board.peripherals.iter().map(|(k, v)| (k.clone(), *v)));

        let mut reserved: BTreeMap<PinId, String> = DEBUG_PINS
            .iter()
            .map(|(pin, reason)| (*pin, reason.to_string()))
            .collect();
        for pin in &board.reserved_pins {
            reserved.entry(pin.id()).or_insert_with(|| {
                if pin.reason.is_empty() {
                    "reserved by board".to_string()
                } else {
                    pin.reason.clone()
                }
            });
        }

        let probe = merge_probe(&pack, &board);
        let layout = PinLayout {
            ports,
            reserved,
            aliases: board.aliases(),
        };
        let pins = resolve_pins(&layout, request)?;

        log::debug!(
            "merged board '{}' over pack '{}': {} named pins, {} reserved",
            board.id,
            pack.id,
            pins.len(),
            layout.reserved.len()
        );

        Ok(Self {
            pack,
            board,
            memory,
            peripherals,
            probe,
            pins,
            request: request.clone(),
            layout,
        })
    }

    /// Re-resolve the pin map for a new request.
    ///
    /// The map is rebuilt from the board aliases; on conflict `self` is left
    /// untouched.
    pub fn repin(&self, request: &PinRequest) -> Result<Self> {
        let pins = resolve_pins(&self.layout, request)?;
        Ok(Self {
            pins,
            request: request.clone(),
            ..self.clone()
        })
    }

    pub fn pins(&self) -> &PinMap {
        &self.pins
    }

    /// The request the current pin map was resolved from.
    pub fn request(&self) -> &PinRequest {
        &self.request
    }

    pub fn reserved(&self) -> &BTreeMap<PinId, String> {
        &self.layout.reserved
    }

    pub fn ports(&self) -> &[char] {
        &self.layout.ports
    }

    pub fn core(&self) -> CoreVariant {
        self.pack.core
    }

    pub fn exception_model(&self) -> ExceptionModel {
        self.pack.core.exception_model()
    }

    pub fn classify(&self, pin: PinId) -> Option<PinClass> {
        if !self.layout.exists(pin) {
            None
        } else if self.layout.reserved.contains_key(&pin) {
            Some(PinClass::Reserved)
        } else if self.pins.contains_pin(pin) {
            Some(PinClass::Named)
        } else {
            Some(PinClass::Unassigned)
        }
    }

    /// Physical pins that are neither reserved nor named.
    pub fn unassigned_pins(&self) -> Vec<PinId> {
        self.layout
            .physical_pins()
            .filter(|pin| self.classify(*pin) == Some(PinClass::Unassigned))
            .collect()
    }
}

fn merge_probe(pack: &Pack, board: &Board) -> ProbeConfig {
    let target = board
        .probe
        .target_cfg
        .clone()
        .unwrap_or_else(|| pack.probe.target_cfg.clone());
    let target_cfg = PathBuf::from(target);
    // Scripts shipped with the pack win over OpenOCD's search path.
    let local = pack.root.join(&target_cfg);
    let bundled_target = (target_cfg
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
        && local.is_file())
    .then_some(local);
    ProbeConfig {
        interface_cfg: board.probe.interface_cfg.clone(),
        target_cfg,
        bundled_target,
        transport: board.probe.transport.unwrap_or(pack.probe.transport),
        speed_khz: board.probe.speed_khz.unwrap_or(pack.probe.speed_khz),
        reset_strategy: board.probe.reset_strategy,
        reset_config: board.probe.reset_config.clone(),
    }
}
