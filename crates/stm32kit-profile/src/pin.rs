//! Physical pins, named pin maps, and pin-map resolution.
//!
//! A pin map is always rebuilt from scratch out of the board's aliases and
//! the caller's [`PinRequest`]; nothing is mutated incrementally, so a map
//! can never carry stale entries over from a previously selected board.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PinConflict;

/// Number of pins on every GPIO port.
pub const PINS_PER_PORT: u8 = 16;

/// Serial-wire debug data pin.
pub const SWDIO: PinId = PinId::new('A', 13);

/// Serial-wire debug clock pin.
pub const SWCLK: PinId = PinId::new('A', 14);

/// The debug-link pair reserved on every board.
pub const DEBUG_PINS: [(PinId, &str); 2] = [(SWDIO, "SWDIO"), (SWCLK, "SWCLK")];

/// A physical GPIO pin, identified by port letter and number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PinId {
    pub port: char,
    pub pin: u8,
}

impl PinId {
    pub const fn new(port: char, pin: u8) -> Self {
        Self { port, pin }
    }

    /// The synthesized name used by "populate all", e.g. `PB7`.
    pub fn auto_name(&self) -> String {
        format!("P{}{}", self.port, self.pin)
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}{}", self.port, self.pin)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PinMode {
    #[default]
    Input,
    Output,
    Alternate,
    Analog,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pull {
    #[default]
    None,
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Level {
    #[default]
    Low,
    High,
}

/// Where a named pin came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PinRole {
    Led,
    Button,
    SerialTx,
    SerialRx,
    /// Extra alias declared by the board.
    Board,
    /// Requested by the user.
    User,
    /// Synthesized by "populate all".
    Auto,
}

/// A pin declaration as written in a board file or a user request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PinSpec {
    pub name: String,
    pub port: char,
    pub pin: u8,
    #[serde(default)]
    pub mode: PinMode,
    #[serde(default)]
    pub pull: Pull,
    #[serde(default)]
    pub initial: Level,
    #[serde(default = "default_true")]
    pub active_high: bool,
    #[serde(default)]
    pub af: Option<u8>,
}

fn default_true() -> bool {
    true
}

impl PinSpec {
    /// An input pin with default attributes.
    pub fn new(name: impl Into<String>, port: char, pin: u8) -> Self {
        Self {
            name: name.into(),
            port,
            pin,
            mode: PinMode::Input,
            pull: Pull::None,
            initial: Level::Low,
            active_high: true,
            af: None,
        }
    }

    pub fn with_mode(mut self, mode: PinMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn id(&self) -> PinId {
        PinId::new(self.port, self.pin)
    }
}

/// One entry of a resolved pin map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct NamedPin {
    pub name: String,
    pub pin: PinId,
    pub role: PinRole,
    pub mode: PinMode,
    pub pull: Pull,
    pub initial: Level,
    pub active_high: bool,
    #[serde(default)]
    pub af: Option<u8>,
}

impl NamedPin {
    pub fn from_spec(spec: &PinSpec, role: PinRole) -> Self {
        Self {
            name: spec.name.clone(),
            pin: spec.id(),
            role,
            mode: spec.mode,
            pull: spec.pull,
            initial: spec.initial,
            active_high: spec.active_high,
            af: spec.af,
        }
    }

    /// An auto-named, unconfigured input.
    pub fn auto(pin: PinId) -> Self {
        Self {
            name: pin.auto_name(),
            pin,
            role: PinRole::Auto,
            mode: PinMode::Input,
            pull: Pull::None,
            initial: Level::Low,
            active_high: true,
            af: None,
        }
    }

    /// Apply a user request to an existing board alias.
    ///
    /// The LED stays an output and serial pins keep their alternate function;
    /// every other alias takes the requested attributes wholesale.
    fn renamed(&self, spec: &PinSpec) -> Self {
        match self.role {
            PinRole::Led => Self {
                name: spec.name.clone(),
                active_high: spec.active_high,
                initial: spec.initial,
                ..self.clone()
            },
            PinRole::SerialTx | PinRole::SerialRx => Self {
                name: spec.name.clone(),
                ..self.clone()
            },
            _ => Self::from_spec(spec, self.role),
        }
    }

    /// The C identifier emitted for this pin, e.g. `APP_PIN_LD2`.
    pub fn symbol(&self) -> String {
        format!("APP_PIN_{}", self.name.to_ascii_uppercase())
    }
}

/// A name-unique, pin-unique map of named pins, ordered by physical pin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<NamedPin>", try_from = "Vec<NamedPin>")]
pub struct PinMap {
    by_pin: BTreeMap<PinId, NamedPin>,
}

impl PinMap {
    /// Build a map, rejecting duplicate pins, duplicate names (case-insensitive,
    /// since names are emitted upper-cased), and names that are not C identifiers.
    pub fn from_entries(
        entries: impl IntoIterator<Item = NamedPin>,
    ) -> Result<Self, PinConflict> {
        let mut by_pin: BTreeMap<PinId, NamedPin> = BTreeMap::new();
        let mut names: BTreeMap<String, PinId> = BTreeMap::new();
        for entry in entries {
            if !is_identifier(&entry.name) {
                return Err(PinConflict::InvalidName { name: entry.name });
            }
            if let Some(existing) = by_pin.get(&entry.pin) {
                return Err(PinConflict::DuplicatePin {
                    pin: entry.pin,
                    first: existing.name.clone(),
                    second: entry.name,
                });
            }
            let key = entry.name.to_ascii_uppercase();
            if let Some(first) = names.get(&key) {
                let (first, second) = if *first < entry.pin {
                    (*first, entry.pin)
                } else {
                    (entry.pin, *first)
                };
                return Err(PinConflict::DuplicateName {
                    name: entry.name,
                    first,
                    second,
                });
            }
            names.insert(key, entry.pin);
            by_pin.insert(entry.pin, entry);
        }
        Ok(Self { by_pin })
    }

    pub fn len(&self) -> usize {
        self.by_pin.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_pin.is_empty()
    }

    /// Entries in physical pin order.
    pub fn iter(&self) -> impl Iterator<Item = &NamedPin> {
        self.by_pin.values()
    }

    pub fn get(&self, pin: PinId) -> Option<&NamedPin> {
        self.by_pin.get(&pin)
    }

    pub fn contains_pin(&self, pin: PinId) -> bool {
        self.by_pin.contains_key(&pin)
    }

    /// Case-insensitive lookup by name.
    pub fn by_name(&self, name: &str) -> Option<&NamedPin> {
        self.by_pin
            .values()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn led(&self) -> Option<&NamedPin> {
        self.by_role(PinRole::Led)
    }

    pub fn by_role(&self, role: PinRole) -> Option<&NamedPin> {
        self.by_pin.values().find(|p| p.role == role)
    }
}

impl From<PinMap> for Vec<NamedPin> {
    fn from(map: PinMap) -> Self {
        map.by_pin.into_values().collect()
    }
}

impl TryFrom<Vec<NamedPin>> for PinMap {
    type Error = PinConflict;

    fn try_from(entries: Vec<NamedPin>) -> Result<Self, Self::Error> {
        PinMap::from_entries(entries)
    }
}

/// The caller's pin-map request, applied on top of the board's aliases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PinRequest {
    /// Replacement name for the board LED alias.
    #[serde(default)]
    pub led_alias: Option<String>,
    /// Additional pins, or renames of board aliases when the pin matches.
    #[serde(default)]
    pub pins: Vec<PinSpec>,
    /// Auto-name every remaining unreserved pin.
    #[serde(default)]
    pub populate_all: bool,
}

impl PinRequest {
    pub fn populate_all() -> Self {
        Self {
            populate_all: true,
            ..Self::default()
        }
    }

    pub fn with_pin(mut self, spec: PinSpec) -> Self {
        self.pins.push(spec);
        self
    }

    pub fn with_led_alias(mut self, alias: impl Into<String>) -> Self {
        self.led_alias = Some(alias.into());
        self
    }
}

/// The board-side inputs of pin resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinLayout {
    /// GPIO ports present on the part.
    pub ports: Vec<char>,
    /// Reserved pins and the reason each is reserved.
    pub reserved: BTreeMap<PinId, String>,
    /// Board aliases (LED, button, serial, extra pins).
    pub aliases: Vec<NamedPin>,
}

impl PinLayout {
    /// Every physical pin, port by port.
    pub fn physical_pins(&self) -> impl Iterator<Item = PinId> + '_ {
        self.ports
            .iter()
            .flat_map(|&port| (0..PINS_PER_PORT).map(move |pin| PinId::new(port, pin)))
    }

    pub fn exists(&self, pin: PinId) -> bool {
        pin.pin < PINS_PER_PORT && self.ports.contains(&pin.port)
    }

    fn check_assignable(&self, pin: PinId, name: &str) -> Result<(), PinConflict> {
        if !self.exists(pin) {
            return Err(PinConflict::NoSuchPin { pin });
        }
        if let Some(reason) = self.reserved.get(&pin) {
            return Err(PinConflict::Reserved {
                pin,
                name: name.to_string(),
                reason: reason.clone(),
            });
        }
        if !is_identifier(name) {
            return Err(PinConflict::InvalidName {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

/// Resolve a pin map from the board layout and a request.
///
/// Board aliases are staged first, then requests (which rename an alias when
/// they target its pin), then auto-named pins when `populate_all` is set.
/// Any conflict aborts the whole resolution.
pub fn resolve_pins(layout: &PinLayout, request: &PinRequest) -> Result<PinMap, PinConflict> {
    let mut staged: BTreeMap<PinId, NamedPin> = BTreeMap::new();

    for alias in &layout.aliases {
        let mut entry = alias.clone();
        if entry.role == PinRole::Led {
            if let Some(name) = &request.led_alias {
                entry.name = name.clone();
            }
        }
        layout.check_assignable(entry.pin, &entry.name)?;
        if let Some(existing) = staged.get(&entry.pin) {
            return Err(PinConflict::DuplicatePin {
                pin: entry.pin,
                first: existing.name.clone(),
                second: entry.name,
            });
        }
        staged.insert(entry.pin, entry);
    }

    let mut requested: BTreeMap<PinId, String> = BTreeMap::new();
    for spec in &request.pins {
        let id = spec.id();
        layout.check_assignable(id, &spec.name)?;
        if let Some(first) = requested.insert(id, spec.name.clone()) {
            return Err(PinConflict::DuplicatePin {
                pin: id,
                first,
                second: spec.name.clone(),
            });
        }
        let entry = match staged.get(&id) {
            Some(existing) => existing.renamed(spec),
            None => NamedPin::from_spec(spec, PinRole::User),
        };
        staged.insert(id, entry);
    }

    if request.populate_all {
        for pin in layout.physical_pins() {
            if layout.reserved.contains_key(&pin) || staged.contains_key(&pin) {
                continue;
            }
            staged.insert(pin, NamedPin::auto(pin));
        }
    }

    PinMap::from_entries(staged.into_values())
}

/// Whether `name` is a C identifier.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> PinLayout {
        let mut reserved: BTreeMap<PinId, String> = DEBUG_PINS
            .iter()
            .map(|(pin, reason)| (*pin, reason.to_string()))
            .collect();
        reserved.insert(PinId::new('C', 14), "LSE oscillator".into());
        PinLayout {
            ports: vec!['A', 'B', 'C'],
            reserved,
            aliases: vec![
                NamedPin::from_spec(
                    &PinSpec::new("LD2", 'A', 5).with_mode(PinMode::Output),
                    PinRole::Led,
                ),
                NamedPin::from_spec(&PinSpec::new("B1", 'C', 13), PinRole::Button),
            ],
        }
    }

    #[test]
    fn default_request_keeps_board_aliases_only() {
        let map = resolve_pins(&layout(), &PinRequest::default()).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.led().unwrap().name, "LD2");
        assert_eq!(map.by_name("b1").unwrap().pin, PinId::new('C', 13));
    }

    #[test]
    fn populate_all_names_every_unreserved_pin_once() {
        let layout = layout();
        let map = resolve_pins(&layout, &PinRequest::populate_all()).unwrap();
        // 3 ports x 16 pins, minus 3 reserved
        assert_eq!(map.len(), 48 - 3);
        for pin in layout.physical_pins() {
            if layout.reserved.contains_key(&pin) {
                assert!(!map.contains_pin(pin), "{pin} is reserved");
            } else {
                assert!(map.contains_pin(pin), "{pin} should be named");
            }
        }
        assert_eq!(map.get(PinId::new('B', 7)).unwrap().name, "PB7");
        assert_eq!(map.get(PinId::new('A', 5)).unwrap().name, "LD2");
    }

    #[test]
    fn led_alias_can_be_renamed() {
        let request = PinRequest::default().with_led_alias("STATUS");
        let map = resolve_pins(&layout(), &request).unwrap();
        let led = map.led().unwrap();
        assert_eq!(led.name, "STATUS");
        assert_eq!(led.mode, PinMode::Output);
    }

    #[test]
    fn request_on_alias_pin_renames_it() {
        let request = PinRequest::default().with_pin(PinSpec::new("USER_BTN", 'C', 13));
        let map = resolve_pins(&layout(), &request).unwrap();
        let button = map.get(PinId::new('C', 13)).unwrap();
        assert_eq!(button.name, "USER_BTN");
        assert_eq!(button.role, PinRole::Button);
        assert!(map.by_name("B1").is_none());
    }

    #[test]
    fn renaming_to_existing_name_conflicts() {
        let request = PinRequest::default().with_pin(PinSpec::new("LD2", 'B', 0));
        let err = resolve_pins(&layout(), &request).unwrap_err();
        assert_eq!(
            err,
            PinConflict::DuplicateName {
                name: "LD2".into(),
                first: PinId::new('A', 5),
                second: PinId::new('B', 0),
            }
        );
    }

    #[test]
    fn names_collide_case_insensitively() {
        let request = PinRequest::default().with_pin(PinSpec::new("ld2", 'B', 0));
        assert!(matches!(
            resolve_pins(&layout(), &request),
            Err(PinConflict::DuplicateName { .. })
        ));
    }

    #[test]
    fn user_name_colliding_with_auto_name_conflicts() {
        let request = PinRequest::populate_all().with_pin(PinSpec::new("PB1", 'B', 0));
        assert!(matches!(
            resolve_pins(&layout(), &request),
            Err(PinConflict::DuplicateName { .. })
        ));
    }

    #[test]
    fn reserved_pins_cannot_be_named() {
        let request = PinRequest::default().with_pin(PinSpec::new("SWD", 'A', 13));
        assert!(matches!(
            resolve_pins(&layout(), &request),
            Err(PinConflict::Reserved { .. })
        ));
    }

    #[test]
    fn same_pin_requested_twice_conflicts() {
        let request = PinRequest::default()
            .with_pin(PinSpec::new("ONE", 'B', 3))
            .with_pin(PinSpec::new("TWO", 'B', 3));
        assert!(matches!(
            resolve_pins(&layout(), &request),
            Err(PinConflict::DuplicatePin { .. })
        ));
    }

    #[test]
    fn unknown_port_rejected() {
        let request = PinRequest::default().with_pin(PinSpec::new("X", 'H', 0));
        assert!(matches!(
            resolve_pins(&layout(), &request),
            Err(PinConflict::NoSuchPin { .. })
        ));
        let request = PinRequest::default().with_pin(PinSpec::new("Y", 'A', 16));
        assert!(matches!(
            resolve_pins(&layout(), &request),
            Err(PinConflict::NoSuchPin { .. })
        ));
    }

    #[test]
    fn invalid_names_rejected() {
        let request = PinRequest::default().with_pin(PinSpec::new("2FAST", 'B', 3));
        assert!(matches!(
            resolve_pins(&layout(), &request),
            Err(PinConflict::InvalidName { .. })
        ));
    }

    #[test]
    fn resolution_is_rebuilt_from_scratch() {
        let layout = layout();
        let first = resolve_pins(&layout, &PinRequest::populate_all()).unwrap();
        let second = resolve_pins(&layout, &PinRequest::default()).unwrap();
        assert!(first.len() > second.len());
        assert_eq!(second, resolve_pins(&layout, &PinRequest::default()).unwrap());
    }

    #[test]
    fn try_from_rejects_duplicate_names() {
        let entries = vec![
            NamedPin::from_spec(&PinSpec::new("A", 'A', 1), PinRole::User),
            NamedPin::from_spec(&PinSpec::new("a", 'A', 2), PinRole::User),
        ];
        assert!(PinMap::try_from(entries).is_err());
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("LD2"));
        assert!(is_identifier("_x"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("1A"));
        assert!(!is_identifier("LED-1"));
    }

    #[test]
    fn display_and_symbol() {
        let pin = PinId::new('B', 12);
        assert_eq!(pin.to_string(), "PB12");
        let named = NamedPin::from_spec(&PinSpec::new("ld2", 'B', 12), PinRole::User);
        assert_eq!(named.symbol(), "APP_PIN_LD2");
    }
}
