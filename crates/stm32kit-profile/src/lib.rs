//! Pack and board declarations for stm32kit.
//!
//! A **pack** describes an MCU family (core, memory map, templates, probe
//! target); a **board** is concrete hardware built on one pack (LED, serial
//! console, reserved pins, probe interface). Merging the two with a pin
//! request yields a [`MergedProfile`], the input of project rendering.

pub mod board;
pub mod catalog;
pub mod error;
pub mod memory;
pub mod pack;
pub mod parse;
pub mod pin;
pub mod probe;
pub mod profile;

pub use board::Board;
pub use catalog::Catalog;
pub use error::{PinConflict, ProfileError, Result};
pub use memory::{MemoryMap, MemoryRegion};
pub use pack::{CoreVariant, ExceptionModel, Pack};
pub use pin::{NamedPin, PinId, PinMap, PinRequest, PinSpec};
pub use probe::{ProbeConfig, ResetStrategy, Transport};
pub use profile::{MergedProfile, PinClass};
