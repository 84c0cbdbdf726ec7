//! Memory map model.

use serde::{Deserialize, Serialize};

/// A contiguous region of the target's address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct MemoryRegion {
    /// Base address.
    pub origin: u64,
    /// Size in bytes.
    pub length: u64,
}

impl MemoryRegion {
    pub const fn new(origin: u64, length: u64) -> Self {
        Self { origin, length }
    }

    /// One past the last address of the region.
    pub fn end(&self) -> u64 {
        self.origin.saturating_add(self.length)
    }

    /// Whether two regions share at least one address.
    pub fn overlaps(&self, other: &MemoryRegion) -> bool {
        self.origin < other.end() && other.origin < self.end()
    }
}

/// The flash and RAM layout used to derive the linker script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct MemoryMap {
    pub flash: MemoryRegion,
    pub ram: MemoryRegion,
}

/// Board-level replacements for individual pack memory regions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct MemoryOverrides {
    #[serde(default)]
    pub flash: Option<MemoryRegion>,
    #[serde(default)]
    pub ram: Option<MemoryRegion>,
}

impl MemoryMap {
    /// Apply board overrides region by region.
    pub fn apply(&self, overrides: &MemoryOverrides) -> MemoryMap {
        MemoryMap {
            flash: overrides.flash.unwrap_or(self.flash),
            ram: overrides.ram.unwrap_or(self.ram),
        }
    }

    /// Initial stack pointer: the top of RAM.
    pub fn stack_top(&self) -> u64 {
        self.ram.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_detection() {
        let a = MemoryRegion::new(0x0800_0000, 0x1000);
        let b = MemoryRegion::new(0x0800_0800, 0x1000);
        let c = MemoryRegion::new(0x2000_0000, 0x1000);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        // Adjacent regions do not overlap
        let d = MemoryRegion::new(0x0800_1000, 0x10);
        assert!(!a.overlaps(&d));
    }

    #[test]
    fn overrides_replace_only_named_regions() {
        let map = MemoryMap {
            flash: MemoryRegion::new(0x0800_0000, 0x80000),
            ram: MemoryRegion::new(0x2000_0000, 0x40000),
        };
        let overrides = MemoryOverrides {
            flash: None,
            ram: Some(MemoryRegion::new(0x2000_0000, 0x30000)),
        };
        let merged = map.apply(&overrides);
        assert_eq!(merged.flash, map.flash);
        assert_eq!(merged.ram.length, 0x30000);
        assert_eq!(merged.stack_top(), 0x2003_0000);
    }
}
