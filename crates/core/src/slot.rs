//! Container slots and per-slot amounts.

use serde::{Deserialize, Serialize};

/// One of the two storage areas of a container.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Cargo,
    Hangar,
}

impl core::fmt::Display for Slot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Slot::Cargo => f.write_str("cargo"),
            Slot::Hangar => f.write_str("hangar"),
        }
    }
}

/// A pair of volumes, one per slot (used for both capacity and usage).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAmounts {
    pub cargo: i64,
    pub hangar: i64,
}

impl SlotAmounts {
    pub fn new(cargo: i64, hangar: i64) -> Self {
        Self { cargo, hangar }
    }

    pub fn get(&self, slot: Slot) -> i64 {
        match slot {
            Slot::Cargo => self.cargo,
            Slot::Hangar => self.hangar,
        }
    }

    pub fn get_mut(&mut self, slot: Slot) -> &mut i64 {
        match slot {
            Slot::Cargo => &mut self.cargo,
            Slot::Hangar => &mut self.hangar,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.cargo == 0 && self.hangar == 0
    }
}
