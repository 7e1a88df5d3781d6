//! `spacedock-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod slot;
pub mod version;

pub use entity::{Entity, Owned};
pub use error::{InventoryError, InventoryResult};
pub use id::{AccountId, BlueprintId, ContainerId, FacilityId, JobId, ShipId, SliceId};
pub use slot::{Slot, SlotAmounts};
pub use version::{ExpectedVersion, Versioned};
