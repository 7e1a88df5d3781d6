//! Capacity-bounded containers (ship hulls, structures, deployables).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use spacedock_core::{
    AccountId, BlueprintId, ContainerId, Entity, InventoryError, InventoryResult, Owned, ShipId,
    SliceId, Slot, SlotAmounts, Versioned,
};

use crate::blueprint::Blueprint;

/// Quantities per blueprint within one cargo slice.
pub type CargoSlice = BTreeMap<BlueprintId, i64>;

/// One hangar slice: packed ships are counted, unpacked ships are listed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HangarSlice {
    #[serde(default)]
    pub packed: BTreeMap<BlueprintId, i64>,
    /// Kept sorted by ship id.
    #[serde(default)]
    pub unpacked: Vec<ShipId>,
}

impl HangarSlice {
    pub fn is_empty(&self) -> bool {
        self.packed.is_empty() && self.unpacked.is_empty()
    }
}

/// Inventory root entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub id: ContainerId,
    pub account: AccountId,
    pub blueprint: BlueprintId,
    pub capacity: SlotAmounts,
    pub usage: SlotAmounts,
    #[serde(default)]
    pub cargo: BTreeMap<SliceId, CargoSlice>,
    #[serde(default)]
    pub hangar: BTreeMap<SliceId, HangarSlice>,
    #[serde(default)]
    pub tombstoned: bool,
    /// Store revision; bumped by the store on every committed write.
    #[serde(default)]
    pub version: u64,
}

impl Container {
    /// Fresh, empty container seeded from its blueprint's capacities.
    pub fn from_blueprint(id: ContainerId, account: AccountId, blueprint: &Blueprint) -> Self {
        Self {
            id,
            account,
            blueprint: blueprint.id.clone(),
            capacity: blueprint.capacity(),
            usage: SlotAmounts::default(),
            cargo: BTreeMap::new(),
            hangar: BTreeMap::new(),
            tombstoned: false,
            version: 0,
        }
    }

    pub fn cargo_quantity(&self, slice: &SliceId, blueprint: &BlueprintId) -> i64 {
        self.cargo
            .get(slice)
            .and_then(|s| s.get(blueprint))
            .copied()
            .unwrap_or(0)
    }

    pub fn packed_quantity(&self, slice: &SliceId, blueprint: &BlueprintId) -> i64 {
        self.hangar
            .get(slice)
            .and_then(|s| s.packed.get(blueprint))
            .copied()
            .unwrap_or(0)
    }

    /// Quantity of `blueprint` in `slice` of whichever slot it lives in.
    pub fn quantity(&self, slot: Slot, slice: &SliceId, blueprint: &BlueprintId) -> i64 {
        match slot {
            Slot::Cargo => self.cargo_quantity(slice, blueprint),
            Slot::Hangar => self.packed_quantity(slice, blueprint),
        }
    }

    pub fn has_ship(&self, slice: &SliceId, ship: ShipId) -> bool {
        self.hangar
            .get(slice)
            .is_some_and(|s| s.unpacked.binary_search(&ship).is_ok())
    }

    /// Empty in the sense required for destruction.
    pub fn is_empty(&self) -> bool {
        self.usage.is_zero()
            && self.cargo.values().all(|s| s.is_empty())
            && self.hangar.values().all(|s| s.is_empty())
    }

    fn ensure_live(&self) -> InventoryResult<()> {
        if self.tombstoned {
            return Err(InventoryError::not_found(format!("container {}", self.id)));
        }
        Ok(())
    }

    /// Account `volume` (possibly negative) against a slot.
    fn reserve(&mut self, slot: Slot, volume: i64) -> InventoryResult<()> {
        let used = self.usage.get(slot);
        if volume > 0 && used.saturating_add(volume) > self.capacity.get(slot) {
            return Err(InventoryError::InsufficientCapacity {
                container: self.id,
                slot,
            });
        }
        *self.usage.get_mut(slot) = used + volume;
        Ok(())
    }

    /// Apply a signed quantity change for a fungible blueprint.
    ///
    /// Ship blueprints are counted packed in the hangar slot; everything else
    /// goes to cargo. The slice is created on first use; entries that drop to
    /// zero are removed.
    pub fn adjust_stock(
        &mut self,
        slice: &SliceId,
        blueprint: &Blueprint,
        delta: i64,
    ) -> InventoryResult<()> {
        self.ensure_live()?;
        let slot = blueprint.slot();
        let overflow = || InventoryError::invalid_transfer("quantity overflow");
        let next = self
            .quantity(slot, slice, &blueprint.id)
            .checked_add(delta)
            .ok_or_else(overflow)?;
        if next < 0 {
            return Err(InventoryError::InsufficientCargo {
                container: self.id,
                blueprint: blueprint.id.clone(),
            });
        }
        let volume = delta
            .checked_mul(blueprint.unit_volume()?)
            .ok_or_else(overflow)?;
        self.reserve(slot, volume)?;

        let entries = match slot {
            Slot::Cargo => self.cargo.entry(slice.clone()).or_default(),
            Slot::Hangar => &mut self.hangar.entry(slice.clone()).or_default().packed,
        };
        if next == 0 {
            entries.remove(&blueprint.id);
        } else {
            entries.insert(blueprint.id.clone(), next);
        }
        Ok(())
    }

    /// Put an unpacked ship into a hangar slice.
    pub fn dock_ship(
        &mut self,
        slice: &SliceId,
        ship: ShipId,
        ship_blueprint: &Blueprint,
    ) -> InventoryResult<()> {
        self.ensure_live()?;
        if self.has_ship(slice, ship) {
            return Err(InventoryError::ShipInSpaceConflict(ship));
        }
        self.reserve(Slot::Hangar, ship_blueprint.unit_volume()?)?;
        let unpacked = &mut self.hangar.entry(slice.clone()).or_default().unpacked;
        if let Err(pos) = unpacked.binary_search(&ship) {
            unpacked.insert(pos, ship);
        }
        Ok(())
    }

    /// Take an unpacked ship out of a hangar slice.
    pub fn undock_ship(
        &mut self,
        slice: &SliceId,
        ship: ShipId,
        ship_blueprint: &Blueprint,
    ) -> InventoryResult<()> {
        self.ensure_live()?;
        let unpacked = match self.hangar.get_mut(slice) {
            Some(s) => &mut s.unpacked,
            None => return Err(InventoryError::ShipNotPresent(ship)),
        };
        let pos = unpacked
            .binary_search(&ship)
            .map_err(|_| InventoryError::ShipNotPresent(ship))?;
        unpacked.remove(pos);
        self.reserve(Slot::Hangar, -ship_blueprint.unit_volume()?)?;
        Ok(())
    }

    /// Turn one packed ship of `blueprint` into the unpacked ship `ship`.
    ///
    /// Hangar usage is unchanged: the same volume moves from the packed count
    /// to the unpacked list.
    pub fn unpack_ship(
        &mut self,
        slice: &SliceId,
        blueprint: &Blueprint,
        ship: ShipId,
    ) -> InventoryResult<()> {
        self.ensure_live()?;
        let id = self.id;
        let insufficient = || InventoryError::InsufficientCargo {
            container: id,
            blueprint: blueprint.id.clone(),
        };
        let hangar = self.hangar.get_mut(slice).ok_or_else(insufficient)?;
        let packed = hangar.packed.get(&blueprint.id).copied().unwrap_or(0);
        if packed <= 0 {
            return Err(insufficient());
        }
        if packed == 1 {
            hangar.packed.remove(&blueprint.id);
        } else {
            hangar.packed.insert(blueprint.id.clone(), packed - 1);
        }
        if let Err(pos) = hangar.unpacked.binary_search(&ship) {
            hangar.unpacked.insert(pos, ship);
        }
        Ok(())
    }

    /// Replace the container's blueprint (structure/deployable upgrade).
    pub fn upgrade(&mut self, blueprint: &Blueprint) -> InventoryResult<()> {
        self.ensure_live()?;
        let capacity = blueprint.capacity();
        for slot in [Slot::Cargo, Slot::Hangar] {
            if self.usage.get(slot) > capacity.get(slot) {
                return Err(InventoryError::InsufficientCapacity {
                    container: self.id,
                    slot,
                });
            }
        }
        self.blueprint = blueprint.id.clone();
        self.capacity = capacity;
        Ok(())
    }

    /// Recompute usage from contents.
    ///
    /// `unit_volume` resolves fungible blueprints, `ship_volume` resolves
    /// unpacked ships. Used to check the usage invariant.
    pub fn computed_usage(
        &self,
        unit_volume: impl Fn(&BlueprintId) -> i64,
        ship_volume: impl Fn(&ShipId) -> i64,
    ) -> SlotAmounts {
        let cargo = self
            .cargo
            .values()
            .flat_map(|s| s.iter())
            .map(|(bp, qty)| qty * unit_volume(bp))
            .sum();
        let hangar = self
            .hangar
            .values()
            .map(|s| {
                let packed: i64 = s.packed.iter().map(|(bp, qty)| qty * unit_volume(bp)).sum();
                let unpacked: i64 = s.unpacked.iter().map(&ship_volume).sum();
                packed + unpacked
            })
            .sum();
        SlotAmounts::new(cargo, hangar)
    }
}

impl Entity for Container {
    type Id = ContainerId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

impl Owned for Container {
    fn account(&self) -> AccountId {
        self.account
    }
}

impl Versioned for Container {
    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}
