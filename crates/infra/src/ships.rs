//! Ship registry: unpacking, docking and customization of ships.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::info;

use spacedock_auth::Principal;
use spacedock_core::{
    BlueprintId, ContainerId, ExpectedVersion, InventoryError, InventoryResult, ShipId, SliceId,
};
use spacedock_inventory::{BatchRecord, Ship, ShipState, TransferRecord, plan_unpack};

use crate::transfer::TransferService;

/// Owns the ship lifecycle. Docking state only changes through
/// [`ShipRegistry::dock`] and [`ShipRegistry::undock`], which run as
/// single-record batches through the transfer engine.
pub struct ShipRegistry {
    transfers: Arc<TransferService>,
}

impl ShipRegistry {
    pub fn new(transfers: Arc<TransferService>) -> Self {
        Self { transfers }
    }

    /// Unpack one packed ship of `blueprint` from a hangar slice.
    pub async fn unpack(
        &self,
        principal: Principal,
        container: ContainerId,
        slice: SliceId,
        blueprint: BlueprintId,
    ) -> InventoryResult<Ship> {
        let bp = self.transfers.resolve_one(&blueprint).await?;
        let ship_id = ShipId::new();
        let _guard = self
            .transfers
            .locks
            .lock_all([container, ContainerId::from(ship_id)])
            .await;

        let hangar = self
            .transfers
            .containers
            .get(container)
            .await?
            .ok_or_else(|| InventoryError::not_found(format!("container {container}")))?;
        let expected = ExpectedVersion::Exact(hangar.version);
        let plan = plan_unpack(&hangar, &slice, &bp, principal.account, ship_id)?;

        self.transfers
            .containers
            .commit(vec![
                (plan.container, expected),
                (plan.companion, ExpectedVersion::Absent),
            ])
            .await?;
        let ship = self
            .transfers
            .ships
            .put(plan.ship, ExpectedVersion::Absent)
            .await?;
        info!(ship_id = %ship.id, container_id = %container, slice = %slice, blueprint = %blueprint, "ship unpacked");
        Ok(ship)
    }

    /// Dock a ship that is in space into `container`/`slice`.
    pub async fn dock(
        &self,
        principal: Principal,
        id: ShipId,
        container: ContainerId,
        slice: SliceId,
    ) -> InventoryResult<Ship> {
        let ship = self.get(principal, id).await?;
        principal.ensure_owns(&ship)?;
        let record = TransferRecord::ship_move(container, slice, ship.blueprint.clone(), id, 1);
        self.move_ship(principal, ship, record).await
    }

    /// Launch a docked ship into space.
    pub async fn undock(&self, principal: Principal, id: ShipId) -> InventoryResult<Ship> {
        let ship = self.get(principal, id).await?;
        principal.ensure_owns(&ship)?;
        let ShipState::Docked { container, slice } = ship.state.clone() else {
            return Err(InventoryError::ShipNotPresent(id));
        };
        let record = TransferRecord::ship_move(container, slice, ship.blueprint.clone(), id, -1);
        self.move_ship(principal, ship, record).await
    }

    async fn move_ship(
        &self,
        principal: Principal,
        ship: Ship,
        record: TransferRecord,
    ) -> InventoryResult<Ship> {
        let plan = self
            .transfers
            .apply_batch(
                &[BatchRecord::Transfer(record)],
                Principal::service(principal.account),
            )
            .await?;
        let moved = plan
            .ships
            .into_iter()
            .find(|s| s.id == ship.id)
            .unwrap_or(ship);
        info!(ship_id = %moved.id, in_space = moved.state.is_in_space(), "ship moved");
        Ok(moved)
    }

    /// Merge customization fields; docking state cannot be patched.
    pub async fn update(
        &self,
        principal: Principal,
        id: ShipId,
        patch: &Map<String, Value>,
    ) -> InventoryResult<Ship> {
        let _guard = self.transfers.locks.lock(ContainerId::from(id)).await;
        let mut ship = self.get(principal, id).await?;
        principal.ensure_owns(&ship)?;
        let expected = ExpectedVersion::Exact(ship.version);
        ship.apply_patch(patch)?;
        Ok(self.transfers.ships.put(ship, expected).await?)
    }

    pub async fn get(&self, principal: Principal, id: ShipId) -> InventoryResult<Ship> {
        let ship = self
            .transfers
            .ships
            .get(id)
            .await?
            .ok_or_else(|| InventoryError::not_found(format!("ship {id}")))?;
        if !principal.can_view(&ship) {
            return Err(InventoryError::Unauthorized);
        }
        Ok(ship)
    }

    pub async fn list(&self, principal: Principal) -> InventoryResult<Vec<Ship>> {
        Ok(self.transfers.ships.list(Some(principal.account)).await?)
    }
}
