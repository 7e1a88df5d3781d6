//! Facility registration and construct upgrades.

use std::sync::Arc;

use tracing::{info, warn};

use spacedock_auth::Principal;
use spacedock_core::{
    BlueprintId, ContainerId, ExpectedVersion, FacilityId, InventoryError, InventoryResult,
};
use spacedock_inventory::{BlueprintKind, Facility};

use crate::locks::ContainerGuard;
use crate::store::DocumentStore;
use crate::transfer::TransferService;

pub struct FacilityRegistry {
    facilities: Arc<dyn DocumentStore<Facility>>,
    transfers: Arc<TransferService>,
}

impl FacilityRegistry {
    pub fn new(facilities: Arc<dyn DocumentStore<Facility>>, transfers: Arc<TransferService>) -> Self {
        Self {
            facilities,
            transfers,
        }
    }

    /// Register a facility for the caller.
    ///
    /// A facility that shares its id with a container (a deployed structure
    /// or a ship hull) must match that container's owner and blueprint.
    pub async fn register(
        &self,
        principal: Principal,
        id: Option<FacilityId>,
        blueprint: BlueprintId,
    ) -> InventoryResult<Facility> {
        let bp = self.transfers.resolve_one(&blueprint).await?;
        if bp.kind == BlueprintKind::Resource {
            return Err(InventoryError::InvalidBlueprint(blueprint));
        }
        let id = id.unwrap_or_default();
        if let Some(container) = self
            .transfers
            .containers
            .get(ContainerId::from(id))
            .await?
            .filter(|c| !c.tombstoned)
        {
            principal.ensure_owns(&container)?;
            if container.blueprint != blueprint {
                return Err(InventoryError::InvalidBlueprint(blueprint));
            }
        }

        let facility = self
            .facilities
            .put(
                Facility::new(id, principal.account, blueprint),
                ExpectedVersion::Absent,
            )
            .await?;
        info!(facility_id = %facility.id, blueprint = %facility.blueprint, "facility registered");
        Ok(facility)
    }

    pub async fn get(&self, principal: Principal, id: FacilityId) -> InventoryResult<Facility> {
        let facility = self
            .facilities
            .get(id)
            .await?
            .ok_or_else(|| InventoryError::not_found(format!("facility {id}")))?;
        if !principal.can_view(&facility) {
            return Err(InventoryError::Unauthorized);
        }
        Ok(facility)
    }

    pub async fn list(&self, principal: Principal) -> InventoryResult<Vec<Facility>> {
        Ok(self.facilities.list(Some(principal.account)).await?)
    }

    /// Replace a facility's blueprint, upgrading its container if it has one.
    ///
    /// The caller must hold the lock on the facility's container id.
    pub(crate) async fn upgrade(
        &self,
        id: FacilityId,
        target: &BlueprintId,
        guard: &ContainerGuard,
    ) -> InventoryResult<Facility> {
        let container_id = ContainerId::from(id);
        debug_assert!(guard.covers(container_id));

        let bp = self.transfers.resolve_one(target).await?;
        let mut facility = self
            .facilities
            .get(id)
            .await?
            .ok_or_else(|| InventoryError::not_found(format!("facility {id}")))?;

        match self
            .transfers
            .containers
            .get(container_id)
            .await?
            .filter(|c| !c.tombstoned)
        {
            Some(mut container) if container.account == facility.account => {
                let expected = ExpectedVersion::Exact(container.version);
                container.upgrade(&bp)?;
                self.transfers.containers.update(container, expected).await?;
            }
            Some(container) => {
                warn!(
                    facility_id = %id,
                    owner = %container.account,
                    "facility container belongs to another account, left unchanged"
                );
            }
            None => {}
        }

        let expected = ExpectedVersion::Exact(facility.version);
        facility.blueprint = target.clone();
        let facility = self.facilities.put(facility, expected).await?;
        info!(facility_id = %id, blueprint = %target, "facility upgraded");
        Ok(facility)
    }
}
