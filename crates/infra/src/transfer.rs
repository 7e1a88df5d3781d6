//! Batch application against the stores.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use spacedock_auth::Principal;
use spacedock_core::{
    AccountId, BlueprintId, ContainerId, ExpectedVersion, InventoryError, InventoryResult, ShipId,
    Versioned,
};
use spacedock_inventory::{
    BatchContext, BatchRecord, Blueprint, Container, Ship, ShipState, TransferPlan, plan_batch,
    referenced_blueprints, referenced_containers, referenced_ships,
};

use crate::catalog::BlueprintCatalog;
use crate::deadline::within;
use crate::locks::{ContainerGuard, ContainerLocks};
use crate::store::{ContainerStore, DocumentStore};

/// Applies transfer batches atomically.
///
/// A batch is resolved against the catalog, its containers are locked in id
/// order, a snapshot is planned with [`plan_batch`] and the plan is committed
/// in one store write.
pub struct TransferService {
    pub(crate) containers: Arc<dyn ContainerStore>,
    pub(crate) ships: Arc<dyn DocumentStore<Ship>>,
    pub(crate) catalog: Arc<dyn BlueprintCatalog>,
    pub(crate) locks: Arc<ContainerLocks>,
    pub(crate) timeout: Duration,
}

impl TransferService {
    pub fn new(
        containers: Arc<dyn ContainerStore>,
        ships: Arc<dyn DocumentStore<Ship>>,
        catalog: Arc<dyn BlueprintCatalog>,
        locks: Arc<ContainerLocks>,
        timeout: Duration,
    ) -> Self {
        Self {
            containers,
            ships,
            catalog,
            locks,
            timeout,
        }
    }

    /// Validate and apply a batch on behalf of `principal`.
    ///
    /// Returns the committed documents. Nothing is written unless every
    /// record validates.
    pub async fn apply_batch(
        &self,
        records: &[BatchRecord],
        principal: Principal,
    ) -> InventoryResult<TransferPlan> {
        if records.is_empty() {
            return Ok(TransferPlan::default());
        }
        let blueprints = self.resolve(&referenced_blueprints(records)).await?;
        let guard = self.locks.lock_all(referenced_containers(records)).await;
        self.apply_locked(records, principal, &blueprints, &guard).await
    }

    pub(crate) async fn resolve(
        &self,
        ids: &[BlueprintId],
    ) -> InventoryResult<BTreeMap<BlueprintId, Blueprint>> {
        within(self.timeout, "blueprint catalog", self.catalog.get_many(ids)).await
    }

    /// The whole blueprint catalog, under the dependency timeout.
    pub async fn blueprints(&self) -> InventoryResult<BTreeMap<BlueprintId, Blueprint>> {
        within(self.timeout, "blueprint catalog", self.catalog.all()).await
    }

    pub(crate) async fn resolve_one(&self, id: &BlueprintId) -> InventoryResult<Blueprint> {
        self.resolve(std::slice::from_ref(id))
            .await?
            .remove(id)
            .ok_or_else(|| InventoryError::InvalidBlueprint(id.clone()))
    }

    /// Plan and commit while the caller holds locks on every container the
    /// batch touches.
    pub(crate) async fn apply_locked(
        &self,
        records: &[BatchRecord],
        principal: Principal,
        blueprints: &BTreeMap<BlueprintId, Blueprint>,
        guard: &ContainerGuard,
    ) -> InventoryResult<TransferPlan> {
        let touched = referenced_containers(records);
        debug_assert!(touched.iter().all(|id| guard.covers(*id)));

        let containers = self.load_containers(&touched).await?;
        let mut ship_ids = referenced_ships(records);
        ship_ids.extend(touched.iter().map(|id| ShipId::from(*id)));
        let ships = self.load_ships(ship_ids).await?;

        let ctx = BatchContext {
            account: principal.account,
            privileged: principal.privileged,
            blueprints,
            containers: &containers,
            ships: &ships,
        };
        let plan = match plan_batch(records, &ctx) {
            Ok(plan) => plan,
            Err(e) => {
                info!(account = %principal.account, records = records.len(), error = %e, "batch rejected");
                return Err(e);
            }
        };
        let committed = self.commit(plan).await?;
        debug!(
            account = %principal.account,
            records = records.len(),
            created = committed.created.len(),
            updated = committed.updated.len(),
            ships = committed.ships.len(),
            "batch applied"
        );
        Ok(committed)
    }

    async fn load_containers(
        &self,
        ids: &[ContainerId],
    ) -> InventoryResult<BTreeMap<ContainerId, Container>> {
        let mut found = BTreeMap::new();
        for id in ids {
            if let Some(c) = self.containers.get(*id).await? {
                found.insert(*id, c);
            }
        }
        Ok(found)
    }

    async fn load_ships(
        &self,
        mut ids: Vec<ShipId>,
    ) -> InventoryResult<BTreeMap<ShipId, Ship>> {
        ids.sort();
        ids.dedup();
        let mut found = BTreeMap::new();
        // Hosts of docked ships are followed so the engine can see carry chains.
        while let Some(id) = ids.pop() {
            if found.contains_key(&id) {
                continue;
            }
            if let Some(s) = self.ships.get(id).await? {
                if let ShipState::Docked { container, .. } = &s.state {
                    ids.push(ShipId::from(*container));
                }
                found.insert(id, s);
            }
        }
        Ok(found)
    }

    async fn commit(&self, plan: TransferPlan) -> InventoryResult<TransferPlan> {
        let writes: Vec<(Container, ExpectedVersion)> = plan
            .created
            .into_iter()
            .map(|c| (c, ExpectedVersion::Absent))
            .chain(plan.updated.into_iter().map(|c| {
                let v = c.version();
                (c, ExpectedVersion::Exact(v))
            }))
            .collect();
        let mut committed = TransferPlan::default();
        if !writes.is_empty() {
            for c in self.containers.commit(writes).await? {
                if c.version == 1 {
                    committed.created.push(c);
                } else {
                    committed.updated.push(c);
                }
            }
        }
        if !plan.ships.is_empty() {
            let ships = plan
                .ships
                .into_iter()
                .map(|s| {
                    let v = s.version();
                    (s, ExpectedVersion::Exact(v))
                })
                .collect();
            committed.ships = self.ships.put_all(ships).await?;
        }
        Ok(committed)
    }

    /// Fetch a live container the caller may see.
    pub async fn get_container(
        &self,
        principal: Principal,
        id: ContainerId,
    ) -> InventoryResult<Container> {
        let container = self
            .containers
            .get(id)
            .await?
            .filter(|c| !c.tombstoned)
            .ok_or_else(|| InventoryError::not_found(format!("container {id}")))?;
        if !principal.can_view(&container) {
            return Err(InventoryError::Unauthorized);
        }
        Ok(container)
    }

    /// The caller's containers, or every container when a privileged caller
    /// asks for `all`.
    pub async fn list_containers(
        &self,
        principal: Principal,
        all: bool,
    ) -> InventoryResult<Vec<Container>> {
        let filter = match (all, principal.privileged) {
            (true, true) => None,
            (true, false) => return Err(InventoryError::Unauthorized),
            (false, _) => Some(principal.account),
        };
        Ok(self.containers.list(filter).await?)
    }

    /// Privileged container creation on behalf of `owner`.
    pub async fn create_container(
        &self,
        principal: Principal,
        id: ContainerId,
        owner: AccountId,
        blueprint: BlueprintId,
    ) -> InventoryResult<Container> {
        let acting = principal.acting_for(owner)?;
        let plan = self
            .apply_batch(&[BatchRecord::create(id, blueprint)], acting)
            .await?;
        plan.created
            .into_iter()
            .next()
            .ok_or_else(|| InventoryError::storage(format!("container {id} was not written")))
    }

    /// Privileged container destruction on behalf of its owner.
    pub async fn destroy_container(
        &self,
        principal: Principal,
        id: ContainerId,
    ) -> InventoryResult<()> {
        if !principal.privileged {
            return Err(InventoryError::Unauthorized);
        }
        let container = self
            .containers
            .get(id)
            .await?
            .filter(|c| !c.tombstoned)
            .ok_or_else(|| InventoryError::not_found(format!("container {id}")))?;
        let acting = principal.acting_for(container.account)?;
        self.apply_batch(&[BatchRecord::destroy(id, container.blueprint)], acting)
            .await?;
        Ok(())
    }
}
