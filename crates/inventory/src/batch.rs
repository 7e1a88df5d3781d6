//! Batch records submitted to the transfer engine.

use serde::{Deserialize, Serialize};

use spacedock_core::{BlueprintId, ContainerId, ShipId, SliceId};

/// Container lifecycle action.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerAction {
    Create,
    Destroy,
}

/// Create or destroy a container of the given blueprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub action: ContainerAction,
    pub container: ContainerId,
    pub blueprint: BlueprintId,
}

/// A signed quantity change against one container slice, or a ship move when
/// `ship` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub inventory: ContainerId,
    #[serde(default)]
    pub slice: SliceId,
    pub quantity: i64,
    pub blueprint: BlueprintId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ship: Option<ShipId>,
}

impl TransferRecord {
    pub fn stock(
        inventory: ContainerId,
        slice: SliceId,
        blueprint: impl Into<BlueprintId>,
        quantity: i64,
    ) -> Self {
        Self {
            inventory,
            slice,
            quantity,
            blueprint: blueprint.into(),
            ship: None,
        }
    }

    pub fn ship_move(
        inventory: ContainerId,
        slice: SliceId,
        blueprint: BlueprintId,
        ship: ShipId,
        quantity: i64,
    ) -> Self {
        Self {
            inventory,
            slice,
            quantity,
            blueprint,
            ship: Some(ship),
        }
    }

    /// Balance key: the ship for ship moves, otherwise the blueprint.
    pub fn balance_key(&self) -> String {
        match self.ship {
            Some(ship) => ship.to_string(),
            None => self.blueprint.to_string(),
        }
    }
}

/// One entry of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchRecord {
    Container(ContainerRecord),
    Transfer(TransferRecord),
}

impl BatchRecord {
    pub fn create(container: ContainerId, blueprint: impl Into<BlueprintId>) -> Self {
        Self::Container(ContainerRecord {
            action: ContainerAction::Create,
            container,
            blueprint: blueprint.into(),
        })
    }

    pub fn destroy(container: ContainerId, blueprint: impl Into<BlueprintId>) -> Self {
        Self::Container(ContainerRecord {
            action: ContainerAction::Destroy,
            container,
            blueprint: blueprint.into(),
        })
    }

    pub fn blueprint(&self) -> &BlueprintId {
        match self {
            BatchRecord::Container(r) => &r.blueprint,
            BatchRecord::Transfer(r) => &r.blueprint,
        }
    }

    pub fn container(&self) -> ContainerId {
        match self {
            BatchRecord::Container(r) => r.container,
            BatchRecord::Transfer(r) => r.inventory,
        }
    }

    /// Container ids this record touches, including a ship's companion
    /// container (inspected for in-space checks).
    pub fn touched_containers(&self) -> impl Iterator<Item = ContainerId> + '_ {
        let companion = match self {
            BatchRecord::Transfer(TransferRecord { ship: Some(s), .. }) => Some(ContainerId::from(*s)),
            _ => None,
        };
        std::iter::once(self.container()).chain(companion)
    }
}

/// Every blueprint id referenced by a batch, deduplicated and sorted.
pub fn referenced_blueprints(records: &[BatchRecord]) -> Vec<BlueprintId> {
    let mut ids: Vec<BlueprintId> = records.iter().map(|r| r.blueprint().clone()).collect();
    ids.sort();
    ids.dedup();
    ids
}

/// Every container id a batch touches, sorted ascending (lock order).
pub fn referenced_containers(records: &[BatchRecord]) -> Vec<ContainerId> {
    let mut ids: Vec<ContainerId> = records.iter().flat_map(|r| r.touched_containers()).collect();
    ids.sort();
    ids.dedup();
    ids
}

/// Every ship id moved by a batch, sorted ascending.
pub fn referenced_ships(records: &[BatchRecord]) -> Vec<ShipId> {
    let mut ids: Vec<ShipId> = records
        .iter()
        .filter_map(|r| match r {
            BatchRecord::Transfer(t) => t.ship,
            BatchRecord::Container(_) => None,
        })
        .collect();
    ids.sort();
    ids.dedup();
    ids
}
