//! Unpacked ship entities and their docking state.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use spacedock_core::{
    AccountId, BlueprintId, ContainerId, Entity, InventoryError, InventoryResult, Owned, ShipId,
    SliceId, Versioned,
};

/// Where a ship currently is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ShipState {
    Docked { container: ContainerId, slice: SliceId },
    InSpace,
}

impl ShipState {
    pub fn is_in_space(&self) -> bool {
        matches!(self, ShipState::InSpace)
    }

    pub fn is_docked_at(&self, container: ContainerId, slice: &SliceId) -> bool {
        matches!(self, ShipState::Docked { container: c, slice: s } if *c == container && s == slice)
    }
}

/// Fields owned by the docking state machine; customization patches may not
/// touch them.
pub const PROTECTED_FIELDS: &[&str] = &[
    "id",
    "account",
    "blueprint",
    "state",
    "location",
    "container",
    "slice",
    "in_space",
    "version",
];

/// Reject a customization patch that names a [`PROTECTED_FIELDS`] key.
pub fn check_patch(patch: &Map<String, Value>) -> InventoryResult<()> {
    match patch.keys().find(|k| PROTECTED_FIELDS.contains(&k.as_str())) {
        Some(field) => Err(InventoryError::invalid_transfer(format!(
            "field `{field}` can only change through dock/undock"
        ))),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ship {
    pub id: ShipId,
    pub account: AccountId,
    pub blueprint: BlueprintId,
    pub state: ShipState,
    /// Free-form player customization (name, paint, ...).
    #[serde(default)]
    pub customization: Map<String, Value>,
    #[serde(default)]
    pub version: u64,
}

impl Ship {
    pub fn docked(
        id: ShipId,
        account: AccountId,
        blueprint: BlueprintId,
        container: ContainerId,
        slice: SliceId,
    ) -> Self {
        Self {
            id,
            account,
            blueprint,
            state: ShipState::Docked { container, slice },
            customization: Map::new(),
            version: 0,
        }
    }

    /// Container holding this ship's own cargo and hangar.
    pub fn companion(&self) -> ContainerId {
        ContainerId::from(self.id)
    }

    /// Merge a customization patch. `null` values remove a key.
    pub fn apply_patch(&mut self, patch: &Map<String, Value>) -> InventoryResult<()> {
        check_patch(patch)?;
        for (key, value) in patch {
            if value.is_null() {
                self.customization.remove(key);
            } else {
                self.customization.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }
}

impl Entity for Ship {
    type Id = ShipId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

impl Owned for Ship {
    fn account(&self) -> AccountId {
        self.account
    }
}

impl Versioned for Ship {
    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}
