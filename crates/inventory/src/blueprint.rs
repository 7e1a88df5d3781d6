//! Blueprint definitions as served by the external tech catalog.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use spacedock_core::{BlueprintId, InventoryError, InventoryResult, Slot, SlotAmounts};

/// Closed set of blueprint kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlueprintKind {
    Resource,
    Thinger,
    Structure,
    Deployable,
    #[serde(alias = "spaceship")]
    Ship,
}

/// Production action a facility can perform on a target blueprint.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobAction {
    Manufacture,
    Refine,
    Construct,
}

impl core::fmt::Display for JobAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            JobAction::Manufacture => f.write_str("manufacture"),
            JobAction::Refine => f.write_str("refine"),
            JobAction::Construct => f.write_str("construct"),
        }
    }
}

/// How a blueprint is built: seconds per unit and resources per unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRule {
    pub time: u64,
    #[serde(default)]
    pub resources: BTreeMap<BlueprintId, i64>,
}

/// What one unit of a blueprint refines into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefineRule {
    /// Seconds per refined unit.
    #[serde(default)]
    pub time: u64,
    pub outputs: BTreeMap<BlueprintId, i64>,
}

/// Read-only type definition.
///
/// Field names follow the catalog wire format (`type`, `inventory_capacity`,
/// `hanger_capacity`, `canManufacture`, ...). The catalog is keyed by id, so
/// `id` is assigned after decoding via [`Blueprint::with_id`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blueprint {
    #[serde(default)]
    pub id: BlueprintId,
    #[serde(rename = "type")]
    pub kind: BlueprintKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<i64>,
    #[serde(default, rename = "inventory_capacity")]
    pub cargo_capacity: i64,
    #[serde(default, rename = "hanger_capacity")]
    pub hangar_capacity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refine: Option<RefineRule>,
    #[serde(default, rename = "canManufacture")]
    pub can_manufacture: Vec<BlueprintId>,
    #[serde(default, rename = "canRefine")]
    pub can_refine: Vec<BlueprintId>,
    #[serde(default, rename = "canConstruct")]
    pub can_construct: Vec<BlueprintId>,
}

impl Blueprint {
    /// Minimal blueprint of the given kind (no rules, no capabilities).
    pub fn new(id: impl Into<BlueprintId>, kind: BlueprintKind) -> Self {
        Self {
            id: id.into(),
            kind,
            volume: None,
            cargo_capacity: 0,
            hangar_capacity: 0,
            build: None,
            refine: None,
            can_manufacture: Vec::new(),
            can_refine: Vec::new(),
            can_construct: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: BlueprintId) -> Self {
        self.id = id;
        self
    }

    pub fn with_volume(mut self, volume: i64) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn with_capacity(mut self, cargo: i64, hangar: i64) -> Self {
        self.cargo_capacity = cargo;
        self.hangar_capacity = hangar;
        self
    }

    /// Unit volume; a blueprint without one cannot be stored anywhere.
    pub fn unit_volume(&self) -> InventoryResult<i64> {
        match self.volume {
            Some(v) if v >= 0 => Ok(v),
            _ => Err(InventoryError::InvalidBlueprint(self.id.clone())),
        }
    }

    /// Slot that units of this blueprint occupy.
    pub fn slot(&self) -> Slot {
        match self.kind {
            BlueprintKind::Ship => Slot::Hangar,
            _ => Slot::Cargo,
        }
    }

    pub fn is_ship(&self) -> bool {
        self.kind == BlueprintKind::Ship
    }

    /// Capacity of a container seeded from this blueprint.
    pub fn capacity(&self) -> SlotAmounts {
        SlotAmounts::new(self.cargo_capacity.max(0), self.hangar_capacity.max(0))
    }

    /// Targets this blueprint can act on for the given action.
    pub fn capabilities(&self, action: JobAction) -> &[BlueprintId] {
        match action {
            JobAction::Manufacture => &self.can_manufacture,
            JobAction::Refine => &self.can_refine,
            JobAction::Construct => &self.can_construct,
        }
    }

    pub fn can(&self, action: JobAction, target: &BlueprintId) -> bool {
        self.capabilities(action).contains(target)
    }
}
