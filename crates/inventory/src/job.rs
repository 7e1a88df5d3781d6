//! Production facilities and timed build jobs.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use spacedock_core::{
    AccountId, BlueprintId, ContainerId, Entity, FacilityId, InventoryError, InventoryResult,
    JobId, Owned, SliceId, Versioned,
};

use crate::batch::{BatchRecord, TransferRecord};
use crate::blueprint::{Blueprint, JobAction};

/// Something that can run jobs: a structure, deployable or ship hull.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facility {
    pub id: FacilityId,
    pub account: AccountId,
    /// Current blueprint; replaced when a construct job completes.
    pub blueprint: BlueprintId,
    #[serde(default)]
    pub version: u64,
}

impl Facility {
    pub fn new(id: FacilityId, account: AccountId, blueprint: BlueprintId) -> Self {
        Self {
            id,
            account,
            blueprint,
            version: 0,
        }
    }

    /// Fail unless `blueprint` (this facility's current one) lists `target`
    /// for `action`.
    pub fn check_capability(
        &self,
        blueprint: &Blueprint,
        action: JobAction,
        target: &BlueprintId,
    ) -> InventoryResult<()> {
        if blueprint.can(action, target) {
            Ok(())
        } else {
            Err(InventoryError::CapabilityError {
                facility: self.id,
                action: action.to_string(),
                target: target.clone(),
            })
        }
    }
}

impl Entity for Facility {
    type Id = FacilityId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

impl Owned for Facility {
    fn account(&self) -> AccountId {
        self.account
    }
}

impl Versioned for Facility {
    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

fn default_quantity() -> i64 {
    1
}

/// Job submission as received from a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub facility: FacilityId,
    pub action: JobAction,
    pub target: BlueprintId,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    /// Source of inputs and destination of outputs.
    pub inventory: ContainerId,
    #[serde(default)]
    pub slice: SliceId,
}

impl JobRequest {
    /// Construct jobs always build exactly one unit.
    pub fn effective_quantity(&self) -> InventoryResult<i64> {
        if self.quantity <= 0 {
            return Err(InventoryError::invalid_transfer(format!(
                "job quantity must be positive, got {}",
                self.quantity
            )));
        }
        Ok(match self.action {
            JobAction::Construct => 1,
            _ => self.quantity,
        })
    }
}

/// Inputs, outputs and duration of one job, fixed at submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecipe {
    pub inputs: BTreeMap<BlueprintId, i64>,
    pub outputs: BTreeMap<BlueprintId, i64>,
    pub duration_secs: u64,
}

fn scaled(
    entries: &BTreeMap<BlueprintId, i64>,
    quantity: i64,
) -> InventoryResult<BTreeMap<BlueprintId, i64>> {
    entries
        .iter()
        .map(|(bp, n)| {
            n.checked_mul(quantity)
                .map(|v| (bp.clone(), v))
                .ok_or_else(|| InventoryError::invalid_transfer("job quantity overflow"))
        })
        .collect()
}

fn scaled_time(per_unit: u64, quantity: i64) -> InventoryResult<u64> {
    u64::try_from(quantity)
        .ok()
        .and_then(|q| per_unit.checked_mul(q))
        .ok_or_else(|| InventoryError::invalid_transfer("job duration overflow"))
}

impl JobRecipe {
    /// Resolve what a job of `quantity` units of `target` consumes and yields.
    ///
    /// * manufacture: build resources in, `target` out
    /// * refine: `target` in, its refine outputs out
    /// * construct: build resources in, nothing out (the facility changes)
    pub fn resolve(action: JobAction, target: &Blueprint, quantity: i64) -> InventoryResult<Self> {
        let missing = || InventoryError::InvalidBlueprint(target.id.clone());
        match action {
            JobAction::Manufacture => {
                let build = target.build.as_ref().ok_or_else(missing)?;
                Ok(Self {
                    inputs: scaled(&build.resources, quantity)?,
                    outputs: BTreeMap::from([(target.id.clone(), quantity)]),
                    duration_secs: scaled_time(build.time, quantity)?,
                })
            }
            JobAction::Refine => {
                let refine = target.refine.as_ref().ok_or_else(missing)?;
                Ok(Self {
                    inputs: BTreeMap::from([(target.id.clone(), quantity)]),
                    outputs: scaled(&refine.outputs, quantity)?,
                    duration_secs: scaled_time(refine.time, quantity)?,
                })
            }
            JobAction::Construct => {
                let build = target.build.as_ref().ok_or_else(missing)?;
                Ok(Self {
                    inputs: build.resources.clone(),
                    outputs: BTreeMap::new(),
                    duration_secs: build.time,
                })
            }
        }
    }
}

/// A queued or finished production job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildJob {
    pub id: JobId,
    pub account: AccountId,
    pub facility: FacilityId,
    pub action: JobAction,
    pub target: BlueprintId,
    pub quantity: i64,
    pub inventory: ContainerId,
    pub slice: SliceId,
    pub outputs: BTreeMap<BlueprintId, i64>,
    pub created_at: DateTime<Utc>,
    pub finish_at: DateTime<Utc>,
    pub finished: bool,
    #[serde(default)]
    pub version: u64,
}

impl BuildJob {
    pub fn new(
        id: JobId,
        account: AccountId,
        request: &JobRequest,
        quantity: i64,
        recipe: &JobRecipe,
        now: DateTime<Utc>,
    ) -> InventoryResult<Self> {
        let finish_at = i64::try_from(recipe.duration_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|d| now.checked_add_signed(d))
            .ok_or_else(|| InventoryError::invalid_transfer("job duration overflow"))?;
        Ok(Self {
            id,
            account,
            facility: request.facility,
            action: request.action,
            target: request.target.clone(),
            quantity,
            inventory: request.inventory,
            slice: request.slice.clone(),
            outputs: recipe.outputs.clone(),
            created_at: now,
            finish_at,
            finished: false,
            version: 0,
        })
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.finished && self.finish_at <= now
    }

    /// Records removing the recipe inputs from the job's inventory.
    pub fn consumption(&self, recipe: &JobRecipe) -> Vec<BatchRecord> {
        self.records(&recipe.inputs, -1)
    }

    /// Records delivering the outputs into the job's inventory.
    pub fn production(&self) -> Vec<BatchRecord> {
        self.records(&self.outputs, 1)
    }

    fn records(&self, entries: &BTreeMap<BlueprintId, i64>, sign: i64) -> Vec<BatchRecord> {
        entries
            .iter()
            .filter(|(_, n)| **n != 0)
            .map(|(bp, n)| {
                BatchRecord::Transfer(TransferRecord::stock(
                    self.inventory,
                    self.slice.clone(),
                    bp.clone(),
                    sign * n,
                ))
            })
            .collect()
    }
}

impl Entity for BuildJob {
    type Id = JobId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

impl Owned for BuildJob {
    fn account(&self) -> AccountId {
        self.account
    }
}

impl Versioned for BuildJob {
    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}
