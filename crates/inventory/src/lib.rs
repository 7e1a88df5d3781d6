//! Inventory domain module.
//!
//! Containers, ships, blueprints, production jobs and the batch transfer
//! engine, implemented purely as deterministic domain logic (no IO, no HTTP,
//! no storage). Services in `spacedock-infra` load snapshots, call into this
//! crate and commit the results.

pub mod batch;
pub mod blueprint;
pub mod container;
pub mod engine;
pub mod job;
pub mod ship;

pub use batch::{
    BatchRecord, ContainerAction, ContainerRecord, TransferRecord, referenced_blueprints,
    referenced_containers, referenced_ships,
};
pub use blueprint::{Blueprint, BlueprintKind, BuildRule, JobAction, RefineRule};
pub use container::{CargoSlice, Container, HangarSlice};
pub use engine::{BatchContext, TransferPlan, UnpackPlan, plan_batch, plan_unpack};
pub use job::{BuildJob, Facility, JobRecipe, JobRequest};
pub use ship::{PROTECTED_FIELDS, Ship, ShipState, check_patch};
