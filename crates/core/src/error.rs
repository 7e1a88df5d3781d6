//! Inventory error model.

use thiserror::Error;

use crate::id::{BlueprintId, ContainerId, FacilityId, ShipId};
use crate::slot::Slot;

/// Result type used across the inventory domain and its services.
pub type InventoryResult<T> = Result<T, InventoryError>;

/// Error taxonomy for batches, ships, jobs and their collaborators.
///
/// Domain validation failures are deterministic: the caller's request was
/// invalid and retrying it unchanged fails again. `DependencyFailure` and
/// `Storage` mean the system could not complete the request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// The caller does not own a referenced entity.
    #[error("unauthorized")]
    Unauthorized,

    #[error("not found: {0}")]
    NotFound(String),

    /// Unknown blueprint, or one that lacks the data the operation needs.
    #[error("invalid blueprint: {0}")]
    InvalidBlueprint(BlueprintId),

    /// A malformed record (zero quantity, bad ship transfer shape, ...).
    #[error("invalid transfer: {0}")]
    InvalidTransfer(String),

    /// Signed deltas for a key do not sum to zero across the batch.
    #[error("unbalanced transfer for {0}")]
    Unbalanced(String),

    #[error("insufficient {slot} capacity in container {container}")]
    InsufficientCapacity { container: ContainerId, slot: Slot },

    #[error("insufficient {blueprint} in container {container}")]
    InsufficientCargo {
        container: ContainerId,
        blueprint: BlueprintId,
    },

    /// An undock record names a location the ship is not at.
    #[error("ship {0} is not present at the given location")]
    ShipNotPresent(ShipId),

    /// The ship's docked/in-space state conflicts with the requested move.
    #[error("ship {0} state conflicts with the requested move")]
    ShipInSpaceConflict(ShipId),

    #[error("container {0} is not empty")]
    ContainerNotEmpty(ContainerId),

    #[error("facility {facility} cannot {action} {target}")]
    CapabilityError {
        facility: FacilityId,
        action: String,
        target: BlueprintId,
    },

    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Stale write (optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),

    /// An external collaborator (catalog, authorization) failed or timed out.
    #[error("dependency failure: {0}")]
    DependencyFailure(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl InventoryError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_transfer(msg: impl Into<String>) -> Self {
        Self::InvalidTransfer(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn dependency(msg: impl Into<String>) -> Self {
        Self::DependencyFailure(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Stable snake_case code used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::NotFound(_) => "not_found",
            Self::InvalidBlueprint(_) => "invalid_blueprint",
            Self::InvalidTransfer(_) => "invalid_transfer",
            Self::Unbalanced(_) => "unbalanced",
            Self::InsufficientCapacity { .. } => "insufficient_capacity",
            Self::InsufficientCargo { .. } => "insufficient_cargo",
            Self::ShipNotPresent(_) => "ship_not_present",
            Self::ShipInSpaceConflict(_) => "ship_in_space_conflict",
            Self::ContainerNotEmpty(_) => "container_not_empty",
            Self::CapabilityError { .. } => "capability_error",
            Self::Unsupported(_) => "unsupported",
            Self::Conflict(_) => "conflict",
            Self::DependencyFailure(_) => "dependency_failure",
            Self::Storage(_) => "storage_error",
        }
    }

    /// True when the failure came from the system rather than the request.
    pub fn is_service_error(&self) -> bool {
        matches!(self, Self::DependencyFailure(_) | Self::Storage(_))
    }
}
