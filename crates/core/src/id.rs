//! Strongly-typed identifiers used across the inventory domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::InventoryError;

/// Identifier of a player or service account (ownership boundary).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(Uuid);

/// Identifier of a container (ship hull, structure, deployable).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(Uuid);

/// Identifier of an unpacked ship.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShipId(Uuid);

/// Identifier of a production job.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

/// Identifier of a production facility.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FacilityId(Uuid);

macro_rules! impl_uuid_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
            /// for determinism.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = InventoryError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| InventoryError::invalid_transfer(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

impl_uuid_newtype!(AccountId, "AccountId");
impl_uuid_newtype!(ContainerId, "ContainerId");
impl_uuid_newtype!(ShipId, "ShipId");
impl_uuid_newtype!(JobId, "JobId");
impl_uuid_newtype!(FacilityId, "FacilityId");

/// A ship's companion container shares the ship's UUID.
impl From<ShipId> for ContainerId {
    fn from(value: ShipId) -> Self {
        Self(value.0)
    }
}

impl From<ContainerId> for ShipId {
    fn from(value: ContainerId) -> Self {
        Self(value.0)
    }
}

/// A facility that is also a container (structure, deployable, ship hull)
/// shares its UUID.
impl From<FacilityId> for ContainerId {
    fn from(value: FacilityId) -> Self {
        Self(value.0)
    }
}

/// Identifier of a blueprint in the external catalog (e.g. `"ore"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlueprintId(String);

/// Name of a slice partitioning a container slot (e.g. `"default"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SliceId(String);

macro_rules! impl_string_newtype {
    ($t:ty) => {
        impl $t {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $t {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $t {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl core::borrow::Borrow<str> for $t {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

impl_string_newtype!(BlueprintId);
impl_string_newtype!(SliceId);

/// Placeholder used while a blueprint document is being decoded; the
/// catalog assigns the real id from the document key.
impl Default for BlueprintId {
    fn default() -> Self {
        Self::new("")
    }
}

impl Default for SliceId {
    fn default() -> Self {
        Self::new("default")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn companion_container_shares_ship_uuid() {
        let ship = ShipId::new();
        let container = ContainerId::from(ship);
        assert_eq!(container.as_uuid(), ship.as_uuid());
        assert_eq!(ShipId::from(container), ship);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("not-a-uuid".parse::<ContainerId>().is_err());
        let id = ContainerId::new();
        assert_eq!(id.to_string().parse::<ContainerId>().unwrap(), id);
    }

    #[test]
    fn string_ids_serialize_transparently() {
        let id = BlueprintId::new("ore");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"ore\"");
        assert_eq!(SliceId::default().as_str(), "default");
    }
}
