use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use spacedock_core::{AccountId, BlueprintId, ContainerId, FacilityId, SliceId};

// -------------------------
// Request DTOs
// -------------------------

/// `?all=true` on list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateContainerRequest {
    /// Owner of the new container.
    pub account: AccountId,
    pub blueprint: BlueprintId,
}

#[derive(Debug, Deserialize)]
pub struct UnpackShipRequest {
    pub container: ContainerId,
    #[serde(default)]
    pub slice: SliceId,
    pub blueprint: BlueprintId,
}

/// `POST /ships/:id`: a move when `in_space` is present, and/or a
/// customization patch made of every other field.
#[derive(Debug, Deserialize)]
pub struct UpdateShipRequest {
    #[serde(default)]
    pub in_space: Option<bool>,
    #[serde(default)]
    pub container: Option<ContainerId>,
    #[serde(default)]
    pub slice: Option<SliceId>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl UpdateShipRequest {
    /// Location fields sent without `in_space` are handed to the patch so
    /// they get rejected there.
    pub fn into_patch(self) -> Map<String, Value> {
        let mut patch = self.fields;
        if self.in_space.is_none() {
            if let Some(container) = self.container {
                patch.insert("container".to_string(), Value::String(container.to_string()));
            }
            if let Some(slice) = self.slice {
                patch.insert("slice".to_string(), Value::String(slice.to_string()));
            }
        }
        patch
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterFacilityRequest {
    #[serde(default)]
    pub id: Option<FacilityId>,
    pub blueprint: BlueprintId,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    pub account: AccountId,
    pub privileged: bool,
}
