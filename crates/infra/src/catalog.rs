//! Blueprint catalog clients.
//!
//! The catalog is an external, read-only service keyed by blueprint id. The
//! wire format is a JSON object mapping ids to blueprint documents (see
//! `default_blueprints.json`).

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use spacedock_core::BlueprintId;
use spacedock_inventory::Blueprint;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog unreachable: {0}")]
    Unavailable(String),
    #[error("malformed catalog document: {0}")]
    Malformed(String),
}

/// Read-only lookup of blueprint definitions.
#[async_trait]
pub trait BlueprintCatalog: Send + Sync {
    async fn get(&self, id: &BlueprintId) -> Result<Option<Blueprint>, CatalogError>;

    async fn all(&self) -> Result<BTreeMap<BlueprintId, Blueprint>, CatalogError>;

    /// Resolve several ids at once; unknown ids are left out.
    async fn get_many(
        &self,
        ids: &[BlueprintId],
    ) -> Result<BTreeMap<BlueprintId, Blueprint>, CatalogError> {
        let mut found = BTreeMap::new();
        for id in ids {
            if let Some(bp) = self.get(id).await? {
                found.insert(id.clone(), bp);
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl<S> BlueprintCatalog for Arc<S>
where
    S: BlueprintCatalog + ?Sized,
{
    async fn get(&self, id: &BlueprintId) -> Result<Option<Blueprint>, CatalogError> {
        (**self).get(id).await
    }

    async fn all(&self) -> Result<BTreeMap<BlueprintId, Blueprint>, CatalogError> {
        (**self).all().await
    }

    async fn get_many(
        &self,
        ids: &[BlueprintId],
    ) -> Result<BTreeMap<BlueprintId, Blueprint>, CatalogError> {
        (**self).get_many(ids).await
    }
}

/// Decode the catalog wire format, assigning each blueprint its key as id.
pub fn decode_catalog(json: &str) -> Result<BTreeMap<BlueprintId, Blueprint>, CatalogError> {
    let raw: BTreeMap<BlueprintId, Blueprint> =
        serde_json::from_str(json).map_err(|e| CatalogError::Malformed(e.to_string()))?;
    Ok(with_ids(raw))
}

fn with_ids(raw: BTreeMap<BlueprintId, Blueprint>) -> BTreeMap<BlueprintId, Blueprint> {
    raw.into_iter()
        .map(|(id, bp)| (id.clone(), bp.with_id(id)))
        .collect()
}

/// Fixed, in-process catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticBlueprintCatalog {
    blueprints: BTreeMap<BlueprintId, Blueprint>,
}

impl StaticBlueprintCatalog {
    pub fn new(blueprints: impl IntoIterator<Item = Blueprint>) -> Self {
        Self {
            blueprints: blueprints
                .into_iter()
                .map(|bp| (bp.id.clone(), bp))
                .collect(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        Ok(Self {
            blueprints: decode_catalog(json)?,
        })
    }

    /// The built-in blueprint set used when no catalog service is configured.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(include_str!("default_blueprints.json"))
    }
}

#[async_trait]
impl BlueprintCatalog for StaticBlueprintCatalog {
    async fn get(&self, id: &BlueprintId) -> Result<Option<Blueprint>, CatalogError> {
        Ok(self.blueprints.get(id).cloned())
    }

    async fn all(&self) -> Result<BTreeMap<BlueprintId, Blueprint>, CatalogError> {
        Ok(self.blueprints.clone())
    }
}

/// Catalog served over HTTP at `{base_url}/blueprints`.
#[derive(Debug, Clone)]
pub struct HttpBlueprintCatalog {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBlueprintCatalog {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn unavailable(e: reqwest::Error) -> CatalogError {
        CatalogError::Unavailable(e.to_string())
    }
}

#[async_trait]
impl BlueprintCatalog for HttpBlueprintCatalog {
    async fn get(&self, id: &BlueprintId) -> Result<Option<Blueprint>, CatalogError> {
        Ok(self.all().await?.remove(id))
    }

    async fn all(&self) -> Result<BTreeMap<BlueprintId, Blueprint>, CatalogError> {
        let url = format!("{}/blueprints", self.base_url);
        debug!(%url, "fetching blueprint catalog");
        let body = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::unavailable)?
            .error_for_status()
            .map_err(Self::unavailable)?
            .text()
            .await
            .map_err(Self::unavailable)?;
        decode_catalog(&body)
    }

    async fn get_many(
        &self,
        ids: &[BlueprintId],
    ) -> Result<BTreeMap<BlueprintId, Blueprint>, CatalogError> {
        let mut all = self.all().await?;
        all.retain(|id, _| ids.contains(id));
        Ok(all)
    }
}
