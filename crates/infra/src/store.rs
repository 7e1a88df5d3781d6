//! Keyed document persistence.
//!
//! Every store speaks in whole documents guarded by [`ExpectedVersion`]; the
//! store bumps the version on each committed write. The in-memory
//! implementations back tests and single-node deployments.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use spacedock_core::{
    AccountId, ContainerId, Entity, ExpectedVersion, InventoryError, Owned, Versioned,
};
use spacedock_inventory::Container;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("version conflict on {id}: expected {expected:?}, actual {actual:?}")]
    Conflict {
        id: String,
        expected: ExpectedVersion,
        actual: Option<u64>,
    },
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for InventoryError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(what) => InventoryError::not_found(what),
            e @ StoreError::Conflict { .. } => InventoryError::conflict(e.to_string()),
            StoreError::Storage(msg) => InventoryError::storage(msg),
        }
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Storage("store lock poisoned".to_string())
}

/// Container persistence.
#[async_trait]
pub trait ContainerStore: Send + Sync {
    /// Fetch a container, tombstoned ones included.
    async fn get(&self, id: ContainerId) -> Result<Option<Container>, StoreError>;

    async fn insert(&self, container: Container) -> Result<Container, StoreError>;

    async fn update(
        &self,
        container: Container,
        expected: ExpectedVersion,
    ) -> Result<Container, StoreError>;

    /// Tombstone a container.
    async fn destroy(&self, id: ContainerId, expected: ExpectedVersion) -> Result<(), StoreError>;

    /// Live containers, optionally restricted to one account.
    async fn list(&self, account: Option<AccountId>) -> Result<Vec<Container>, StoreError>;

    /// Write several containers atomically: every expectation is checked
    /// before anything is written.
    async fn commit(
        &self,
        writes: Vec<(Container, ExpectedVersion)>,
    ) -> Result<Vec<Container>, StoreError>;
}

#[async_trait]
impl<S> ContainerStore for Arc<S>
where
    S: ContainerStore + ?Sized,
{
    async fn get(&self, id: ContainerId) -> Result<Option<Container>, StoreError> {
        (**self).get(id).await
    }

    async fn insert(&self, container: Container) -> Result<Container, StoreError> {
        (**self).insert(container).await
    }

    async fn update(
        &self,
        container: Container,
        expected: ExpectedVersion,
    ) -> Result<Container, StoreError> {
        (**self).update(container, expected).await
    }

    async fn destroy(&self, id: ContainerId, expected: ExpectedVersion) -> Result<(), StoreError> {
        (**self).destroy(id, expected).await
    }

    async fn list(&self, account: Option<AccountId>) -> Result<Vec<Container>, StoreError> {
        (**self).list(account).await
    }

    async fn commit(
        &self,
        writes: Vec<(Container, ExpectedVersion)>,
    ) -> Result<Vec<Container>, StoreError> {
        (**self).commit(writes).await
    }
}

/// Generic store for owned, versioned documents (ships, facilities).
#[async_trait]
pub trait DocumentStore<D>: Send + Sync
where
    D: Entity + Send + Sync + 'static,
    D::Id: Send + Sync,
{
    async fn get(&self, id: D::Id) -> Result<Option<D>, StoreError>;

    async fn put(&self, doc: D, expected: ExpectedVersion) -> Result<D, StoreError>;

    /// All-or-nothing variant of [`DocumentStore::put`].
    async fn put_all(&self, docs: Vec<(D, ExpectedVersion)>) -> Result<Vec<D>, StoreError>;

    async fn list(&self, account: Option<AccountId>) -> Result<Vec<D>, StoreError>;
}

#[async_trait]
impl<D, S> DocumentStore<D> for Arc<S>
where
    D: Entity + Send + Sync + 'static,
    D::Id: Send + Sync,
    S: DocumentStore<D> + ?Sized,
{
    async fn get(&self, id: D::Id) -> Result<Option<D>, StoreError> {
        (**self).get(id).await
    }

    async fn put(&self, doc: D, expected: ExpectedVersion) -> Result<D, StoreError> {
        (**self).put(doc, expected).await
    }

    async fn put_all(&self, docs: Vec<(D, ExpectedVersion)>) -> Result<Vec<D>, StoreError> {
        (**self).put_all(docs).await
    }

    async fn list(&self, account: Option<AccountId>) -> Result<Vec<D>, StoreError> {
        (**self).list(account).await
    }
}

/// In-memory document map shared by the in-memory stores.
#[derive(Debug)]
pub struct InMemoryDocumentStore<D: Entity> {
    inner: RwLock<HashMap<D::Id, D>>,
}

impl<D: Entity> InMemoryDocumentStore<D> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl<D: Entity> Default for InMemoryDocumentStore<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> InMemoryDocumentStore<D>
where
    D: Entity + Versioned + Clone,
{
    fn read(&self, id: D::Id) -> Result<Option<D>, StoreError> {
        Ok(self.inner.read().map_err(poisoned)?.get(&id).cloned())
    }

    fn write_all(&self, docs: Vec<(D, ExpectedVersion)>) -> Result<Vec<D>, StoreError> {
        let mut map = self.inner.write().map_err(poisoned)?;
        for (doc, expected) in &docs {
            let actual = map.get(&doc.id()).map(Versioned::version);
            if !expected.matches(actual) {
                return Err(StoreError::Conflict {
                    id: doc.id().to_string(),
                    expected: *expected,
                    actual,
                });
            }
        }
        let mut written = Vec::with_capacity(docs.len());
        for (mut doc, _) in docs {
            let next = map.get(&doc.id()).map_or(1, |d| d.version() + 1);
            doc.set_version(next);
            map.insert(doc.id(), doc.clone());
            written.push(doc);
        }
        Ok(written)
    }

    fn scan(&self, keep: impl Fn(&D) -> bool) -> Result<Vec<D>, StoreError> {
        let map = self.inner.read().map_err(poisoned)?;
        let mut docs: Vec<D> = map.values().filter(|d| keep(d)).cloned().collect();
        docs.sort_by_key(|d| d.id());
        Ok(docs)
    }
}

#[async_trait]
impl<D> DocumentStore<D> for InMemoryDocumentStore<D>
where
    D: Entity + Owned + Versioned + Clone + Send + Sync + 'static,
    D::Id: Send + Sync,
{
    async fn get(&self, id: D::Id) -> Result<Option<D>, StoreError> {
        self.read(id)
    }

    async fn put(&self, doc: D, expected: ExpectedVersion) -> Result<D, StoreError> {
        let mut written = self.write_all(vec![(doc, expected)])?;
        written
            .pop()
            .ok_or_else(|| StoreError::Storage("empty write".to_string()))
    }

    async fn put_all(&self, docs: Vec<(D, ExpectedVersion)>) -> Result<Vec<D>, StoreError> {
        self.write_all(docs)
    }

    async fn list(&self, account: Option<AccountId>) -> Result<Vec<D>, StoreError> {
        self.scan(|d| account.is_none_or(|a| d.is_owned_by(a)))
    }
}

/// In-memory container store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryContainerStore {
    docs: InMemoryDocumentStore<Container>,
}

impl InMemoryContainerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl ContainerStore for InMemoryContainerStore {
    async fn get(&self, id: ContainerId) -> Result<Option<Container>, StoreError> {
        self.docs.read(id)
    }

    async fn insert(&self, container: Container) -> Result<Container, StoreError> {
        self.update(container, ExpectedVersion::Absent).await
    }

    async fn update(
        &self,
        container: Container,
        expected: ExpectedVersion,
    ) -> Result<Container, StoreError> {
        let mut written = self.docs.write_all(vec![(container, expected)])?;
        written
            .pop()
            .ok_or_else(|| StoreError::Storage("empty write".to_string()))
    }

    async fn destroy(&self, id: ContainerId, expected: ExpectedVersion) -> Result<(), StoreError> {
        let mut container = self
            .docs
            .read(id)?
            .filter(|c| !c.tombstoned)
            .ok_or_else(|| StoreError::NotFound(format!("container {id}")))?;
        container.tombstoned = true;
        self.docs.write_all(vec![(container, expected)])?;
        Ok(())
    }

    async fn list(&self, account: Option<AccountId>) -> Result<Vec<Container>, StoreError> {
        self.docs
            .scan(|c| !c.tombstoned && account.is_none_or(|a| c.is_owned_by(a)))
    }

    async fn commit(
        &self,
        writes: Vec<(Container, ExpectedVersion)>,
    ) -> Result<Vec<Container>, StoreError> {
        self.docs.write_all(writes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spacedock_inventory::{Blueprint, BlueprintKind};

    fn container(account: AccountId) -> Container {
        let bp = Blueprint::new("hull", BlueprintKind::Structure).with_capacity(10, 0);
        Container::from_blueprint(ContainerId::new(), account, &bp)
    }

    #[tokio::test]
    async fn insert_bumps_version_and_rejects_duplicates() {
        let store = InMemoryContainerStore::new();
        let c = container(AccountId::new());

        let stored = store.insert(c.clone()).await.unwrap();
        assert_eq!(stored.version, 1);
        assert!(matches!(
            store.insert(c).await,
            Err(StoreError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn stale_update_is_a_conflict() {
        let store = InMemoryContainerStore::new();
        let stored = store.insert(container(AccountId::new())).await.unwrap();

        let fresh = store
            .update(stored.clone(), ExpectedVersion::Exact(1))
            .await
            .unwrap();
        assert_eq!(fresh.version, 2);

        let err = store
            .update(stored, ExpectedVersion::Exact(1))
            .await
            .unwrap_err();
        assert!(matches!(InventoryError::from(err), InventoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn commit_is_all_or_nothing() {
        let store = InMemoryContainerStore::new();
        let a = store.insert(container(AccountId::new())).await.unwrap();
        let b = container(AccountId::new());

        let mut a_changed = a.clone();
        a_changed.capacity.cargo = 99;
        let result = store
            .commit(vec![
                (a_changed, ExpectedVersion::Exact(1)),
                (b.clone(), ExpectedVersion::Exact(7)),
            ])
            .await;
        assert!(result.is_err());
        assert_eq!(store.get(a.id).await.unwrap(), Some(a));
        assert_eq!(store.get(b.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn destroyed_containers_are_hidden_from_listings() {
        let store = InMemoryContainerStore::new();
        let owner = AccountId::new();
        let a = store.insert(container(owner)).await.unwrap();
        let b = store.insert(container(owner)).await.unwrap();
        store.insert(container(AccountId::new())).await.unwrap();

        store.destroy(a.id, ExpectedVersion::Any).await.unwrap();

        let listed = store.list(Some(owner)).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, b.id);
        assert_eq!(store.list(None).await.unwrap().len(), 2);
        assert!(store.get(a.id).await.unwrap().unwrap().tombstoned);
        assert!(store.destroy(a.id, ExpectedVersion::Any).await.is_err());
    }
}
