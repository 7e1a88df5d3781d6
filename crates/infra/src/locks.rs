//! Per-container mutual exclusion.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use spacedock_core::ContainerId;

/// Hands out one async mutex per container id.
///
/// Callers that need several containers lock them through
/// [`ContainerLocks::lock_all`], which always acquires in ascending id order.
#[derive(Debug, Default)]
pub struct ContainerLocks {
    slots: Mutex<HashMap<ContainerId, Arc<AsyncMutex<()>>>>,
}

/// Held container locks; released on drop.
#[derive(Debug)]
pub struct ContainerGuard {
    ids: Vec<ContainerId>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl ContainerGuard {
    pub fn ids(&self) -> &[ContainerId] {
        &self.ids
    }

    pub fn covers(&self, id: ContainerId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }
}

impl ContainerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: ContainerId) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        // Drop idle entries so the map tracks only contended/held ids.
        slots.retain(|_, m| Arc::strong_count(m) > 1);
        slots.entry(id).or_default().clone()
    }

    pub async fn lock_all(&self, ids: impl IntoIterator<Item = ContainerId>) -> ContainerGuard {
        let mut ids: Vec<ContainerId> = ids.into_iter().collect();
        ids.sort();
        ids.dedup();
        let mut guards = Vec::with_capacity(ids.len());
        for id in &ids {
            guards.push(self.slot(*id).lock_owned().await);
        }
        ContainerGuard {
            ids,
            _guards: guards,
        }
    }

    pub async fn lock(&self, id: ContainerId) -> ContainerGuard {
        self.lock_all([id]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn overlapping_sets_serialize() {
        let locks = Arc::new(ContainerLocks::new());
        let (a, b) = (ContainerId::new(), ContainerId::new());

        let held = locks.lock_all([b, a]).await;
        assert!(held.ids().windows(2).all(|w| w[0] < w[1]));

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.lock(a).await.ids().to_vec() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(held);
        let ids = tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ids, vec![a]);
    }

    #[tokio::test]
    async fn disjoint_sets_do_not_block() {
        let locks = ContainerLocks::new();
        let _a = locks.lock(ContainerId::new()).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock(ContainerId::new())).await;
        assert!(b.is_ok());
    }
}
