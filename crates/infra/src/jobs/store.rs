//! Job storage implementations.

use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use spacedock_core::{AccountId, ExpectedVersion, JobId, Versioned};
use spacedock_inventory::BuildJob;

use crate::store::StoreError;

/// Position in the due-job order: `(finish_at, id)`.
pub type DueCursor = (DateTime<Utc>, JobId);

/// Job store abstraction.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Enqueue a new job.
    async fn enqueue(&self, job: BuildJob) -> Result<BuildJob, StoreError>;

    async fn get(&self, id: JobId) -> Result<Option<BuildJob>, StoreError>;

    async fn update(&self, job: BuildJob, expected: ExpectedVersion) -> Result<BuildJob, StoreError>;

    /// Unfinished jobs with `finish_at <= now`, earliest first.
    ///
    /// `after` is an exclusive `(finish_at, id)` cursor; pass the last job of
    /// the previous page to continue past jobs that are still pending.
    async fn due(
        &self,
        now: DateTime<Utc>,
        after: Option<DueCursor>,
        limit: usize,
    ) -> Result<Vec<BuildJob>, StoreError>;

    /// Jobs of one account (or all), oldest first.
    async fn list(&self, account: Option<AccountId>) -> Result<Vec<BuildJob>, StoreError>;
}

#[async_trait]
impl<S> JobStore for Arc<S>
where
    S: JobStore + ?Sized,
{
    async fn enqueue(&self, job: BuildJob) -> Result<BuildJob, StoreError> {
        (**self).enqueue(job).await
    }

    async fn get(&self, id: JobId) -> Result<Option<BuildJob>, StoreError> {
        (**self).get(id).await
    }

    async fn update(&self, job: BuildJob, expected: ExpectedVersion) -> Result<BuildJob, StoreError> {
        (**self).update(job, expected).await
    }

    async fn due(
        &self,
        now: DateTime<Utc>,
        after: Option<DueCursor>,
        limit: usize,
    ) -> Result<Vec<BuildJob>, StoreError> {
        (**self).due(now, after, limit).await
    }

    async fn list(&self, account: Option<AccountId>) -> Result<Vec<BuildJob>, StoreError> {
        (**self).list(account).await
    }
}

#[derive(Debug, Default)]
struct Jobs {
    by_id: HashMap<JobId, BuildJob>,
    /// Unfinished jobs ordered by completion time.
    pending: BTreeSet<(DateTime<Utc>, JobId)>,
}

/// In-memory job store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    inner: RwLock<Jobs>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Storage("job store lock poisoned".to_string())
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn enqueue(&self, mut job: BuildJob) -> Result<BuildJob, StoreError> {
        let mut jobs = self.inner.write().map_err(poisoned)?;
        if jobs.by_id.contains_key(&job.id) {
            return Err(StoreError::Conflict {
                id: job.id.to_string(),
                expected: ExpectedVersion::Absent,
                actual: jobs.by_id.get(&job.id).map(Versioned::version),
            });
        }
        job.set_version(1);
        if !job.finished {
            jobs.pending.insert((job.finish_at, job.id));
        }
        jobs.by_id.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get(&self, id: JobId) -> Result<Option<BuildJob>, StoreError> {
        let jobs = self.inner.read().map_err(poisoned)?;
        Ok(jobs.by_id.get(&id).cloned())
    }

    async fn update(&self, mut job: BuildJob, expected: ExpectedVersion) -> Result<BuildJob, StoreError> {
        let mut guard = self.inner.write().map_err(poisoned)?;
        let jobs = &mut *guard;
        let current = jobs
            .by_id
            .get(&job.id)
            .ok_or_else(|| StoreError::NotFound(format!("job {}", job.id)))?;
        let actual = Some(current.version);
        if !expected.matches(actual) {
            return Err(StoreError::Conflict {
                id: job.id.to_string(),
                expected,
                actual,
            });
        }
        jobs.pending.remove(&(current.finish_at, current.id));
        job.set_version(current.version + 1);
        if !job.finished {
            jobs.pending.insert((job.finish_at, job.id));
        }
        jobs.by_id.insert(job.id, job.clone());
        Ok(job)
    }

    async fn due(
        &self,
        now: DateTime<Utc>,
        after: Option<DueCursor>,
        limit: usize,
    ) -> Result<Vec<BuildJob>, StoreError> {
        let jobs = self.inner.read().map_err(poisoned)?;
        let start = after.map_or(Bound::Unbounded, Bound::Excluded);
        Ok(jobs
            .pending
            .range((start, Bound::Unbounded))
            .take_while(|(finish_at, _)| *finish_at <= now)
            .take(limit)
            .filter_map(|(_, id)| jobs.by_id.get(id).cloned())
            .collect())
    }

    async fn list(&self, account: Option<AccountId>) -> Result<Vec<BuildJob>, StoreError> {
        let jobs = self.inner.read().map_err(poisoned)?;
        let mut result: Vec<BuildJob> = jobs
            .by_id
            .values()
            .filter(|j| account.is_none_or(|a| j.account == a))
            .cloned()
            .collect();
        result.sort_by_key(|j| (j.created_at, j.id));
        Ok(result)
    }
}
