//! Job scheduling and completion.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use spacedock_auth::Principal;
use spacedock_core::{ContainerId, ExpectedVersion, InventoryError, InventoryResult, JobId};
use spacedock_inventory::{BuildJob, JobAction, JobRecipe, JobRequest, referenced_blueprints};

use super::store::JobStore;
use crate::facilities::FacilityRegistry;
use crate::transfer::TransferService;

/// Due jobs fetched per store page.
const TICK_BATCH: usize = 256;

/// Outcome of one scheduler tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub completed: Vec<JobId>,
    /// Due jobs whose outputs could not be delivered yet.
    pub blocked: Vec<JobId>,
}

/// Queues jobs and resolves them when due.
///
/// Inputs are taken at submission; outputs (or the facility upgrade) are
/// delivered by [`JobScheduler::tick`] under the same container locks the
/// transfer engine uses.
pub struct JobScheduler {
    jobs: Arc<dyn JobStore>,
    transfers: Arc<TransferService>,
    facilities: Arc<FacilityRegistry>,
}

impl JobScheduler {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        transfers: Arc<TransferService>,
        facilities: Arc<FacilityRegistry>,
    ) -> Self {
        Self {
            jobs,
            transfers,
            facilities,
        }
    }

    /// Validate a job, consume its inputs and queue it.
    pub async fn submit(
        &self,
        principal: Principal,
        request: JobRequest,
        now: DateTime<Utc>,
    ) -> InventoryResult<BuildJob> {
        let quantity = request.effective_quantity()?;
        let facility = self.facilities.get(principal, request.facility).await?;
        principal.ensure_owns(&facility)?;

        let ids = [facility.blueprint.clone(), request.target.clone()];
        let blueprints = self.transfers.resolve(&ids).await?;
        let facility_bp = blueprints
            .get(&facility.blueprint)
            .ok_or_else(|| InventoryError::InvalidBlueprint(facility.blueprint.clone()))?;
        let target_bp = blueprints
            .get(&request.target)
            .ok_or_else(|| InventoryError::InvalidBlueprint(request.target.clone()))?;

        facility.check_capability(facility_bp, request.action, &request.target)?;
        let recipe = JobRecipe::resolve(request.action, target_bp, quantity)?;
        let job = BuildJob::new(JobId::new(), principal.account, &request, quantity, &recipe, now)?;

        // The source inventory must belong to the caller even when the
        // recipe consumes nothing.
        let inventory = self.transfers.get_container(principal, job.inventory).await?;
        principal.ensure_owns(&inventory)?;
        self.transfers
            .apply_batch(&job.consumption(&recipe), Principal::service(principal.account))
            .await?;

        let job = self.jobs.enqueue(job).await.inspect_err(|e| {
            error!(error = %e, "job inputs consumed but the job could not be queued");
        })?;
        info!(
            job_id = %job.id,
            facility_id = %job.facility,
            action = %job.action,
            target = %job.target,
            quantity = job.quantity,
            finish_at = %job.finish_at,
            "job submitted"
        );
        Ok(job)
    }

    /// Complete every job due at `now`.
    ///
    /// A job is marked finished in the same critical section that produces
    /// its outputs, so repeated ticks never produce twice. Jobs whose outputs
    /// do not fit stay queued and are retried on the next tick.
    pub async fn tick(&self, now: DateTime<Utc>) -> InventoryResult<TickReport> {
        let mut report = TickReport::default();
        let mut cursor = None;
        loop {
            let page = self.jobs.due(now, cursor, TICK_BATCH).await?;
            for job in &page {
                match self.complete(job.id, now).await {
                    Ok(true) => report.completed.push(job.id),
                    Ok(false) => {}
                    Err(e) if e.is_service_error() => return Err(e),
                    Err(e) => {
                        warn!(job_id = %job.id, error = %e, "job completion blocked, will retry");
                        report.blocked.push(job.id);
                    }
                }
            }
            // Blocked jobs stay pending, so the next page starts past them.
            match page.last() {
                Some(last) if page.len() == TICK_BATCH => cursor = Some((last.finish_at, last.id)),
                _ => break,
            }
        }
        if !report.completed.is_empty() || !report.blocked.is_empty() {
            debug!(
                completed = report.completed.len(),
                blocked = report.blocked.len(),
                "scheduler tick"
            );
        }
        Ok(report)
    }

    /// Returns false if another tick already finished the job.
    async fn complete(&self, id: JobId, now: DateTime<Utc>) -> InventoryResult<bool> {
        let Some(job) = self.jobs.get(id).await? else {
            return Ok(false);
        };
        let production = job.production();
        let blueprints = self.transfers.resolve(&referenced_blueprints(&production)).await?;

        let guard = self
            .transfers
            .locks
            .lock_all([job.inventory, ContainerId::from(job.facility)])
            .await;

        // Re-read under the lock.
        let Some(mut job) = self.jobs.get(id).await? else {
            return Ok(false);
        };
        if !job.is_due(now) {
            return Ok(false);
        }

        match job.action {
            JobAction::Construct => {
                self.facilities.upgrade(job.facility, &job.target, &guard).await?;
            }
            JobAction::Manufacture | JobAction::Refine => {
                self.transfers
                    .apply_locked(&production, Principal::service(job.account), &blueprints, &guard)
                    .await?;
            }
        }

        let expected = ExpectedVersion::Exact(job.version);
        job.finished = true;
        let job = self.jobs.update(job, expected).await?;
        info!(job_id = %job.id, action = %job.action, target = %job.target, "job completed");
        Ok(true)
    }

    /// Jobs cannot be cancelled once submitted.
    pub async fn cancel(&self, _principal: Principal, _id: JobId) -> InventoryResult<()> {
        Err(InventoryError::unsupported("job cancellation is not supported"))
    }

    pub async fn get(&self, principal: Principal, id: JobId) -> InventoryResult<BuildJob> {
        let job = self
            .jobs
            .get(id)
            .await?
            .ok_or_else(|| InventoryError::not_found(format!("job {id}")))?;
        if !principal.can_view(&job) {
            return Err(InventoryError::Unauthorized);
        }
        Ok(job)
    }

    pub async fn list(&self, principal: Principal, all: bool) -> InventoryResult<Vec<BuildJob>> {
        let filter = match (all, principal.privileged) {
            (true, true) => None,
            (true, false) => return Err(InventoryError::Unauthorized),
            (false, _) => Some(principal.account),
        };
        Ok(self.jobs.list(filter).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::Duration as ChronoDuration;
    use spacedock_core::{AccountId, BlueprintId, FacilityId, SliceId};
    use spacedock_inventory::{BatchRecord, Facility, Ship, TransferRecord};

    use crate::catalog::StaticBlueprintCatalog;
    use crate::jobs::InMemoryJobStore;
    use crate::locks::ContainerLocks;
    use crate::store::{InMemoryContainerStore, InMemoryDocumentStore};

    struct Fixture {
        scheduler: JobScheduler,
        transfers: Arc<TransferService>,
        facilities: Arc<FacilityRegistry>,
        me: Principal,
    }

    fn fixture() -> Fixture {
        let transfers = Arc::new(TransferService::new(
            InMemoryContainerStore::arc(),
            InMemoryDocumentStore::<Ship>::arc(),
            Arc::new(StaticBlueprintCatalog::builtin().unwrap()),
            Arc::new(ContainerLocks::new()),
            Duration::from_secs(1),
        ));
        let facilities = Arc::new(FacilityRegistry::new(
            InMemoryDocumentStore::<Facility>::arc(),
            transfers.clone(),
        ));
        Fixture {
            scheduler: JobScheduler::new(InMemoryJobStore::arc(), transfers.clone(), facilities.clone()),
            transfers,
            facilities,
            me: Principal::player(AccountId::new()),
        }
    }

    impl Fixture {
        async fn container(&self, id: ContainerId, blueprint: &str) {
            self.transfers
                .create_container(
                    Principal::service(AccountId::new()),
                    id,
                    self.me.account,
                    BlueprintId::new(blueprint),
                )
                .await
                .unwrap();
        }

        async fn grant(&self, at: ContainerId, blueprint: &str, n: i64) {
            let record = BatchRecord::Transfer(TransferRecord::stock(at, SliceId::default(), blueprint, n));
            self.transfers
                .apply_batch(&[record], Principal::service(self.me.account))
                .await
                .unwrap();
        }

        async fn stock(&self, at: ContainerId, blueprint: &str) -> i64 {
            self.transfers
                .get_container(self.me, at)
                .await
                .unwrap()
                .cargo_quantity(&SliceId::default(), &BlueprintId::new(blueprint))
        }

        fn request(&self, facility: FacilityId, action: JobAction, target: &str, q: i64, inventory: ContainerId) -> JobRequest {
            JobRequest {
                facility,
                action,
                target: BlueprintId::new(target),
                quantity: q,
                inventory,
                slice: SliceId::default(),
            }
        }
    }

    #[tokio::test]
    async fn refine_consumes_at_submit_and_produces_once() {
        let f = fixture();
        let store = ContainerId::new();
        f.container(store, "factory").await;
        f.grant(store, "ore", 3).await;
        let facility = f
            .facilities
            .register(f.me, None, BlueprintId::new("factory"))
            .await
            .unwrap();

        let now = Utc::now();
        let job = f
            .scheduler
            .submit(f.me, f.request(facility.id, JobAction::Refine, "ore", 3, store), now)
            .await
            .unwrap();
        assert_eq!(job.finish_at, now + ChronoDuration::seconds(15));
        assert_eq!(f.stock(store, "ore").await, 0);

        let early = f.scheduler.tick(now + ChronoDuration::seconds(14)).await.unwrap();
        assert!(early.completed.is_empty());
        assert_eq!(f.stock(store, "metal").await, 0);

        let done = f.scheduler.tick(now + ChronoDuration::seconds(15)).await.unwrap();
        assert_eq!(done.completed, vec![job.id]);
        assert_eq!(f.stock(store, "metal").await, 3);
        assert_eq!(f.stock(store, "rock").await, 6);

        let again = f.scheduler.tick(now + ChronoDuration::seconds(60)).await.unwrap();
        assert_eq!(again, TickReport::default());
        assert_eq!(f.stock(store, "metal").await, 3);
        assert!(f.scheduler.get(f.me, job.id).await.unwrap().finished);
    }

    #[tokio::test]
    async fn submit_rejects_without_inputs_or_capability() {
        let f = fixture();
        let store = ContainerId::new();
        f.container(store, "factory").await;
        f.grant(store, "ore", 1).await;
        let facility = f
            .facilities
            .register(f.me, None, BlueprintId::new("factory"))
            .await
            .unwrap();
        let now = Utc::now();

        let short = f
            .scheduler
            .submit(f.me, f.request(facility.id, JobAction::Refine, "ore", 2, store), now)
            .await;
        assert!(matches!(short, Err(InventoryError::InsufficientCargo { .. })));
        assert_eq!(f.stock(store, "ore").await, 1);

        let incapable = f
            .scheduler
            .submit(f.me, f.request(facility.id, JobAction::Manufacture, "stuff", 1, store), now)
            .await;
        assert!(matches!(incapable, Err(InventoryError::CapabilityError { .. })));

        let stranger = Principal::player(AccountId::new());
        let foreign = f
            .scheduler
            .submit(stranger, f.request(facility.id, JobAction::Refine, "ore", 1, store), now)
            .await;
        assert_eq!(foreign.unwrap_err(), InventoryError::Unauthorized);
        assert!(f.scheduler.list(f.me, false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn construct_upgrades_the_facility() {
        let f = fixture();
        let id = FacilityId::new();
        let site = ContainerId::from(id);
        f.container(site, "basicScaffold").await;
        f.grant(site, "metal", 2).await;
        f.facilities
            .register(f.me, Some(id), BlueprintId::new("basicScaffold"))
            .await
            .unwrap();

        let now = Utc::now();
        // Construct ignores the requested quantity.
        let job = f
            .scheduler
            .submit(f.me, f.request(id, JobAction::Construct, "factory", 5, site), now)
            .await
            .unwrap();
        assert_eq!(job.quantity, 1);
        assert_eq!(f.stock(site, "metal").await, 0);

        let report = f.scheduler.tick(now + ChronoDuration::seconds(300)).await.unwrap();
        assert_eq!(report.completed, vec![job.id]);
        let facility = f.facilities.get(f.me, id).await.unwrap();
        assert_eq!(facility.blueprint, BlueprintId::new("factory"));
        let container = f.transfers.get_container(f.me, site).await.unwrap();
        assert_eq!(container.capacity.cargo, 500);
    }

    #[tokio::test]
    async fn outputs_that_do_not_fit_stay_queued() {
        let f = fixture();
        let store = ContainerId::new();
        f.container(store, "basicScaffold").await;
        f.grant(store, "ore", 20).await;
        let facility = f
            .facilities
            .register(f.me, None, BlueprintId::new("factory"))
            .await
            .unwrap();

        let now = Utc::now();
        let job = f
            .scheduler
            .submit(f.me, f.request(facility.id, JobAction::Refine, "ore", 20, store), now)
            .await
            .unwrap();

        // 20 metal + 40 rock exceed the scaffold's 50 units.
        let later = now + ChronoDuration::seconds(100);
        let report = f.scheduler.tick(later).await.unwrap();
        assert_eq!(report.blocked, vec![job.id]);
        assert!(!f.scheduler.get(f.me, job.id).await.unwrap().finished);

        let retry = f.scheduler.tick(later).await.unwrap();
        assert_eq!(retry.blocked, vec![job.id]);
        assert_eq!(f.stock(store, "metal").await, 0);
    }

    #[tokio::test]
    async fn blocked_jobs_do_not_starve_later_ones() {
        let f = fixture();
        let full = ContainerId::new();
        f.container(full, "factory").await;
        let blocked = TICK_BATCH + 1;
        f.grant(full, "ore", blocked as i64).await;
        let facility = f
            .facilities
            .register(f.me, None, BlueprintId::new("factory"))
            .await
            .unwrap();

        let now = Utc::now();
        for _ in 0..blocked {
            f.scheduler
                .submit(f.me, f.request(facility.id, JobAction::Refine, "ore", 1, full), now)
                .await
                .unwrap();
        }
        f.grant(full, "metal", 500).await;

        let spare = ContainerId::new();
        f.container(spare, "factory").await;
        f.grant(spare, "ore", 1).await;
        let ready = f
            .scheduler
            .submit(
                f.me,
                f.request(facility.id, JobAction::Refine, "ore", 1, spare),
                now + ChronoDuration::seconds(1),
            )
            .await
            .unwrap();

        let report = f.scheduler.tick(now + ChronoDuration::seconds(60)).await.unwrap();
        assert_eq!(report.completed, vec![ready.id]);
        assert_eq!(report.blocked.len(), blocked);
        assert_eq!(f.stock(spare, "metal").await, 1);
        assert_eq!(f.stock(full, "rock").await, 0);
    }

    #[tokio::test]
    async fn cancellation_is_unsupported() {
        let f = fixture();
        let err = f.scheduler.cancel(f.me, JobId::new()).await.unwrap_err();
        assert!(matches!(err, InventoryError::Unsupported(_)));
    }
}
