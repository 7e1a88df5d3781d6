//! Background driver for [`JobScheduler::tick`].

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::scheduler::JobScheduler;

/// Ticker runtime statistics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct TickerStats {
    pub ticks: u64,
    pub jobs_completed: u64,
    pub jobs_blocked: u64,
    pub tick_errors: u64,
}

/// Handle to control a running ticker.
#[derive(Debug)]
pub struct TickerHandle {
    shutdown: oneshot::Sender<()>,
    join: JoinHandle<()>,
    stats: Arc<Mutex<TickerStats>>,
}

impl TickerHandle {
    /// Stop ticking and wait for the in-flight tick to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.join.await {
            error!(error = %e, "job ticker task failed");
        }
    }

    pub fn stats(&self) -> TickerStats {
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Spawn a task that ticks the scheduler every `period`.
pub fn spawn_ticker(scheduler: Arc<JobScheduler>, period: Duration) -> TickerHandle {
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
    let stats = Arc::new(Mutex::new(TickerStats::default()));
    let task_stats = stats.clone();

    let join = tokio::spawn(async move {
        info!(period_ms = period.as_millis() as u64, "job ticker started");
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                _ = interval.tick() => {}
            }

            let result = scheduler.tick(Utc::now()).await;
            let mut s = task_stats.lock().unwrap_or_else(|e| e.into_inner());
            s.ticks += 1;
            match result {
                Ok(report) => {
                    s.jobs_completed += report.completed.len() as u64;
                    s.jobs_blocked += report.blocked.len() as u64;
                }
                Err(e) => {
                    s.tick_errors += 1;
                    error!(error = %e, "job tick failed");
                }
            }
        }
        debug!("job ticker stopped");
    });

    TickerHandle {
        shutdown: shutdown_tx,
        join,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use spacedock_auth::Principal;
    use spacedock_core::{AccountId, BlueprintId, ContainerId, SliceId};
    use spacedock_inventory::{BatchRecord, Facility, JobAction, JobRequest, Ship, TransferRecord};

    use crate::catalog::StaticBlueprintCatalog;
    use crate::facilities::FacilityRegistry;
    use crate::jobs::InMemoryJobStore;
    use crate::locks::ContainerLocks;
    use crate::store::{InMemoryContainerStore, InMemoryDocumentStore};
    use crate::transfer::TransferService;

    #[tokio::test]
    async fn ticker_completes_due_jobs_and_stops() {
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
        let scheduler = Arc::new(JobScheduler::new(
            InMemoryJobStore::arc(),
            transfers.clone(),
            facilities.clone(),
        ));

        let me = Principal::player(AccountId::new());
        let store = ContainerId::new();
        transfers
            .create_container(Principal::service(me.account), store, me.account, BlueprintId::new("factory"))
            .await
            .unwrap();
        let grant = TransferRecord::stock(store, SliceId::default(), "ore", 1);
        transfers
            .apply_batch(&[BatchRecord::Transfer(grant)], Principal::service(me.account))
            .await
            .unwrap();
        let facility = facilities.register(me, None, BlueprintId::new("factory")).await.unwrap();

        // Submitted in the past so it is already due.
        let job = scheduler
            .submit(
                me,
                JobRequest {
                    facility: facility.id,
                    action: JobAction::Refine,
                    target: BlueprintId::new("ore"),
                    quantity: 1,
                    inventory: store,
                    slice: SliceId::default(),
                },
                Utc::now() - chrono::Duration::seconds(60),
            )
            .await
            .unwrap();

        let handle = spawn_ticker(scheduler.clone(), Duration::from_millis(10));
        for _ in 0..100 {
            if handle.stats().jobs_completed > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(handle.stats().jobs_completed, 1);
        assert!(scheduler.get(me, job.id).await.unwrap().finished);
        handle.shutdown().await;
    }
}
