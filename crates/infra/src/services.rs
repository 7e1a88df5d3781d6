//! Wiring of the core services over shared stores and locks.

use std::sync::Arc;
use std::time::Duration;

use spacedock_inventory::{Facility, Ship};

use crate::catalog::BlueprintCatalog;
use crate::facilities::FacilityRegistry;
use crate::jobs::{InMemoryJobStore, JobScheduler, JobStore};
use crate::locks::ContainerLocks;
use crate::ships::ShipRegistry;
use crate::store::{ContainerStore, DocumentStore, InMemoryContainerStore, InMemoryDocumentStore};
use crate::transfer::TransferService;

/// Default bound on blueprint catalog and credential checks.
pub const DEFAULT_DEPENDENCY_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything a request handler or the ticker needs.
#[derive(Clone)]
pub struct Services {
    pub transfers: Arc<TransferService>,
    pub ships: Arc<ShipRegistry>,
    pub facilities: Arc<FacilityRegistry>,
    pub jobs: Arc<JobScheduler>,
}

impl Services {
    pub fn new(
        catalog: Arc<dyn BlueprintCatalog>,
        containers: Arc<dyn ContainerStore>,
        ships: Arc<dyn DocumentStore<Ship>>,
        facilities: Arc<dyn DocumentStore<Facility>>,
        jobs: Arc<dyn JobStore>,
        timeout: Duration,
    ) -> Self {
        let transfers = Arc::new(TransferService::new(
            containers,
            ships,
            catalog,
            Arc::new(ContainerLocks::new()),
            timeout,
        ));
        let facilities = Arc::new(FacilityRegistry::new(facilities, transfers.clone()));
        Self {
            ships: Arc::new(ShipRegistry::new(transfers.clone())),
            jobs: Arc::new(JobScheduler::new(jobs, transfers.clone(), facilities.clone())),
            facilities,
            transfers,
        }
    }

    /// Services over fresh in-memory stores.
    pub fn in_memory(catalog: Arc<dyn BlueprintCatalog>, timeout: Duration) -> Self {
        Self::new(
            catalog,
            InMemoryContainerStore::arc(),
            InMemoryDocumentStore::<Ship>::arc(),
            InMemoryDocumentStore::<Facility>::arc(),
            InMemoryJobStore::arc(),
            timeout,
        )
    }
}
