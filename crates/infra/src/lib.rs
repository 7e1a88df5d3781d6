//! Runtime layer: stores, blueprint catalog, locking and the services
//! built on the inventory engine.

pub mod catalog;
pub mod deadline;
pub mod facilities;
pub mod jobs;
pub mod locks;
pub mod services;
pub mod ships;
pub mod store;
pub mod transfer;

pub use catalog::{BlueprintCatalog, CatalogError, HttpBlueprintCatalog, StaticBlueprintCatalog};
pub use facilities::FacilityRegistry;
pub use jobs::{JobScheduler, TickReport, TickerHandle, spawn_ticker};
pub use locks::ContainerLocks;
pub use services::{DEFAULT_DEPENDENCY_TIMEOUT, Services};
pub use ships::ShipRegistry;
pub use store::{ContainerStore, DocumentStore, StoreError};
pub use transfer::TransferService;
