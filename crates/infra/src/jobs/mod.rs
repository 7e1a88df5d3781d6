//! Timed production jobs.
//!
//! - `JobStore`: persistence for queued and finished jobs
//! - `JobScheduler`: submission (inputs consumed up front) and completion
//! - `spawn_ticker`: drives completion on a fixed period

pub mod scheduler;
pub mod store;
pub mod ticker;

pub use scheduler::{JobScheduler, TickReport};
pub use store::{DueCursor, InMemoryJobStore, JobStore};
pub use ticker::{TickerHandle, TickerStats, spawn_ticker};
