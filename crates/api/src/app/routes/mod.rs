use axum::{Router, routing::get};

pub mod containers;
pub mod facilities;
pub mod inventory;
pub mod jobs;
pub mod ships;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/blueprints", get(system::blueprints))
        .nest("/inventory", inventory::router())
        .nest("/containers", containers::router())
        .nest("/ships", ships::router())
        .nest("/jobs", jobs::router())
        .nest("/facilities", facilities::router())
}
