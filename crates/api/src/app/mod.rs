//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;
use std::time::Duration;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use spacedock_auth::Authenticator;
use spacedock_infra::Services;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// `timeout` bounds every authentication call.
pub fn build_app(
    services: Services,
    authenticator: Arc<dyn Authenticator>,
    timeout: Duration,
) -> Router {
    let auth_state = middleware::AuthState {
        authenticator,
        timeout,
    };

    // Protected routes: require a resolved bearer credential.
    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new().layer(axum::middleware::from_fn(middleware::access_log)))
}
