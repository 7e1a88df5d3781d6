use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
};

use spacedock_infra::Services;

use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(caller): Extension<PrincipalContext>) -> impl IntoResponse {
    let principal = caller.principal();
    Json(dto::WhoAmIResponse {
        account: principal.account,
        privileged: principal.privileged,
    })
}

/// Read-only view of the blueprint catalog.
pub async fn blueprints(Extension(services): Extension<Services>) -> axum::response::Response {
    match services.transfers.blueprints().await {
        Ok(all) => (StatusCode::OK, Json(all)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}
