//! Privileged container lifecycle, used by the world-state service.

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};

use spacedock_core::ContainerId;
use spacedock_infra::Services;

use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/:id", post(create_container).delete(destroy_container))
}

pub async fn create_container(
    Extension(services): Extension<Services>,
    Extension(caller): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CreateContainerRequest>,
) -> axum::response::Response {
    let id: ContainerId = match errors::parse_id(&id, "container") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .transfers
        .create_container(caller.principal(), id, body.account, body.blueprint)
        .await
    {
        Ok(container) => (StatusCode::CREATED, Json(container)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

pub async fn destroy_container(
    Extension(services): Extension<Services>,
    Extension(caller): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ContainerId = match errors::parse_id(&id, "container") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.transfers.destroy_container(caller.principal(), id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}
