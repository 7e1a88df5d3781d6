use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use spacedock_core::ContainerId;
use spacedock_infra::Services;
use spacedock_inventory::BatchRecord;

use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_containers).post(apply_batch))
        .route("/:id", get(get_container))
}

pub async fn list_containers(
    Extension(services): Extension<Services>,
    Extension(caller): Extension<PrincipalContext>,
    Query(query): Query<dto::ListQuery>,
) -> axum::response::Response {
    match services
        .transfers
        .list_containers(caller.principal(), query.all)
        .await
    {
        Ok(containers) => (StatusCode::OK, Json(containers)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

pub async fn get_container(
    Extension(services): Extension<Services>,
    Extension(caller): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ContainerId = match errors::parse_id(&id, "container") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.transfers.get_container(caller.principal(), id).await {
        Ok(container) => (StatusCode::OK, Json(container)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

/// Apply an ordered batch of transfer and lifecycle records atomically.
pub async fn apply_batch(
    Extension(services): Extension<Services>,
    Extension(caller): Extension<PrincipalContext>,
    Json(records): Json<Vec<BatchRecord>>,
) -> axum::response::Response {
    match services
        .transfers
        .apply_batch(&records, caller.principal())
        .await
    {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}
