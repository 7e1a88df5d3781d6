use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use spacedock_core::FacilityId;
use spacedock_infra::Services;

use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_facilities).post(register_facility))
        .route("/:id", get(get_facility))
}

pub async fn list_facilities(
    Extension(services): Extension<Services>,
    Extension(caller): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services.facilities.list(caller.principal()).await {
        Ok(facilities) => (StatusCode::OK, Json(facilities)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

pub async fn register_facility(
    Extension(services): Extension<Services>,
    Extension(caller): Extension<PrincipalContext>,
    Json(body): Json<dto::RegisterFacilityRequest>,
) -> axum::response::Response {
    match services
        .facilities
        .register(caller.principal(), body.id, body.blueprint)
        .await
    {
        Ok(facility) => (StatusCode::CREATED, Json(facility)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

pub async fn get_facility(
    Extension(services): Extension<Services>,
    Extension(caller): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: FacilityId = match errors::parse_id(&id, "facility") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.facilities.get(caller.principal(), id).await {
        Ok(facility) => (StatusCode::OK, Json(facility)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}
