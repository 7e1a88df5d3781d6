use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;

use spacedock_core::JobId;
use spacedock_infra::Services;
use spacedock_inventory::JobRequest;

use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_jobs).post(submit_job))
        .route("/:id", get(get_job).delete(cancel_job))
}

pub async fn list_jobs(
    Extension(services): Extension<Services>,
    Extension(caller): Extension<PrincipalContext>,
    Query(query): Query<dto::ListQuery>,
) -> axum::response::Response {
    match services.jobs.list(caller.principal(), query.all).await {
        Ok(jobs) => (StatusCode::OK, Json(jobs)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

/// Validate the job and consume its inputs; outputs arrive on a later tick.
pub async fn submit_job(
    Extension(services): Extension<Services>,
    Extension(caller): Extension<PrincipalContext>,
    Json(body): Json<JobRequest>,
) -> axum::response::Response {
    match services.jobs.submit(caller.principal(), body, Utc::now()).await {
        Ok(job) => (StatusCode::CREATED, Json(job)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

pub async fn get_job(
    Extension(services): Extension<Services>,
    Extension(caller): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: JobId = match errors::parse_id(&id, "job") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.jobs.get(caller.principal(), id).await {
        Ok(job) => (StatusCode::OK, Json(job)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

pub async fn cancel_job(
    Extension(services): Extension<Services>,
    Extension(caller): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: JobId = match errors::parse_id(&id, "job") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.jobs.cancel(caller.principal(), id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}
