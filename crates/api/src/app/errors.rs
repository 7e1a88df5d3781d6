use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::error;

use spacedock_core::InventoryError;

/// Map a domain error to its HTTP response.
pub fn inventory_error_to_response(err: InventoryError) -> axum::response::Response {
    let status = match &err {
        InventoryError::Unauthorized => StatusCode::UNAUTHORIZED,
        InventoryError::NotFound(_) | InventoryError::Unsupported(_) => StatusCode::NOT_FOUND,
        InventoryError::InvalidBlueprint(_)
        | InventoryError::InvalidTransfer(_)
        | InventoryError::Unbalanced(_)
        | InventoryError::InsufficientCapacity { .. }
        | InventoryError::InsufficientCargo { .. }
        | InventoryError::ShipNotPresent(_)
        | InventoryError::ShipInSpaceConflict(_)
        | InventoryError::ContainerNotEmpty(_)
        | InventoryError::CapabilityError { .. } => StatusCode::BAD_REQUEST,
        InventoryError::Conflict(_) => StatusCode::CONFLICT,
        InventoryError::DependencyFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
        InventoryError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(error = %err, "request failed");
    }
    json_error(status, err.code(), err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a path id, answering `400 invalid_id` on failure.
pub fn parse_id<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, axum::response::Response> {
    raw.parse().map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("invalid {what} id: {raw}"),
        )
    })
}
