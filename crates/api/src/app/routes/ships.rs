use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use spacedock_core::{InventoryError, ShipId};
use spacedock_infra::Services;
use spacedock_inventory::check_patch;

use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(unpack_ship).get(list_ships))
        .route("/:id", get(get_ship).post(update_ship))
}

/// Unpack a packed ship from a hangar slice.
pub async fn unpack_ship(
    Extension(services): Extension<Services>,
    Extension(caller): Extension<PrincipalContext>,
    Json(body): Json<dto::UnpackShipRequest>,
) -> axum::response::Response {
    match services
        .ships
        .unpack(caller.principal(), body.container, body.slice, body.blueprint)
        .await
    {
        Ok(ship) => (StatusCode::CREATED, Json(ship)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

pub async fn list_ships(
    Extension(services): Extension<Services>,
    Extension(caller): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services.ships.list(caller.principal()).await {
        Ok(ships) => (StatusCode::OK, Json(ships)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

pub async fn get_ship(
    Extension(services): Extension<Services>,
    Extension(caller): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ShipId = match errors::parse_id(&id, "ship") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.ships.get(caller.principal(), id).await {
        Ok(ship) => (StatusCode::OK, Json(ship)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

/// Dock/undock (`in_space`) and/or patch customization fields.
pub async fn update_ship(
    Extension(services): Extension<Services>,
    Extension(caller): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateShipRequest>,
) -> axum::response::Response {
    let id: ShipId = match errors::parse_id(&id, "ship") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let principal = caller.principal();

    let (in_space, container, slice) = (body.in_space, body.container, body.slice.clone());
    let patch = body.into_patch();
    // A rejected patch must not leave the ship half-moved.
    if let Err(e) = check_patch(&patch) {
        return errors::inventory_error_to_response(e);
    }

    let moved = match (in_space, container) {
        (None, _) => None,
        (Some(true), _) => Some(services.ships.undock(principal, id).await),
        (Some(false), Some(container)) => {
            let slice = slice.unwrap_or_default();
            Some(services.ships.dock(principal, id, container, slice).await)
        }
        (Some(false), None) => Some(Err(InventoryError::invalid_transfer(
            "docking requires a target container",
        ))),
    };
    let mut ship = match moved {
        Some(Ok(ship)) => Some(ship),
        Some(Err(e)) => return errors::inventory_error_to_response(e),
        None => None,
    };

    if !patch.is_empty() || ship.is_none() {
        ship = match services.ships.update(principal, id, &patch).await {
            Ok(ship) => Some(ship),
            Err(e) => return errors::inventory_error_to_response(e),
        };
    }

    match ship {
        Some(ship) => (StatusCode::OK, Json(ship)).into_response(),
        None => errors::inventory_error_to_response(InventoryError::not_found(format!("ship {id}"))),
    }
}
