use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::{Value as JsonValue, json};

use stockhold_core::DomainError;
use stockhold_infra::{EngineError, StoreError};
use stockhold_inventory::InventoryError;

pub fn engine_error_to_response(err: EngineError) -> axum::response::Response {
    match err {
        EngineError::Inventory(e) => inventory_error_to_response(e),
        EngineError::Store(StoreError::Concurrency(msg)) => {
            json_error(StatusCode::CONFLICT, "concurrent_modification", msg)
        }
        EngineError::Store(e) => {
            tracing::error!(error = %e, "inventory store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_unavailable", e.to_string())
        }
        e @ EngineError::SweepFailed { .. } => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "sweep_failed", e.to_string())
        }
    }
}

fn inventory_error_to_response(err: InventoryError) -> axum::response::Response {
    let code = err.code();
    let message = err.to_string();

    let status = match &err {
        InventoryError::ItemNotFound { .. }
        | InventoryError::ReservationNotFound { .. }
        | InventoryError::TransferNotFound { .. } => StatusCode::NOT_FOUND,
        InventoryError::ReservationNotActive { .. }
        | InventoryError::InsufficientStock { .. }
        | InventoryError::InvalidTransferTransition { .. }
        | InventoryError::DuplicateItem { .. } => StatusCode::CONFLICT,
        InventoryError::InvalidQuantity { .. }
        | InventoryError::ReservationItemMismatch { .. }
        | InventoryError::Domain(DomainError::Validation(_))
        | InventoryError::Domain(DomainError::InvalidId(_)) => StatusCode::BAD_REQUEST,
        InventoryError::Domain(DomainError::InvariantViolation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
    };

    let context = match &err {
        InventoryError::InsufficientStock {
            item_id,
            requested,
            available,
        } => json!({ "item_id": item_id, "requested": requested, "available": available }),
        InventoryError::ReservationNotActive {
            reservation_id,
            status,
        } => json!({ "reservation_id": reservation_id, "status": status }),
        InventoryError::InvalidQuantity { quantity } => json!({ "quantity": quantity }),
        _ => JsonValue::Null,
    };

    json_error_with(status, code, message, context)
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    json_error_with(status, code, message, JsonValue::Null)
}

/// Error body with extra context fields merged in next to `error`/`message`.
pub fn json_error_with(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    context: JsonValue,
) -> axum::response::Response {
    let mut body = json!({
        "error": code,
        "message": message.into(),
    });
    if let (Some(body), JsonValue::Object(extra)) = (body.as_object_mut(), context) {
        body.extend(extra);
    }
    (status, axum::Json(body)).into_response()
}

pub fn parse_id<T: std::str::FromStr>(raw: &str, what: &'static str) -> Result<T, axum::response::Response> {
    raw.parse::<T>().map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("invalid {what} id: {raw}"),
        )
    })
}
