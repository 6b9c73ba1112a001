use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use stockhold_core::TransferId;

use crate::app::routes::common::call;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_transfer).get(list_transfers))
        .route("/:id", get(get_transfer))
        .route("/:id/dispatch", post(dispatch_transfer))
        .route("/:id/complete", post(complete_transfer))
        .route("/:id/cancel", post(cancel_transfer))
}

pub async fn create_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateTransferRequest>,
) -> axum::response::Response {
    call(&services, StatusCode::CREATED, move |engine| {
        engine.stock().create_transfer(body.into())
    })
    .await
}

pub async fn list_transfers(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    call(&services, StatusCode::OK, |engine| engine.stock().list_transfers()).await
}

pub async fn get_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let transfer_id: TransferId = match errors::parse_id(&id, "transfer") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    call(&services, StatusCode::OK, move |engine| engine.stock().get_transfer(transfer_id)).await
}

pub async fn dispatch_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let transfer_id: TransferId = match errors::parse_id(&id, "transfer") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    call(&services, StatusCode::OK, move |engine| engine.stock().dispatch_transfer(transfer_id)).await
}

/// POST /transfers/:id/complete deducts the units from the item.
pub async fn complete_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Option<Json<dto::CompleteTransferRequest>>,
) -> axum::response::Response {
    let transfer_id: TransferId = match errors::parse_id(&id, "transfer") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let performed_by = body
        .map(|Json(b)| b.performed_by)
        .unwrap_or_else(dto::default_actor);

    call(&services, StatusCode::OK, move |engine| {
        engine.stock().complete_transfer(transfer_id, &performed_by)
    })
    .await
}

pub async fn cancel_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Option<Json<dto::CancelTransferRequest>>,
) -> axum::response::Response {
    let transfer_id: TransferId = match errors::parse_id(&id, "transfer") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let reason = body.and_then(|Json(b)| b.reason);

    call(&services, StatusCode::OK, move |engine| {
        engine.stock().cancel_transfer(transfer_id, reason)
    })
    .await
}
