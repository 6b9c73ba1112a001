use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use stockhold_core::{CartId, ReservationId};

use crate::app::routes::common::call;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(reserve).get(list_active))
        .route("/:id", get(get_reservation).patch(update_quantity).delete(cancel))
}

/// Cart-scoped views: `/carts/:cart_id/reservations`.
pub fn cart_router() -> Router {
    Router::new().route(
        "/:cart_id/reservations",
        get(list_for_cart).delete(cancel_cart),
    )
}

pub async fn reserve(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::ReserveRequest>,
) -> axum::response::Response {
    call(&services, StatusCode::CREATED, move |engine| {
        engine
            .reservations()
            .reserve(body.item_id, body.quantity, body.cart_id)
    })
    .await
}

/// GET /reservations?cart_id=X (ACTIVE holds only)
pub async fn list_active(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ReservationListQuery>,
) -> axum::response::Response {
    call(&services, StatusCode::OK, move |engine| {
        engine.reservations().list_active(query.cart_id.as_ref())
    })
    .await
}

pub async fn get_reservation(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let reservation_id: ReservationId = match errors::parse_id(&id, "reservation") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    call(&services, StatusCode::OK, move |engine| engine.reservations().get(reservation_id)).await
}

pub async fn update_quantity(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateReservationRequest>,
) -> axum::response::Response {
    let reservation_id: ReservationId = match errors::parse_id(&id, "reservation") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    call(&services, StatusCode::OK, move |engine| {
        engine.reservations().update_quantity(reservation_id, body.quantity)
    })
    .await
}

pub async fn cancel(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let reservation_id: ReservationId = match errors::parse_id(&id, "reservation") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    call(&services, StatusCode::OK, move |engine| engine.reservations().cancel(reservation_id)).await
}

pub async fn list_for_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Path(cart_id): Path<String>,
) -> axum::response::Response {
    let cart_id = CartId::new(cart_id);
    call(&services, StatusCode::OK, move |engine| engine.reservations().list_for_cart(&cart_id)).await
}

/// DELETE /carts/:cart_id/reservations releases every ACTIVE hold in the cart.
pub async fn cancel_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Path(cart_id): Path<String>,
) -> axum::response::Response {
    let cart_id = CartId::new(cart_id);
    call(&services, StatusCode::OK, move |engine| engine.reservations().cancel_cart(&cart_id)).await
}
