use axum::{routing::get, Router};

pub mod admin;
pub mod common;
pub mod events;
pub mod items;
pub mod reports;
pub mod reservations;
pub mod sales;
pub mod system;
pub mod transfers;

/// Router for all inventory endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/events/stream", get(events::stream))
        .nest("/items", items::router())
        .nest("/reservations", reservations::router())
        .nest("/carts", reservations::cart_router())
        .nest("/orders", sales::router())
        .nest("/transfers", transfers::router())
        .nest("/reports", reports::router())
        .nest("/admin", admin::router())
}
