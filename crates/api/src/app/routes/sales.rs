use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::post,
    Json, Router,
};

use stockhold_core::OrderId;

use crate::app::routes::common::call;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/:order_id/sales", post(process_order))
}

/// POST /orders/:order_id/sales
///
/// All lines commit together or not at all. Lines carrying a
/// `reservation_id` convert that hold into the sale.
pub async fn process_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(order_id): Path<String>,
    Json(body): Json<dto::OrderRequest>,
) -> axum::response::Response {
    if order_id.trim().is_empty() {
        return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "order id cannot be empty");
    }
    let order_id = OrderId::new(order_id);
    let requests = body
        .lines
        .into_iter()
        .map(|line| line.into_sale(order_id.clone()))
        .collect();

    call(&services, StatusCode::CREATED, move |engine| engine.sales().process_order(requests)).await
}
