use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use stockhold_core::ItemId;

use crate::app::routes::common::call;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_item).get(list_items))
        .route("/low-stock", get(low_stock_items))
        .route("/:id", get(get_item).patch(update_item))
        .route("/:id/availability", get(get_availability))
        .route("/:id/intake", post(intake))
        .route("/:id/adjust", post(adjust_stock))
        .route("/:id/ledger", get(get_ledger))
        .route("/:id/statistics", get(get_statistics))
        .route("/:id/velocity", get(get_velocity))
}

pub async fn create_item(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateItemRequest>,
) -> axum::response::Response {
    let (new, performed_by) = body.into_parts();
    call(&services, StatusCode::CREATED, move |engine| {
        let item = engine.catalog().create_item(new, &performed_by)?;
        let available = item.current_stock();
        Ok(dto::ItemView::new(item, available))
    })
    .await
}

pub async fn list_items(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    call(&services, StatusCode::OK, |engine| engine.catalog().list_items()).await
}

pub async fn low_stock_items(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    call(&services, StatusCode::OK, |engine| engine.catalog().low_stock_items()).await
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let item_id: ItemId = match errors::parse_id(&id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    call(&services, StatusCode::OK, move |engine| {
        let item = engine.catalog().get_item(item_id)?;
        let level = engine.availability().stock_level(item_id)?;
        Ok(dto::ItemView::new(item, level.available_to_sell))
    })
    .await
}

pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateItemRequest>,
) -> axum::response::Response {
    let item_id: ItemId = match errors::parse_id(&id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    call(&services, StatusCode::OK, move |engine| {
        engine.catalog().update_item(item_id, body)
    })
    .await
}

pub async fn get_availability(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let item_id: ItemId = match errors::parse_id(&id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    call(&services, StatusCode::OK, move |engine| engine.availability().stock_level(item_id)).await
}

pub async fn intake(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::IntakeRequest>,
) -> axum::response::Response {
    let item_id: ItemId = match errors::parse_id(&id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    call(&services, StatusCode::OK, move |engine| {
        engine
            .stock()
            .intake(item_id, body.quantity, &body.performed_by, body.notes)
    })
    .await
}

pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::AdjustStockRequest>,
) -> axum::response::Response {
    let item_id: ItemId = match errors::parse_id(&id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    call(&services, StatusCode::OK, move |engine| {
        engine
            .stock()
            .adjust(item_id, body.delta, &body.performed_by, body.reason)
    })
    .await
}

pub async fn get_ledger(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let item_id: ItemId = match errors::parse_id(&id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    call(&services, StatusCode::OK, move |engine| engine.stock().ledger(item_id)).await
}

/// GET /items/:id/statistics?replay=true
pub async fn get_statistics(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<dto::StatisticsQuery>,
) -> axum::response::Response {
    let item_id: ItemId = match errors::parse_id(&id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    call(&services, StatusCode::OK, move |engine| {
        let sales = engine.sales();
        if query.replay {
            sales.replay_statistics(item_id)
        } else {
            sales.statistics(item_id)
        }
    })
    .await
}

pub async fn get_velocity(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let item_id: ItemId = match errors::parse_id(&id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    call(&services, StatusCode::OK, move |engine| {
        let velocity = engine.reorder().sales_velocity(item_id)?;
        Ok(serde_json::json!({
            "item_id": item_id,
            "units_per_day": velocity,
            "window_days": engine.config().velocity_window_days,
        }))
    })
    .await
}
