//! Operator endpoints for the expiry sweeper.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::app::routes::common::call;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/sweep", post(sweep_now))
        .route("/sweeper", get(sweeper_status))
        .route("/sweeper/trigger", post(trigger_sweeper))
}

/// POST /admin/sweep runs one sweep inline and returns its report.
pub async fn sweep_now(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    call(&services, StatusCode::OK, |engine| engine.sweeper().sweep()).await
}

/// POST /admin/sweeper/trigger asks the background runner to sweep soon.
pub async fn trigger_sweeper(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    if services.trigger_sweeper() {
        StatusCode::ACCEPTED.into_response()
    } else {
        crate::app::errors::json_error(
            StatusCode::CONFLICT,
            "sweeper_not_running",
            "background sweeper is not running",
        )
    }
}

pub async fn sweeper_status(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let config = services.engine().config();
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "running": services.sweeper_stats().is_some(),
            "interval_secs": config.sweep_interval.as_secs(),
            "reservation_ttl_secs": config.reservation_ttl.as_secs(),
            "stats": services.sweeper_stats(),
        })),
    )
        .into_response()
}
