use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, routing::get, Router};

use crate::app::routes::common::call;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/reorders", get(reorder_suggestions))
        .route("/valuation", get(valuation))
}

/// Reorder suggestions, most urgent first.
pub async fn reorder_suggestions(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    call(&services, StatusCode::OK, |engine| engine.reorder().suggest_reorders()).await
}

pub async fn valuation(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    call(&services, StatusCode::OK, |engine| {
        let valuation = engine.reorder().valuation()?;
        Ok(serde_json::json!({
            "total_cost_value": valuation.total_cost_value,
            "total_retail_value": valuation.total_retail_value,
            "potential_margin": valuation.potential_margin(),
            "item_count": valuation.item_count,
            "total_units": valuation.total_units,
        }))
    })
    .await
}
