use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use stockhold_infra::{EngineResult, InventoryEngine};

use crate::app::errors;
use crate::app::services::AppServices;

/// Run an engine operation off the async workers and map its result to a
/// JSON response (`status` on success, the error mapping otherwise).
pub async fn call<T, F>(services: &Arc<AppServices>, status: StatusCode, f: F) -> Response
where
    T: Serialize + Send + 'static,
    F: FnOnce(&InventoryEngine) -> EngineResult<T> + Send + 'static,
{
    match services.run(f).await {
        Ok(Ok(value)) => (status, Json(value)).into_response(),
        Ok(Err(e)) => errors::engine_error_to_response(e),
        Err(resp) => resp,
    }
}
