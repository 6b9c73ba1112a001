use std::sync::Arc;

use axum::extract::Extension;
use axum::response::IntoResponse;

use crate::app::services::{self, AppServices};

/// GET /events/stream: server-sent committed engine events.
pub async fn stream(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    services::sse_stream(&services)
}
