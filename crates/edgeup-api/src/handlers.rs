use axum::{extract::State, http::StatusCode};
use std::sync::Arc;
use tracing::error;

use crate::AppState;

pub async fn root() -> &'static str {
    "Hello world!"
}

/// Regenerate and return the base64 subscription
pub async fn subscription(
    State(state): State<Arc<AppState>>,
) -> Result<String, (StatusCode, String)> {
    state.pipeline.refresh_subscription().await.map_err(|e| {
        error!("Subscription refresh failed: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })
}
