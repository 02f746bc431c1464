//! Route handlers, one module per resource.

pub mod clients;
pub mod competitors;
pub mod creative;
pub mod feedback;
pub mod ideas;
pub mod uploads;

use axum::extract::State;
use axum::response::IntoResponse;
use tracing::info;

use super::error::ApiError;
use super::models::{ApiQuery, CacheClearBody, CacheClearQuery, HealthBody, success};
use super::state::AppState;

pub async fn health() -> impl IntoResponse {
    success(HealthBody { status: "ok" })
}

pub async fn storage_health(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state.store.health_check().await?;
    Ok(success(HealthBody { status: "ok" }))
}

/// Drop one webhook cache entry, or every cached entry when no key is given.
pub async fn clear_cache(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CacheClearQuery>,
) -> impl IntoResponse {
    let key = query.key.as_deref().filter(|key| !key.trim().is_empty());
    let mut removed = state.webhook_cache.clear(key);
    if key.is_none() {
        removed += state.client_cache.clear(None);
    }
    info!(
        target = "marketdesk::http::cache",
        key = key.unwrap_or("*"),
        removed,
        "cache cleared"
    );
    success(CacheClearBody { removed })
}
