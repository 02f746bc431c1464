use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::competitors::CompetitorFilter;
use crate::application::pagination::PageRequest;
use crate::infra::http::error::ApiError;
use crate::infra::http::models::{
    ApiJson, ApiPath, ApiQuery, CompetitorBatch, CompetitorListQuery, success,
};
use crate::infra::http::state::AppState;

pub async fn list_competitors(
    State(state): State<AppState>,
    ApiPath(client_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<CompetitorListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = CompetitorFilter {
        platform: query.platform,
        tag: query.tag,
        include_self: query.include_self,
    };
    let page = state
        .competitors
        .list(
            client_id,
            &filter,
            PageRequest::new(query.page, query.page_size),
        )
        .await?;
    Ok(success(page))
}

pub async fn save_competitors(
    State(state): State<AppState>,
    ApiPath(client_id): ApiPath<Uuid>,
    ApiJson(batch): ApiJson<CompetitorBatch>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state
        .competitors
        .save_bulk(client_id, batch.into_inner())
        .await?;
    Ok((StatusCode::CREATED, success(report)))
}
