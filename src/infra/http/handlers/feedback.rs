use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::feedback::SubmitFeedbackCommand;
use crate::application::pagination::PageRequest;
use crate::infra::http::error::ApiError;
use crate::infra::http::models::{ApiJson, ApiQuery, FeedbackBody, FeedbackListQuery, success};
use crate::infra::http::state::AppState;

pub async fn submit_feedback(
    State(state): State<AppState>,
    ApiJson(command): ApiJson<SubmitFeedbackCommand>,
) -> Result<impl IntoResponse, ApiError> {
    let feedback = state.feedback.submit(command).await?;
    Ok((StatusCode::CREATED, success(FeedbackBody { feedback })))
}

pub async fn list_feedback(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<FeedbackListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .feedback
        .list(query.client_id, PageRequest::new(query.page, query.page_size))
        .await?;
    Ok(success(page))
}
