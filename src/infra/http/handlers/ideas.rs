use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::ideas::{
    GenerateIdeasCommand, SaveIdeaCommand, SavedIdeaFilter, UpdateIdeaCommand,
};
use crate::application::pagination::PageRequest;
use crate::infra::http::error::ApiError;
use crate::infra::http::models::{
    ApiJson, ApiPath, ApiQuery, DeletedBody, SavedIdeaBody, SavedIdeaListQuery, success,
};
use crate::infra::http::state::AppState;

pub async fn generate_ideas(
    State(state): State<AppState>,
    ApiJson(command): ApiJson<GenerateIdeasCommand>,
) -> Result<impl IntoResponse, ApiError> {
    let generation = state.ideas.generate(command).await?;
    Ok(success(generation))
}

pub async fn list_saved(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SavedIdeaListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = SavedIdeaFilter {
        client_id: query.client_id,
        tag: query.tag,
    };
    let page = state
        .ideas
        .list_saved(&filter, PageRequest::new(query.page, query.page_size))
        .await?;
    Ok(success(page))
}

pub async fn save_idea(
    State(state): State<AppState>,
    ApiJson(command): ApiJson<SaveIdeaCommand>,
) -> Result<impl IntoResponse, ApiError> {
    let idea = state.ideas.save(command).await?;
    Ok((StatusCode::CREATED, success(SavedIdeaBody { idea })))
}

pub async fn update_saved(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(command): ApiJson<UpdateIdeaCommand>,
) -> Result<impl IntoResponse, ApiError> {
    let idea = state.ideas.update_saved(id, command).await?;
    Ok(success(SavedIdeaBody { idea }))
}

pub async fn delete_saved(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.ideas.delete_saved(id).await?;
    Ok(success(DeletedBody { id }))
}

pub async fn share_saved(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let idea = state.ideas.share(id).await?;
    Ok(success(SavedIdeaBody { idea }))
}

pub async fn shared_idea(
    State(state): State<AppState>,
    ApiPath(token): ApiPath<String>,
) -> Result<impl IntoResponse, ApiError> {
    let idea = state.ideas.shared(&token).await?;
    Ok(success(SavedIdeaBody { idea }))
}
