use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::clients::{ClientFilter, CreateClientCommand, UpdateClientCommand};
use crate::application::pagination::PageRequest;
use crate::infra::http::error::ApiError;
use crate::infra::http::models::{
    ApiJson, ApiPath, ApiQuery, ClientBody, ClientListQuery, DeletedBody, success,
};
use crate::infra::http::state::AppState;

pub async fn list_clients(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ClientListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = ClientFilter {
        industry: query.industry,
    };
    let page = state
        .clients
        .list(&filter, PageRequest::new(query.page, query.page_size))
        .await?;
    Ok(success(page))
}

pub async fn create_client(
    State(state): State<AppState>,
    ApiJson(command): ApiJson<CreateClientCommand>,
) -> Result<impl IntoResponse, ApiError> {
    let client = state.clients.create(command).await?;
    Ok((StatusCode::CREATED, success(ClientBody { client })))
}

pub async fn get_client(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let client = state.clients.get(id).await?;
    Ok(success(ClientBody { client }))
}

pub async fn update_client(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(command): ApiJson<UpdateClientCommand>,
) -> Result<impl IntoResponse, ApiError> {
    let client = state.clients.update(id, command).await?;
    Ok(success(ClientBody { client }))
}

pub async fn delete_client(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.clients.delete(id).await?;
    Ok(success(DeletedBody { id }))
}
