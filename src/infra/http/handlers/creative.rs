use axum::extract::State;
use axum::response::IntoResponse;

use crate::application::creative::MockupCommand;
use crate::infra::http::error::ApiError;
use crate::infra::http::models::{
    ApiJson, FacebookImagesRequest, GenerateRequest, ImageSearchRequest, ItemsBody, MockupBody,
    NewsRequest, success,
};
use crate::infra::http::state::AppState;

pub async fn search_images(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ImageSearchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let items = state.creative.search_images(&request.query).await?;
    Ok(success(ItemsBody::from(items)))
}

pub async fn facebook_images(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<FacebookImagesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let items = state.creative.facebook_images(&request.page_url).await?;
    Ok(success(ItemsBody::from(items)))
}

pub async fn news(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NewsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let items = state.creative.news(&request.topic).await?;
    Ok(success(ItemsBody::from(items)))
}

pub async fn post_mockup(
    State(state): State<AppState>,
    ApiJson(command): ApiJson<MockupCommand>,
) -> Result<impl IntoResponse, ApiError> {
    let mockup = state.creative.post_mockup(command).await?;
    Ok(success(MockupBody { mockup }))
}

pub async fn generate(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<GenerateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let generated = state
        .creative
        .generate(&request.prompt, request.json)
        .await?;
    Ok(success(generated))
}
