use axum::body::Bytes;
use axum::extract::State;
use axum::extract::rejection::BytesRejection;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;

use crate::infra::http::error::ApiError;
use crate::infra::http::models::{ApiPath, ApiQuery, FileBody, UploadQuery, success};
use crate::infra::http::state::AppState;

pub async fn upload(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UploadQuery>,
    body: Result<Bytes, BytesRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let data = body?;
    let file = state.uploads.upload(&query.filename, data).await?;
    Ok((StatusCode::CREATED, success(FileBody { file })))
}

pub async fn serve_file(
    State(state): State<AppState>,
    ApiPath(path): ApiPath<String>,
) -> Result<impl IntoResponse, ApiError> {
    let data = state.uploads.read(&path).await?;
    let content_type = mime_guess::from_path(&path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
        ],
        data,
    ))
}
