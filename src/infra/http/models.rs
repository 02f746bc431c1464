use axum::Json;
use axum::extract::{FromRequest, FromRequestParts};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::application::competitors::CompetitorInput;
use crate::domain::entities::{ClientRecord, FeedbackRecord, SavedIdeaRecord, StoredBlob};
use crate::domain::items::NormalizedItem;

use super::error::ApiError;

/// JSON body extractor whose rejections render as [`ApiError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// `{ "success": true, ... }` with the body's fields inlined.
#[derive(Debug, Serialize)]
pub struct Success<T> {
    success: bool,
    #[serde(flatten)]
    body: T,
}

pub fn success<T: Serialize>(body: T) -> Json<Success<T>> {
    Json(Success {
        success: true,
        body,
    })
}

#[derive(Debug, Deserialize)]
pub struct ClientListQuery {
    pub industry: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CompetitorListQuery {
    pub platform: Option<String>,
    pub tag: Option<String>,
    #[serde(default)]
    pub include_self: bool,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SavedIdeaListQuery {
    pub client_id: Option<Uuid>,
    pub tag: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackListQuery {
    pub client_id: Option<Uuid>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    #[serde(default)]
    pub filename: String,
}

#[derive(Debug, Deserialize)]
pub struct CacheClearQuery {
    pub key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ImageSearchRequest {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct FacebookImagesRequest {
    #[serde(default)]
    pub page_url: String,
}

#[derive(Debug, Deserialize)]
pub struct NewsRequest {
    #[serde(default)]
    pub topic: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CompetitorBatch {
    Wrapped { competitors: Vec<CompetitorInput> },
    Bare(Vec<CompetitorInput>),
}

impl CompetitorBatch {
    pub fn into_inner(self) -> Vec<CompetitorInput> {
        match self {
            CompetitorBatch::Wrapped { competitors } => competitors,
            CompetitorBatch::Bare(competitors) => competitors,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ClientBody {
    pub client: ClientRecord,
}

#[derive(Debug, Serialize)]
pub struct SavedIdeaBody {
    pub idea: SavedIdeaRecord,
}

#[derive(Debug, Serialize)]
pub struct FeedbackBody {
    pub feedback: FeedbackRecord,
}

#[derive(Debug, Serialize)]
pub struct ItemsBody {
    pub count: usize,
    pub items: Vec<NormalizedItem>,
}

impl From<Vec<NormalizedItem>> for ItemsBody {
    fn from(items: Vec<NormalizedItem>) -> Self {
        Self {
            count: items.len(),
            items,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MockupBody {
    pub mockup: Value,
}

#[derive(Debug, Serialize)]
pub struct FileBody {
    pub file: StoredBlob,
}

#[derive(Debug, Serialize)]
pub struct DeletedBody {
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CacheClearBody {
    pub removed: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
}
