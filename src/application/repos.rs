//! Storage traits describing persistence adapters.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use crate::application::query::RecordQuery;
use crate::domain::collections::Collection;
use crate::domain::entities::StoredBlob;
use crate::domain::error::DomainError;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

impl From<DomainError> for RepoError {
    fn from(error: DomainError) -> Self {
        RepoError::InvalidInput {
            message: error.to_string(),
        }
    }
}

/// Filterable, paginatable record store. Rows travel as JSON objects.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Rows matching `query`, skipping `offset` and returning at most `limit`.
    async fn fetch_page(
        &self,
        query: &RecordQuery,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Value>, RepoError>;

    /// Number of rows matching `query`'s predicates; sort is ignored.
    async fn count(&self, query: &RecordQuery) -> Result<u64, RepoError>;

    /// Insert a full row. Returns `None` when the collection's dedup key already exists.
    async fn insert(&self, collection: Collection, record: Value)
    -> Result<Option<Value>, RepoError>;

    /// Merge `patch` into the row with `id`; absent keys keep their stored values.
    async fn update(
        &self,
        collection: Collection,
        id: Uuid,
        patch: Value,
    ) -> Result<Value, RepoError>;

    async fn delete(&self, collection: Collection, id: Uuid) -> Result<bool, RepoError>;

    async fn health_check(&self) -> Result<(), RepoError>;

    async fn find_by(&self, query: &RecordQuery) -> Result<Option<Value>, RepoError> {
        Ok(self.fetch_page(query, 0, 1).await?.into_iter().next())
    }
}

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error("uploaded file is empty")]
    EmptyPayload,
    #[error("uploaded file exceeds {limit} bytes")]
    TooLarge { limit: u64 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Binary object store issuing public URLs for uploaded blobs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, original_name: &str, data: Bytes) -> Result<StoredBlob, BlobError>;

    async fn read(&self, path: &str) -> Result<Bytes, BlobError>;

    fn public_url(&self, path: &str) -> String;
}

/// Serialize a typed record into the JSON row shape stores accept.
pub fn encode_row<T: Serialize>(record: &T) -> Result<Value, RepoError> {
    serde_json::to_value(record).map_err(RepoError::from_persistence)
}

/// Deserialize a stored JSON row into its typed record.
pub fn decode_row<T: DeserializeOwned>(row: Value) -> Result<T, RepoError> {
    serde_json::from_value(row).map_err(RepoError::from_persistence)
}

/// RFC 3339 rendering matching how record timestamps serialize.
pub fn timestamp_value(at: OffsetDateTime) -> Result<Value, RepoError> {
    at.format(&Rfc3339)
        .map(Value::String)
        .map_err(RepoError::from_persistence)
}

/// Validate an update patch: a JSON object whose keys are known, non-key columns.
pub fn patch_fields(
    collection: Collection,
    patch: &Value,
) -> Result<&serde_json::Map<String, Value>, RepoError> {
    let fields = patch
        .as_object()
        .ok_or_else(|| RepoError::invalid_input("update patch must be a JSON object"))?;
    for key in fields.keys() {
        if key == "id" {
            return Err(RepoError::invalid_input("`id` cannot be updated"));
        }
        collection.column(key)?;
    }
    Ok(fields)
}
