//! Postgres-backed record store.

mod sql;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    migrate::MigrateError,
    postgres::{PgPool, PgPoolOptions},
    query, query_scalar,
};
use tracing::debug;
use uuid::Uuid;

use crate::application::query::RecordQuery;
use crate::application::repos::{RecordStore, RepoError, patch_fields};
use crate::domain::collections::Collection;

#[derive(Clone)]
pub struct PostgresRecordStore {
    pool: Arc<PgPool>,
}

impl PostgresRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
        sqlx::migrate!("./migrations").run(pool).await
    }

    fn convert_count(value: i64) -> Result<u64, RepoError> {
        value
            .try_into()
            .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
    }
}

#[async_trait]
impl RecordStore for PostgresRecordStore {
    async fn fetch_page(
        &self,
        query: &RecordQuery,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Value>, RepoError> {
        let mut qb = sql::select_page(query, offset, limit);
        debug!(target = "marketdesk::db", sql = qb.sql(), "fetch page");
        qb.build_query_scalar::<Value>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn count(&self, query: &RecordQuery) -> Result<u64, RepoError> {
        let mut qb = sql::select_count(query);
        let count = qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Self::convert_count(count)
    }

    async fn insert(
        &self,
        collection: Collection,
        record: Value,
    ) -> Result<Option<Value>, RepoError> {
        if !record.is_object() {
            return Err(RepoError::invalid_input("record must be a JSON object"));
        }
        let statement = sql::insert_row(collection);
        query_scalar::<_, Value>(&statement)
            .bind(record)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn update(
        &self,
        collection: Collection,
        id: Uuid,
        patch: Value,
    ) -> Result<Value, RepoError> {
        patch_fields(collection, &patch)?;
        let statement = sql::update_row(collection);
        query_scalar::<_, Value>(&statement)
            .bind(id)
            .bind(patch)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> Result<bool, RepoError> {
        let statement = sql::delete_row(collection);
        let result = query(&statement)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        query("SELECT 1")
            .execute(self.pool())
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }
}
