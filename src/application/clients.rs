use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::application::error::ServiceError;
use crate::application::input::{optional, required};
use crate::application::pagination::{Page, PageRequest, QueryComposer};
use crate::application::query::RecordQuery;
use crate::application::repos::{
    RecordStore, RepoError, decode_row, encode_row, timestamp_value,
};
use crate::cache::TtlCache;
use crate::domain::collections::Collection;
use crate::domain::entities::ClientRecord;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateClientCommand {
    pub name: String,
    pub industry: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial update; absent fields keep their stored values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateClientCommand {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ClientFilter {
    pub industry: Option<String>,
}

#[derive(Clone)]
pub struct ClientService {
    store: Arc<dyn RecordStore>,
    composer: QueryComposer,
    cache: Arc<TtlCache<ClientRecord>>,
    cache_ttl: Duration,
}

impl ClientService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        cache: Arc<TtlCache<ClientRecord>>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            composer: QueryComposer::new(store.clone()),
            store,
            cache,
            cache_ttl,
        }
    }

    pub async fn list(
        &self,
        filter: &ClientFilter,
        page: PageRequest,
    ) -> Result<Page<ClientRecord>, ServiceError> {
        let mut query = RecordQuery::new(Collection::Clients).sort_by("name", false)?;
        if let Some(industry) = optional(filter.industry.clone()) {
            query = query.eq("industry", industry)?;
        }
        Ok(self.composer.fetch_typed(&query, page).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<ClientRecord, ServiceError> {
        let key = id.to_string();
        if let Some(client) = self.cache.get(&key) {
            return Ok(client);
        }

        let query = RecordQuery::new(Collection::Clients).eq("id", id)?;
        let row = self
            .store
            .find_by(&query)
            .await?
            .ok_or(ServiceError::not_found("client"))?;
        let client: ClientRecord = decode_row(row)?;

        if !self.cache_ttl.is_zero() {
            self.cache.set(key, client.clone(), self.cache_ttl);
        }
        Ok(client)
    }

    pub async fn create(&self, command: CreateClientCommand) -> Result<ClientRecord, ServiceError> {
        let now = OffsetDateTime::now_utc();
        let record = ClientRecord {
            id: Uuid::new_v4(),
            name: required(&command.name, "name")?,
            industry: required(&command.industry, "industry")?,
            website: optional(command.website),
            description: optional(command.description),
            created_at: now,
            updated_at: now,
        };

        let row = self
            .store
            .insert(Collection::Clients, encode_row(&record)?)
            .await?
            .ok_or_else(|| RepoError::Duplicate {
                constraint: "clients_pkey".to_string(),
            })?;
        let created: ClientRecord = decode_row(row)?;

        info!(
            target = "marketdesk::clients",
            client_id = %created.id,
            name = %created.name,
            "client created"
        );
        Ok(created)
    }

    pub async fn update(
        &self,
        id: Uuid,
        command: UpdateClientCommand,
    ) -> Result<ClientRecord, ServiceError> {
        let mut patch = Map::new();
        if let Some(name) = command.name {
            patch.insert("name".into(), json!(required(&name, "name")?));
        }
        if let Some(industry) = command.industry {
            patch.insert("industry".into(), json!(required(&industry, "industry")?));
        }
        if let Some(website) = command.website {
            patch.insert("website".into(), json!(optional(Some(website))));
        }
        if let Some(description) = command.description {
            patch.insert("description".into(), json!(optional(Some(description))));
        }
        patch.insert(
            "updated_at".into(),
            timestamp_value(OffsetDateTime::now_utc())?,
        );

        let row = self
            .store
            .update(Collection::Clients, id, Value::Object(patch))
            .await
            .map_err(not_found_as("client"))?;
        self.cache.clear(Some(&id.to_string()));

        let updated: ClientRecord = decode_row(row)?;
        info!(
            target = "marketdesk::clients",
            client_id = %updated.id,
            "client updated"
        );
        Ok(updated)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let removed = self.store.delete(Collection::Clients, id).await?;
        self.cache.clear(Some(&id.to_string()));
        if !removed {
            return Err(ServiceError::not_found("client"));
        }
        info!(
            target = "marketdesk::clients",
            client_id = %id,
            "client deleted"
        );
        Ok(())
    }
}

/// Map a store-level `NotFound` to the entity the caller asked for.
pub(crate) fn not_found_as(entity: &'static str) -> impl Fn(RepoError) -> ServiceError {
    move |err| match err {
        RepoError::NotFound => ServiceError::not_found(entity),
        other => ServiceError::Repo(other),
    }
}
