use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::clients::ClientService;
use crate::application::error::ServiceError;
use crate::application::input::{optional, required, tags};
use crate::application::pagination::{Page, PageRequest, QueryComposer};
use crate::application::query::RecordQuery;
use crate::application::repos::{RecordStore, decode_row, encode_row};
use crate::domain::collections::Collection;
use crate::domain::entities::CompetitorRecord;

#[derive(Debug, Clone, Deserialize)]
pub struct CompetitorInput {
    pub name: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CompetitorFilter {
    pub platform: Option<String>,
    pub tag: Option<String>,
    /// Include rows named like the client itself; off by default.
    pub include_self: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkSaveReport {
    pub saved: Vec<CompetitorRecord>,
    /// Names that already existed for the client, or repeated within the batch.
    pub skipped: Vec<String>,
}

#[derive(Clone)]
pub struct CompetitorService {
    store: Arc<dyn RecordStore>,
    composer: QueryComposer,
    clients: Arc<ClientService>,
}

impl CompetitorService {
    pub fn new(store: Arc<dyn RecordStore>, clients: Arc<ClientService>) -> Self {
        Self {
            composer: QueryComposer::new(store.clone()),
            store,
            clients,
        }
    }

    pub async fn list(
        &self,
        client_id: Uuid,
        filter: &CompetitorFilter,
        page: PageRequest,
    ) -> Result<Page<CompetitorRecord>, ServiceError> {
        let client = self.clients.get(client_id).await?;

        let mut query = RecordQuery::new(Collection::Competitors)
            .eq("client_id", client_id)?
            .sort_by("name", false)?;
        if let Some(platform) = optional(filter.platform.clone()) {
            query = query.eq("platform", platform)?;
        }
        if let Some(tag) = optional(filter.tag.clone()) {
            query = query.contains("tags", [tag])?;
        }
        if !filter.include_self {
            query = query.excluding("name", &client.name)?;
        }

        Ok(self.composer.fetch_typed(&query, page).await?)
    }

    /// Save a batch of competitors, skipping names already stored for the client.
    pub async fn save_bulk(
        &self,
        client_id: Uuid,
        inputs: Vec<CompetitorInput>,
    ) -> Result<BulkSaveReport, ServiceError> {
        if inputs.is_empty() {
            return Err(ServiceError::validation("at least one competitor is required"));
        }
        self.clients.get(client_id).await?;

        let mut seen = HashSet::new();
        let mut report = BulkSaveReport {
            saved: Vec::new(),
            skipped: Vec::new(),
        };

        for input in inputs {
            let name = required(&input.name, "name")?;
            if !seen.insert(name.clone()) {
                report.skipped.push(name);
                continue;
            }

            let record = CompetitorRecord {
                id: Uuid::new_v4(),
                client_id,
                name,
                website: optional(input.website),
                platform: optional(input.platform),
                tags: tags(input.tags),
                notes: optional(input.notes),
                created_at: OffsetDateTime::now_utc(),
            };

            match self
                .store
                .insert(Collection::Competitors, encode_row(&record)?)
                .await?
            {
                Some(row) => report.saved.push(decode_row(row)?),
                None => {
                    debug!(
                        target = "marketdesk::competitors",
                        client_id = %client_id,
                        name = %record.name,
                        "competitor already stored"
                    );
                    report.skipped.push(record.name);
                }
            }
        }

        info!(
            target = "marketdesk::competitors",
            client_id = %client_id,
            saved = report.saved.len(),
            skipped = report.skipped.len(),
            "competitors saved"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::application::clients::CreateClientCommand;
    use crate::cache::TtlCache;
    use crate::infra::memory::InMemoryRecordStore;

    async fn setup() -> (CompetitorService, Uuid) {
        let store: Arc<dyn RecordStore> = Arc::new(InMemoryRecordStore::new());
        let clients = Arc::new(ClientService::new(
            store.clone(),
            Arc::new(TtlCache::new("clients")),
            Duration::from_secs(60),
        ));
        let client = clients
            .create(CreateClientCommand {
                name: "Acme".into(),
                industry: "Retail".into(),
                website: None,
                description: None,
            })
            .await
            .expect("client");
        (CompetitorService::new(store, clients), client.id)
    }

    fn input(name: &str, platform: &str, tags: &[&str]) -> CompetitorInput {
        CompetitorInput {
            name: name.into(),
            website: None,
            platform: Some(platform.into()),
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn bulk_save_skips_existing_and_repeated_names() {
        let (service, client_id) = setup().await;
        service
            .save_bulk(client_id, vec![input("Bolt", "facebook", &[])])
            .await
            .expect("first batch");

        let report = service
            .save_bulk(
                client_id,
                vec![
                    input("Bolt", "facebook", &[]),
                    input("Crux", "facebook", &[]),
                    input("Crux", "tiktok", &[]),
                ],
            )
            .await
            .expect("second batch");

        let saved: Vec<&str> = report.saved.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(saved, vec!["Crux"]);
        assert_eq!(report.skipped, vec!["Bolt", "Crux"]);
    }

    #[tokio::test]
    async fn list_excludes_the_client_itself_unless_asked() {
        let (service, client_id) = setup().await;
        service
            .save_bulk(
                client_id,
                vec![
                    input("Acme", "facebook", &["retail"]),
                    input("Bolt", "facebook", &["retail"]),
                    input("Crux", "instagram", &["retail"]),
                ],
            )
            .await
            .expect("save");

        let filter = CompetitorFilter {
            platform: Some("facebook".into()),
            ..Default::default()
        };
        let page = service
            .list(client_id, &filter, PageRequest::default())
            .await
            .expect("list");
        assert_eq!(page.count, 1);
        assert_eq!(page.items[0].name, "Bolt");

        let with_self = CompetitorFilter {
            include_self: true,
            ..filter
        };
        let page = service
            .list(client_id, &with_self, PageRequest::default())
            .await
            .expect("list");
        assert_eq!(page.count, 2);
    }

    #[tokio::test]
    async fn unknown_client_is_not_found() {
        let (service, _) = setup().await;
        let err = service
            .list(Uuid::new_v4(), &CompetitorFilter::default(), PageRequest::default())
            .await
            .expect_err("missing client");
        assert!(matches!(err, ServiceError::NotFound { entity: "client" }));
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let (service, client_id) = setup().await;
        let err = service
            .save_bulk(client_id, Vec::new())
            .await
            .expect_err("empty");
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
