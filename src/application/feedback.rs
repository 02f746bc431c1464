use std::sync::Arc;

use serde::Deserialize;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::application::clients::ClientService;
use crate::application::error::ServiceError;
use crate::application::input::optional;
use crate::application::pagination::{Page, PageRequest, QueryComposer};
use crate::application::query::RecordQuery;
use crate::application::repos::{RecordStore, RepoError, decode_row, encode_row};
use crate::domain::collections::Collection;
use crate::domain::entities::{FeedbackRecord, SavedIdeaRecord};

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitFeedbackCommand {
    pub client_id: Uuid,
    #[serde(default)]
    pub idea_id: Option<Uuid>,
    pub rating: i32,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Clone)]
pub struct FeedbackService {
    store: Arc<dyn RecordStore>,
    composer: QueryComposer,
    clients: Arc<ClientService>,
}

impl FeedbackService {
    pub fn new(store: Arc<dyn RecordStore>, clients: Arc<ClientService>) -> Self {
        Self {
            composer: QueryComposer::new(store.clone()),
            store,
            clients,
        }
    }

    pub async fn submit(
        &self,
        command: SubmitFeedbackCommand,
    ) -> Result<FeedbackRecord, ServiceError> {
        if !(MIN_RATING..=MAX_RATING).contains(&command.rating) {
            return Err(ServiceError::validation(format!(
                "`rating` must be between {MIN_RATING} and {MAX_RATING}"
            )));
        }
        self.clients.get(command.client_id).await?;
        if let Some(idea_id) = command.idea_id {
            self.ensure_idea_belongs_to(idea_id, command.client_id).await?;
        }

        let record = FeedbackRecord {
            id: Uuid::new_v4(),
            client_id: command.client_id,
            idea_id: command.idea_id,
            rating: command.rating,
            comment: optional(command.comment),
            created_at: OffsetDateTime::now_utc(),
        };
        let row = self
            .store
            .insert(Collection::Feedback, encode_row(&record)?)
            .await?
            .ok_or_else(|| RepoError::Duplicate {
                constraint: "feedback_pkey".to_string(),
            })?;

        info!(
            target = "marketdesk::feedback",
            client_id = %record.client_id,
            rating = record.rating,
            "feedback recorded"
        );
        Ok(decode_row(row)?)
    }

    async fn ensure_idea_belongs_to(
        &self,
        idea_id: Uuid,
        client_id: Uuid,
    ) -> Result<(), ServiceError> {
        let query = RecordQuery::new(Collection::SavedIdeas).eq("id", idea_id)?;
        let row = self
            .store
            .find_by(&query)
            .await?
            .ok_or(ServiceError::not_found("idea"))?;
        let idea: SavedIdeaRecord = decode_row(row)?;
        if idea.client_id != client_id {
            return Err(ServiceError::validation(
                "`idea_id` refers to an idea saved for another client",
            ));
        }
        Ok(())
    }

    pub async fn list(
        &self,
        client_id: Option<Uuid>,
        page: PageRequest,
    ) -> Result<Page<FeedbackRecord>, ServiceError> {
        let mut query = RecordQuery::new(Collection::Feedback).sort_by("created_at", true)?;
        if let Some(client_id) = client_id {
            query = query.eq("client_id", client_id)?;
        }
        Ok(self.composer.fetch_typed(&query, page).await?)
    }
}
