//! Idea generation with best-effort enrichment, plus the saved-idea library.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::clients::{ClientService, not_found_as};
use crate::application::error::ServiceError;
use crate::application::gateway::{WebhookEndpoint, WebhookError, WebhookGateway};
use crate::application::input::{optional, required, tags};
use crate::application::llm::{LlmClient, LlmPrompt};
use crate::application::pagination::{Page, PageRequest, QueryComposer};
use crate::application::query::RecordQuery;
use crate::application::recommendations::{Recommendation, extract_recommendations};
use crate::application::repos::{
    RecordStore, RepoError, decode_row, encode_row, timestamp_value,
};
use crate::domain::collections::Collection;
use crate::domain::entities::{ClientRecord, SavedIdeaRecord};

const INSIGHTS_SYSTEM_PROMPT: &str = "You are a senior marketing strategist. Answer with three to five short, concrete insights.";

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateIdeasCommand {
    pub client_id: Uuid,
    pub brief: String,
    #[serde(default)]
    pub platforms: Vec<String>,
}

/// A secondary call that failed without failing the primary result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SideEffect {
    pub source: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdeaGeneration {
    pub ideas: Vec<Recommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insights: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_research: Option<Value>,
    pub warnings: Vec<SideEffect>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveIdeaCommand {
    pub client_id: Uuid,
    pub title: String,
    pub content: Value,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateIdeaCommand {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct SavedIdeaFilter {
    pub client_id: Option<Uuid>,
    pub tag: Option<String>,
}

#[derive(Clone)]
pub struct IdeaService {
    gateway: Arc<WebhookGateway>,
    generation: WebhookEndpoint,
    research: WebhookEndpoint,
    llm: Arc<dyn LlmClient>,
    clients: Arc<ClientService>,
    store: Arc<dyn RecordStore>,
    composer: QueryComposer,
}

impl IdeaService {
    pub fn new(
        gateway: Arc<WebhookGateway>,
        generation: WebhookEndpoint,
        research: WebhookEndpoint,
        llm: Arc<dyn LlmClient>,
        clients: Arc<ClientService>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            gateway,
            generation,
            research,
            llm,
            clients,
            composer: QueryComposer::new(store.clone()),
            store,
        }
    }

    /// Run the idea workflow, market research and LLM insights concurrently.
    /// Only the idea workflow can fail the call; the others degrade to warnings.
    pub async fn generate(
        &self,
        command: GenerateIdeasCommand,
    ) -> Result<IdeaGeneration, ServiceError> {
        let brief = required(&command.brief, "brief")?;
        let platforms = tags(command.platforms);
        let client = self.clients.get(command.client_id).await?;

        let primary = self.primary_ideas(&client, &brief, &platforms);
        let research = self.market_research(&client);
        let prompt = insights_prompt(&client, &brief, &platforms);
        let insights = self.llm.complete(&prompt);
        let (primary, research, insights) = tokio::join!(primary, research, insights);

        let ideas = primary?;
        let mut warnings = Vec::new();

        let market_research = match research {
            Ok(value) => Some(value),
            Err(err) => {
                warnings.push(side_effect("market_research", &err));
                None
            }
        };
        let insights = match insights {
            Ok(text) => Some(text.trim().to_string()),
            Err(err) => {
                warnings.push(side_effect("insights", &err));
                None
            }
        };

        info!(
            target = "marketdesk::ideas",
            client_id = %client.id,
            ideas = ideas.len(),
            warnings = warnings.len(),
            "ideas generated"
        );

        Ok(IdeaGeneration {
            ideas,
            insights,
            market_research,
            warnings,
        })
    }

    async fn primary_ideas(
        &self,
        client: &ClientRecord,
        brief: &str,
        platforms: &[String],
    ) -> Result<Vec<Recommendation>, ServiceError> {
        let request = self.generation.request(json!({
            "client": {
                "id": client.id,
                "name": client.name,
                "industry": client.industry,
                "website": client.website,
                "description": client.description,
            },
            "brief": brief,
            "platforms": platforms,
        }))?;

        let platform_key = platforms.join(",");
        let client_key = client.id.to_string();
        let key = self
            .generation
            .cache_key(&[client_key.as_str(), brief, platform_key.as_str()]);
        let payload = self
            .gateway
            .invoke_json(Some(&key), request, self.generation.cache_ttl)
            .await?;

        Ok(extract_recommendations(&payload)?)
    }

    async fn market_research(&self, client: &ClientRecord) -> Result<Value, WebhookError> {
        let request = self.research.request(json!({
            "industry": client.industry,
            "client_name": client.name,
            "website": client.website,
        }))?;
        let key = self.research.cache_key(&[client.industry.as_str()]);
        self.gateway
            .invoke_json(Some(&key), request, self.research.cache_ttl)
            .await
    }

    pub async fn save(&self, command: SaveIdeaCommand) -> Result<SavedIdeaRecord, ServiceError> {
        let title = required(&command.title, "title")?;
        if command.content.is_null() {
            return Err(ServiceError::validation("`content` must not be null"));
        }
        self.clients.get(command.client_id).await?;

        let now = OffsetDateTime::now_utc();
        let record = SavedIdeaRecord {
            id: Uuid::new_v4(),
            client_id: command.client_id,
            title,
            content: command.content,
            tags: tags(command.tags),
            share_token: None,
            created_at: now,
            updated_at: now,
        };

        let row = self
            .store
            .insert(Collection::SavedIdeas, encode_row(&record)?)
            .await?
            .ok_or_else(|| RepoError::Duplicate {
                constraint: "saved_ideas_pkey".to_string(),
            })?;
        let saved: SavedIdeaRecord = decode_row(row)?;
        info!(
            target = "marketdesk::ideas",
            idea_id = %saved.id,
            client_id = %saved.client_id,
            "idea saved"
        );
        Ok(saved)
    }

    pub async fn list_saved(
        &self,
        filter: &SavedIdeaFilter,
        page: PageRequest,
    ) -> Result<Page<SavedIdeaRecord>, ServiceError> {
        let mut query = RecordQuery::new(Collection::SavedIdeas).sort_by("created_at", true)?;
        if let Some(client_id) = filter.client_id {
            query = query.eq("client_id", client_id)?;
        }
        if let Some(tag) = optional(filter.tag.clone()) {
            query = query.contains("tags", [tag])?;
        }
        Ok(self.composer.fetch_typed(&query, page).await?)
    }

    pub async fn update_saved(
        &self,
        id: Uuid,
        command: UpdateIdeaCommand,
    ) -> Result<SavedIdeaRecord, ServiceError> {
        let mut patch = Map::new();
        if let Some(title) = command.title {
            patch.insert("title".into(), json!(required(&title, "title")?));
        }
        if let Some(content) = command.content {
            if content.is_null() {
                return Err(ServiceError::validation("`content` must not be null"));
            }
            patch.insert("content".into(), content);
        }
        if let Some(values) = command.tags {
            patch.insert("tags".into(), json!(tags(values)));
        }
        patch.insert(
            "updated_at".into(),
            timestamp_value(OffsetDateTime::now_utc())?,
        );

        let row = self
            .store
            .update(Collection::SavedIdeas, id, Value::Object(patch))
            .await
            .map_err(not_found_as("saved idea"))?;
        Ok(decode_row(row)?)
    }

    pub async fn delete_saved(&self, id: Uuid) -> Result<(), ServiceError> {
        if !self.store.delete(Collection::SavedIdeas, id).await? {
            return Err(ServiceError::not_found("saved idea"));
        }
        info!(
            target = "marketdesk::ideas",
            idea_id = %id,
            "saved idea deleted"
        );
        Ok(())
    }

    /// Issue a share token, reusing the existing one if the idea was shared before.
    pub async fn share(&self, id: Uuid) -> Result<SavedIdeaRecord, ServiceError> {
        let query = RecordQuery::new(Collection::SavedIdeas).eq("id", id)?;
        let row = self
            .store
            .find_by(&query)
            .await?
            .ok_or(ServiceError::not_found("saved idea"))?;
        let idea: SavedIdeaRecord = decode_row(row)?;
        if idea.share_token.is_some() {
            return Ok(idea);
        }

        let token = Uuid::new_v4().simple().to_string();
        let row = self
            .store
            .update(
                Collection::SavedIdeas,
                id,
                json!({
                    "share_token": token,
                    "updated_at": timestamp_value(OffsetDateTime::now_utc())?,
                }),
            )
            .await
            .map_err(not_found_as("saved idea"))?;

        info!(
            target = "marketdesk::ideas",
            idea_id = %id,
            "saved idea shared"
        );
        Ok(decode_row(row)?)
    }

    pub async fn shared(&self, token: &str) -> Result<SavedIdeaRecord, ServiceError> {
        let token = required(token, "token")?;
        let query = RecordQuery::new(Collection::SavedIdeas).eq("share_token", token)?;
        let row = self
            .store
            .find_by(&query)
            .await?
            .ok_or(ServiceError::not_found("shared idea"))?;
        Ok(decode_row(row)?)
    }
}

fn insights_prompt(client: &ClientRecord, brief: &str, platforms: &[String]) -> LlmPrompt {
    let platforms = if platforms.is_empty() {
        "any".to_string()
    } else {
        platforms.join(", ")
    };
    LlmPrompt::text(format!(
        "Client: {name} ({industry}).\nCampaign brief: {brief}\nTarget platforms: {platforms}\n\
         Give strategic insights for this campaign.",
        name = client.name,
        industry = client.industry,
    ))
    .with_system(INSIGHTS_SYSTEM_PROMPT)
}

fn side_effect(source: &'static str, error: &dyn std::error::Error) -> SideEffect {
    warn!(
        target = "marketdesk::ideas",
        source,
        error = %error,
        "secondary enrichment failed"
    );
    SideEffect {
        source,
        message: error.to_string(),
    }
}
