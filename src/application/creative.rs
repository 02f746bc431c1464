//! Image, news and copy generation routed through webhooks and the LLM.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use crate::application::clients::ClientService;
use crate::application::error::ServiceError;
use crate::application::gateway::{WebhookEndpoint, WebhookGateway};
use crate::application::input::{http_url, required};
use crate::application::llm::{LlmClient, LlmPrompt};
use crate::domain::items::NormalizedItem;

const MOCKUP_SYSTEM_PROMPT: &str = "You write Facebook posts for small businesses. \
Reply with a single JSON object with the keys `headline`, `body`, `call_to_action`, \
`hashtags` (array of strings) and `image_prompt`.";

#[derive(Debug, Clone, Deserialize)]
pub struct MockupCommand {
    pub client_id: Uuid,
    pub idea: Value,
}

/// LLM output in the form the caller asked for.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Generated {
    Text { text: String },
    Json { data: Value },
}

#[derive(Clone)]
pub struct CreativeService {
    gateway: Arc<WebhookGateway>,
    image_search: WebhookEndpoint,
    facebook_images: WebhookEndpoint,
    news: WebhookEndpoint,
    llm: Arc<dyn LlmClient>,
    clients: Arc<ClientService>,
}

impl CreativeService {
    pub fn new(
        gateway: Arc<WebhookGateway>,
        image_search: WebhookEndpoint,
        facebook_images: WebhookEndpoint,
        news: WebhookEndpoint,
        llm: Arc<dyn LlmClient>,
        clients: Arc<ClientService>,
    ) -> Self {
        Self {
            gateway,
            image_search,
            facebook_images,
            news,
            llm,
            clients,
        }
    }

    pub async fn search_images(&self, query: &str) -> Result<Vec<NormalizedItem>, ServiceError> {
        let query = required(query, "query")?;
        self.items(&self.image_search, &query, json!({ "query": query }))
            .await
    }

    pub async fn facebook_images(
        &self,
        page_url: &str,
    ) -> Result<Vec<NormalizedItem>, ServiceError> {
        let page_url = http_url(page_url, "page_url")?;
        self.items(
            &self.facebook_images,
            page_url.as_str(),
            json!({ "page_url": page_url.as_str() }),
        )
        .await
    }

    pub async fn news(&self, topic: &str) -> Result<Vec<NormalizedItem>, ServiceError> {
        let topic = required(topic, "topic")?;
        self.items(&self.news, &topic, json!({ "topic": topic }))
            .await
    }

    async fn items(
        &self,
        endpoint: &WebhookEndpoint,
        key_part: &str,
        body: Value,
    ) -> Result<Vec<NormalizedItem>, ServiceError> {
        let request = endpoint.request(body)?;
        let key = endpoint.cache_key(&[key_part]);
        let items = self
            .gateway
            .invoke_items(Some(&key), request, endpoint.cache_ttl)
            .await?;
        info!(
            target = "marketdesk::creative",
            endpoint = endpoint.name,
            count = items.len(),
            "items fetched"
        );
        Ok(items)
    }

    /// Draft a Facebook post for one idea, as structured JSON.
    pub async fn post_mockup(&self, command: MockupCommand) -> Result<Value, ServiceError> {
        if command.idea.is_null() {
            return Err(ServiceError::validation("`idea` must not be null"));
        }
        let client = self.clients.get(command.client_id).await?;

        let prompt = LlmPrompt::json(format!(
            "Business: {name} ({industry}).\nWebsite: {website}\nIdea: {idea}\n\
             Write the Facebook post for this idea.",
            name = client.name,
            industry = client.industry,
            website = client.website.as_deref().unwrap_or("n/a"),
            idea = command.idea,
        ))
        .with_system(MOCKUP_SYSTEM_PROMPT);

        let mockup = self.llm.complete_json(&prompt).await?;
        info!(
            target = "marketdesk::creative",
            client_id = %client.id,
            provider = self.llm.provider(),
            "post mockup generated"
        );
        Ok(mockup)
    }

    pub async fn generate(&self, prompt: &str, json_output: bool) -> Result<Generated, ServiceError> {
        let prompt = required(prompt, "prompt")?;
        if json_output {
            let data = self.llm.complete_json(&LlmPrompt::json(prompt)).await?;
            return Ok(Generated::Json { data });
        }
        let text = self.llm.complete(&LlmPrompt::text(prompt)).await?;
        Ok(Generated::Text { text })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use url::Url;

    use super::*;
    use crate::application::clients::CreateClientCommand;
    use crate::application::gateway::{
        TransportError, TransportResponse, WebhookError, WebhookRequest, WebhookTransport,
    };
    use crate::application::llm::LlmError;
    use crate::application::repos::RecordStore;
    use crate::cache::TtlCache;
    use crate::infra::memory::InMemoryRecordStore;

    struct CountingTransport {
        body: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WebhookTransport for CountingTransport {
        async fn send(
            &self,
            _request: &WebhookRequest,
        ) -> Result<TransportResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(TransportResponse {
                status: 200,
                body: self.body.to_string(),
            })
        }
    }

    struct FencedLlm;

    #[async_trait]
    impl LlmClient for FencedLlm {
        fn provider(&self) -> &'static str {
            "fenced"
        }

        async fn complete(&self, _prompt: &LlmPrompt) -> Result<String, LlmError> {
            Ok("```json\n{\"headline\": \"Fresh bread daily\",}\n```".into())
        }
    }

    fn endpoint(name: &'static str, configured: bool) -> WebhookEndpoint {
        WebhookEndpoint {
            name,
            url: configured
                .then(|| Url::parse(&format!("http://hooks.test/{name}")).expect("url")),
            timeout: Duration::from_secs(5),
            cache_ttl: Duration::from_secs(300),
        }
    }

    async fn setup(transport: Arc<CountingTransport>) -> (CreativeService, Uuid) {
        let store: Arc<dyn RecordStore> = Arc::new(InMemoryRecordStore::new());
        let clients = Arc::new(ClientService::new(
            store,
            Arc::new(TtlCache::new("clients")),
            Duration::from_secs(60),
        ));
        let client = clients
            .create(CreateClientCommand {
                name: "Acme".into(),
                industry: "Bakery".into(),
                website: None,
                description: None,
            })
            .await
            .expect("client");
        let gateway = Arc::new(WebhookGateway::new(
            transport,
            Arc::new(TtlCache::new("webhook")),
        ));
        let service = CreativeService::new(
            gateway,
            endpoint("image_search", true),
            endpoint("facebook_images", true),
            endpoint("news", false),
            Arc::new(FencedLlm),
            clients,
        );
        (service, client.id)
    }

    fn transport(body: &'static str) -> Arc<CountingTransport> {
        Arc::new(CountingTransport {
            body,
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn image_search_is_cached_per_normalized_query() {
        let transport = transport(r#"{"images": [{"url": "a.jpg", "alt": "loaf"}]}"#);
        let (service, _) = setup(transport.clone()).await;

        let first = service.search_images("Sourdough").await.expect("search");
        let second = service.search_images("  sourdough ").await.expect("search");
        assert_eq!(first, second);
        assert_eq!(first[0].url, "a.jpg");
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_upstream() {
        let transport = transport("[]");
        let (service, _) = setup(transport.clone()).await;

        assert!(matches!(
            service.search_images("  ").await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            service.facebook_images("javascript:alert(1)").await,
            Err(ServiceError::Validation(_))
        ));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unconfigured_endpoint_is_reported() {
        let (service, _) = setup(transport("[]")).await;
        let err = service.news("bread").await.expect_err("not configured");
        assert!(matches!(
            err,
            ServiceError::Webhook(WebhookError::NotConfigured("news"))
        ));
    }

    #[tokio::test]
    async fn mockup_parses_repaired_llm_json() {
        let (service, client_id) = setup(transport("[]")).await;
        let mockup = service
            .post_mockup(MockupCommand {
                client_id,
                idea: json!({"title": "Behind the oven"}),
            })
            .await
            .expect("mockup");
        assert_eq!(mockup, json!({"headline": "Fresh bread daily"}));
    }

    #[tokio::test]
    async fn generate_returns_text_or_json() {
        let (service, _) = setup(transport("[]")).await;
        let text = service.generate("hello", false).await.expect("text");
        assert!(matches!(text, Generated::Text { .. }));
        let data = service.generate("hello", true).await.expect("json");
        assert_eq!(
            data,
            Generated::Json {
                data: json!({"headline": "Fresh bread daily"})
            }
        );
    }
}
