use std::sync::Arc;
use std::time::Duration;

use crate::application::clients::ClientService;
use crate::application::competitors::CompetitorService;
use crate::application::creative::CreativeService;
use crate::application::feedback::FeedbackService;
use crate::application::gateway::{
    GatewayPayload, WebhookEndpoints, WebhookGateway, WebhookTransport,
};
use crate::application::ideas::IdeaService;
use crate::application::llm::LlmClient;
use crate::application::repos::{BlobStore, RecordStore};
use crate::application::uploads::UploadService;
use crate::cache::TtlCache;
use crate::domain::entities::ClientRecord;

/// Collaborators the HTTP surface is assembled from.
pub struct Components {
    pub store: Arc<dyn RecordStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub transport: Arc<dyn WebhookTransport>,
    pub llm: Arc<dyn LlmClient>,
    pub endpoints: WebhookEndpoints,
    pub webhook_cache: Arc<TtlCache<GatewayPayload>>,
    pub client_cache: Arc<TtlCache<ClientRecord>>,
    pub client_cache_ttl: Duration,
    pub upload_max_bytes: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub clients: Arc<ClientService>,
    pub competitors: Arc<CompetitorService>,
    pub ideas: Arc<IdeaService>,
    pub feedback: Arc<FeedbackService>,
    pub creative: Arc<CreativeService>,
    pub uploads: Arc<UploadService>,
    pub store: Arc<dyn RecordStore>,
    pub webhook_cache: Arc<TtlCache<GatewayPayload>>,
    pub client_cache: Arc<TtlCache<ClientRecord>>,
}

impl AppState {
    pub fn new(components: Components) -> Self {
        let Components {
            store,
            blobs,
            transport,
            llm,
            endpoints,
            webhook_cache,
            client_cache,
            client_cache_ttl,
            upload_max_bytes,
        } = components;

        let gateway = Arc::new(WebhookGateway::new(transport, webhook_cache.clone()));
        let clients = Arc::new(ClientService::new(
            store.clone(),
            client_cache.clone(),
            client_cache_ttl,
        ));
        let competitors = Arc::new(CompetitorService::new(store.clone(), clients.clone()));
        let feedback = Arc::new(FeedbackService::new(store.clone(), clients.clone()));
        let ideas = Arc::new(IdeaService::new(
            gateway.clone(),
            endpoints.idea_generation,
            endpoints.market_research,
            llm.clone(),
            clients.clone(),
            store.clone(),
        ));
        let creative = Arc::new(CreativeService::new(
            gateway,
            endpoints.image_search,
            endpoints.facebook_images,
            endpoints.news,
            llm,
            clients.clone(),
        ));
        let uploads = Arc::new(UploadService::new(blobs, upload_max_bytes));

        Self {
            clients,
            competitors,
            ideas,
            feedback,
            creative,
            uploads,
            store,
            webhook_cache,
            client_cache,
        }
    }
}
