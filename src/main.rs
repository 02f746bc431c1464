use std::{process, sync::Arc};

use marketdesk::{
    application::{
        error::AppError,
        gateway::{WebhookEndpoint, WebhookEndpoints},
        llm::{DisabledLlm, LlmClient},
        repos::{BlobStore, RecordStore},
    },
    cache::TtlCache,
    config::{self, LlmProvider},
    infra::{
        db::PostgresRecordStore,
        error::InfraError,
        http::{self, AppState, Components},
        llm::{GeminiClient, OpenAiClient, ProviderConfig},
        memory::InMemoryRecordStore,
        telemetry,
        uploads::FilesystemBlobStore,
        webhook::ReqwestTransport,
    },
};
use sqlx::PgPool;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or(InfraError::DatabaseUrlMissing)?;

    connect_and_migrate(database_url, &settings.database).await?;
    info!(target = "marketdesk::migrate", "migrations applied");
    Ok(())
}

async fn connect_and_migrate(
    database_url: &str,
    database: &config::DatabaseSettings,
) -> Result<PgPool, InfraError> {
    let pool = PostgresRecordStore::connect(database_url, database.max_connections.get()).await?;
    PostgresRecordStore::run_migrations(&pool).await?;
    Ok(pool)
}

async fn init_store(settings: &config::Settings) -> Result<Arc<dyn RecordStore>, InfraError> {
    let Some(database_url) = settings.database.url.as_ref() else {
        warn!(
            target = "marketdesk::bootstrap",
            "no database url configured; records are kept in memory and lost on restart"
        );
        return Ok(Arc::new(InMemoryRecordStore::new()));
    };

    let pool = connect_and_migrate(database_url, &settings.database).await?;
    Ok(Arc::new(PostgresRecordStore::new(pool)))
}

fn init_llm(settings: &config::LlmSettings) -> Result<Arc<dyn LlmClient>, InfraError> {
    let provider_config = |api_key: &str| ProviderConfig {
        api_key: api_key.to_string(),
        model: settings.model.clone(),
        base_url: settings.base_url.clone(),
        timeout: settings.timeout,
    };
    let api_key = settings.api_key.as_deref().unwrap_or_default();

    let client: Arc<dyn LlmClient> = match settings.provider {
        LlmProvider::Disabled => Arc::new(DisabledLlm),
        LlmProvider::Gemini => Arc::new(GeminiClient::new(provider_config(api_key))?),
        LlmProvider::OpenAi => Arc::new(OpenAiClient::new(provider_config(api_key))?),
    };
    info!(
        target = "marketdesk::bootstrap",
        provider = client.provider(),
        model = %settings.model,
        "llm client ready"
    );
    Ok(client)
}

fn endpoint(name: &'static str, settings: &config::WebhookEndpointSettings) -> WebhookEndpoint {
    if settings.url.is_none() {
        warn!(
            target = "marketdesk::bootstrap",
            endpoint = name,
            "webhook url not configured; routes using it answer 503"
        );
    }
    WebhookEndpoint {
        name,
        url: settings.url.clone(),
        timeout: settings.timeout,
        cache_ttl: settings.cache_ttl,
    }
}

fn webhook_endpoints(settings: &config::WebhookSettings) -> WebhookEndpoints {
    WebhookEndpoints {
        image_search: endpoint("image_search", &settings.image_search),
        facebook_images: endpoint("facebook_images", &settings.facebook_images),
        idea_generation: endpoint("idea_generation", &settings.idea_generation),
        market_research: endpoint("market_research", &settings.market_research),
        news: endpoint("news", &settings.news),
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let store = init_store(&settings).await?;

    let blobs: Arc<dyn BlobStore> = Arc::new(
        FilesystemBlobStore::new(
            settings.uploads.directory.clone(),
            settings.uploads.public_base_url.clone(),
        )
        .map_err(InfraError::from)?,
    );

    let transport = ReqwestTransport::new().map_err(InfraError::from)?;

    let state = AppState::new(Components {
        store,
        blobs,
        transport: Arc::new(transport),
        llm: init_llm(&settings.llm)?,
        endpoints: webhook_endpoints(&settings.webhooks),
        webhook_cache: Arc::new(TtlCache::new("webhook")),
        client_cache: Arc::new(TtlCache::new("clients")),
        client_cache_ttl: settings.cache.client_ttl,
        upload_max_bytes: settings.uploads.max_request_bytes.get(),
    });

    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;

    info!(
        target = "marketdesk::bootstrap",
        addr = %settings.server.addr,
        "http server listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(
            target = "marketdesk::bootstrap",
            error = %err,
            "failed to listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
    info!(target = "marketdesk::bootstrap", "shutdown signal received");
}
