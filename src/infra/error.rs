//! Failures raised while wiring up the runtime, before any request is served.

use thiserror::Error;

use crate::application::llm::LlmError;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database url is not configured")]
    DatabaseUrlMissing,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("http client setup failed: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("llm client setup failed: {0}")]
    Llm(#[from] LlmError),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(#[from] tracing_subscriber::util::TryInitError),
}
