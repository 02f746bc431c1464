use axum::Json;
use axum::extract::rejection::{BytesRejection, JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::{ErrorReport, ServiceError};
use crate::application::gateway::WebhookError;
use crate::application::llm::LlmError;
use crate::application::repos::{BlobError, RepoError};

const SOURCE: &str = "infra::http";

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub success: bool,
    pub error: String,
}

/// Error rendered as `{ "success": false, "error": ... }` with a diagnostic report attached.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    report: ErrorReport,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status,
            report: ErrorReport::from_message(SOURCE, status, message.clone()),
            message,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

fn webhook_status(error: &WebhookError) -> StatusCode {
    match error {
        WebhookError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
        WebhookError::Upstream { .. }
        | WebhookError::MalformedResponse(_)
        | WebhookError::Transport(_) => StatusCode::BAD_GATEWAY,
        WebhookError::UnrecognizedShape { .. } | WebhookError::NoItemsFound => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        WebhookError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
    }
}

fn llm_status(error: &LlmError) -> StatusCode {
    match error {
        LlmError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
        LlmError::Http(_)
        | LlmError::Upstream { .. }
        | LlmError::EmptyCompletion
        | LlmError::InvalidJson(_) => StatusCode::BAD_GATEWAY,
    }
}

fn repo_status(error: &RepoError) -> StatusCode {
    match error {
        RepoError::NotFound => StatusCode::NOT_FOUND,
        RepoError::Duplicate { .. } => StatusCode::CONFLICT,
        RepoError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
        RepoError::Persistence(_) | RepoError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn blob_status(error: &BlobError) -> StatusCode {
    match error {
        BlobError::InvalidPath => StatusCode::NOT_FOUND,
        BlobError::EmptyPayload => StatusCode::BAD_REQUEST,
        BlobError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        BlobError::Io(err) if err.kind() == std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
        BlobError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn service_status(error: &ServiceError) -> StatusCode {
    match error {
        ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
        ServiceError::Webhook(err) => webhook_status(err),
        ServiceError::Llm(err) => llm_status(err),
        ServiceError::Repo(err) => repo_status(err),
        ServiceError::Blob(err) => blob_status(err),
    }
}

/// Message shown to callers; storage and I/O internals stay in the report.
fn public_message(error: &ServiceError) -> String {
    match error {
        ServiceError::Repo(RepoError::Persistence(_) | RepoError::Timeout) => {
            "storage is unavailable".to_string()
        }
        ServiceError::Repo(RepoError::NotFound) => "resource not found".to_string(),
        ServiceError::Blob(BlobError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            "file not found".to_string()
        }
        ServiceError::Blob(BlobError::InvalidPath) => "file not found".to_string(),
        ServiceError::Blob(BlobError::Io(_)) => "file storage failed".to_string(),
        other => other.to_string(),
    }
}

impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self {
        let status = service_status(&error);
        Self {
            status,
            message: public_message(&error),
            report: ErrorReport::from_error(SOURCE, status, &error),
        }
    }
}

impl From<RepoError> for ApiError {
    fn from(error: RepoError) -> Self {
        ServiceError::from(error).into()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            success: false,
            error: self.message,
        };
        let mut response = (self.status, Json(body)).into_response();
        self.report.attach(&mut response);
        response
    }
}
