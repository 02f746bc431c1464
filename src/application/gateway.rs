//! Webhook gateway: cache check, one upstream call, parse, normalize, cache.
//!
//! Every integration route funnels through [`WebhookGateway`]. The gateway
//! never retries; non-2xx answers and timeouts surface to the caller as
//! [`WebhookError`] variants so routes can pattern-match instead of parsing
//! messages.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::counter;
use reqwest::Method;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::application::normalize::{Normalized, Normalizer};
use crate::cache::TtlCache;
use crate::domain::items::NormalizedItem;

pub(crate) const METRIC_WEBHOOK_REQUEST: &str = "marketdesk_webhook_request_total";

const BODY_PREVIEW_LIMIT: usize = 512;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum WebhookError {
    #[error("webhook `{0}` is not configured")]
    NotConfigured(&'static str),
    #[error("upstream returned HTTP {status}")]
    Upstream { status: u16, body: String },
    #[error("upstream response is not valid JSON: {0}")]
    MalformedResponse(String),
    #[error("upstream response has an unrecognized shape")]
    UnrecognizedShape { hint_keys: Vec<String> },
    #[error("upstream response contained no items")]
    NoItemsFound,
    #[error("upstream did not answer within {after:?}")]
    Timeout { after: Duration },
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Failure below the HTTP status level.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Connect(String),
}

impl From<TransportError> for WebhookError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Timeout(after) => WebhookError::Timeout { after },
            TransportError::Connect(message) => WebhookError::Transport(message),
        }
    }
}

/// One outbound webhook call.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub endpoint: &'static str,
    pub url: Url,
    pub method: Method,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

impl WebhookRequest {
    pub fn post_json(endpoint: &'static str, url: Url, body: Value, timeout: Duration) -> Self {
        Self {
            endpoint,
            url,
            method: Method::POST,
            body: Some(body),
            headers: Vec::new(),
            timeout,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Raw upstream answer; the body is kept as text and parsed by the gateway.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn send(&self, request: &WebhookRequest) -> Result<TransportResponse, TransportError>;
}

/// Static per-feature webhook settings.
#[derive(Debug, Clone)]
pub struct WebhookEndpoint {
    pub name: &'static str,
    pub url: Option<Url>,
    pub timeout: Duration,
    pub cache_ttl: Duration,
}

impl WebhookEndpoint {
    pub fn request(&self, body: Value) -> Result<WebhookRequest, WebhookError> {
        let url = self
            .url
            .clone()
            .ok_or(WebhookError::NotConfigured(self.name))?;
        Ok(WebhookRequest::post_json(self.name, url, body, self.timeout))
    }

    /// Cache key scoped to this endpoint; `parts` are trimmed and lowercased.
    pub fn cache_key(&self, parts: &[&str]) -> String {
        let mut key = String::from(self.name);
        for part in parts {
            key.push(':');
            key.push_str(&part.trim().to_lowercase());
        }
        key
    }
}

/// The workflow endpoints the dashboard talks to.
#[derive(Debug, Clone)]
pub struct WebhookEndpoints {
    pub image_search: WebhookEndpoint,
    pub facebook_images: WebhookEndpoint,
    pub idea_generation: WebhookEndpoint,
    pub market_research: WebhookEndpoint,
    pub news: WebhookEndpoint,
}

/// Cached gateway result.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayPayload {
    Items(Vec<NormalizedItem>),
    Json(Value),
}

pub struct WebhookGateway {
    transport: Arc<dyn WebhookTransport>,
    cache: Arc<TtlCache<GatewayPayload>>,
    normalizer: Normalizer,
}

impl WebhookGateway {
    pub fn new(
        transport: Arc<dyn WebhookTransport>,
        cache: Arc<TtlCache<GatewayPayload>>,
    ) -> Self {
        Self {
            transport,
            cache,
            normalizer: Normalizer::standard(),
        }
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn cache(&self) -> &Arc<TtlCache<GatewayPayload>> {
        &self.cache
    }

    /// Call an endpoint that answers with a list of items.
    pub async fn invoke_items(
        &self,
        cache_key: Option<&str>,
        request: WebhookRequest,
        ttl: Duration,
    ) -> Result<Vec<NormalizedItem>, WebhookError> {
        let cache_key = effective_key(cache_key, ttl);

        if let Some(GatewayPayload::Items(items)) = cache_key.and_then(|key| self.cached(key)) {
            return Ok(items);
        }

        let endpoint = request.endpoint;
        let payload = self.fetch_json(&request).await?;
        let items = match self.normalizer.normalize(&payload) {
            Normalized::Recognized { rule, items } => {
                info!(
                    target = "marketdesk::gateway",
                    endpoint,
                    rule,
                    item_count = items.len(),
                    "normalized upstream items"
                );
                items
            }
            Normalized::Empty { rule } => {
                warn!(
                    target = "marketdesk::gateway",
                    endpoint, rule, "upstream returned no items"
                );
                return Err(WebhookError::NoItemsFound);
            }
            Normalized::Unrecognized { hint_keys } => {
                warn!(
                    target = "marketdesk::gateway",
                    endpoint,
                    hint_keys = ?hint_keys,
                    "upstream payload shape unrecognized"
                );
                return Err(WebhookError::UnrecognizedShape { hint_keys });
            }
        };

        if let Some(key) = cache_key {
            self.cache
                .set(key, GatewayPayload::Items(items.clone()), ttl);
        }
        Ok(items)
    }

    /// Call an endpoint that answers with one JSON document mapped by the caller.
    pub async fn invoke_json(
        &self,
        cache_key: Option<&str>,
        request: WebhookRequest,
        ttl: Duration,
    ) -> Result<Value, WebhookError> {
        let cache_key = effective_key(cache_key, ttl);

        if let Some(GatewayPayload::Json(value)) = cache_key.and_then(|key| self.cached(key)) {
            return Ok(value);
        }

        let payload = self.fetch_json(&request).await?;
        if let Some(key) = cache_key {
            self.cache.set(key, GatewayPayload::Json(payload.clone()), ttl);
        }
        Ok(payload)
    }

    fn cached(&self, key: &str) -> Option<GatewayPayload> {
        let hit = self.cache.get(key);
        debug!(
            target = "marketdesk::gateway",
            key,
            hit = hit.is_some(),
            "cache lookup"
        );
        hit
    }

    async fn fetch_json(&self, request: &WebhookRequest) -> Result<Value, WebhookError> {
        let endpoint = request.endpoint;
        let started = Instant::now();

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(err) => {
                counter!(METRIC_WEBHOOK_REQUEST, "endpoint" => endpoint, "outcome" => "transport_error")
                    .increment(1);
                warn!(
                    target = "marketdesk::gateway",
                    endpoint,
                    error = %err,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "webhook call failed"
                );
                return Err(err.into());
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if !response.is_success() {
            counter!(METRIC_WEBHOOK_REQUEST, "endpoint" => endpoint, "outcome" => "upstream_error")
                .increment(1);
            warn!(
                target = "marketdesk::gateway",
                endpoint,
                status = response.status,
                elapsed_ms,
                body = %preview(&response.body),
                "webhook returned non-success status"
            );
            return Err(WebhookError::Upstream {
                status: response.status,
                body: response.body,
            });
        }

        counter!(METRIC_WEBHOOK_REQUEST, "endpoint" => endpoint, "outcome" => "ok").increment(1);
        info!(
            target = "marketdesk::gateway",
            endpoint,
            status = response.status,
            elapsed_ms,
            "webhook call completed"
        );

        serde_json::from_str(response.body.trim()).map_err(|err| {
            warn!(
                target = "marketdesk::gateway",
                endpoint,
                error = %err,
                body = %preview(&response.body),
                "webhook body is not JSON"
            );
            WebhookError::MalformedResponse(err.to_string())
        })
    }
}

fn effective_key(cache_key: Option<&str>, ttl: Duration) -> Option<&str> {
    cache_key.filter(|_| !ttl.is_zero())
}

fn preview(body: &str) -> &str {
    if body.len() <= BODY_PREVIEW_LIMIT {
        return body;
    }
    let mut end = BODY_PREVIEW_LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
