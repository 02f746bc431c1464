use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use url::Url;

use marketdesk::application::gateway::{
    TransportError, TransportResponse, WebhookEndpoint, WebhookEndpoints, WebhookRequest,
    WebhookTransport,
};
use marketdesk::application::llm::{LlmClient, LlmError, LlmPrompt};
use marketdesk::cache::TtlCache;
use marketdesk::infra::http::{AppState, Components, REQUEST_ID_HEADER, build_router};
use marketdesk::infra::memory::InMemoryRecordStore;
use marketdesk::infra::uploads::FilesystemBlobStore;

/// Canned upstream answers keyed by endpoint name.
#[derive(Default)]
struct ScriptedTransport {
    calls: AtomicUsize,
}

impl ScriptedTransport {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebhookTransport for ScriptedTransport {
    async fn send(&self, request: &WebhookRequest) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let query = request
            .body
            .as_ref()
            .and_then(|body| body.get("query"))
            .and_then(Value::as_str)
            .unwrap_or_default();

        let (status, body) = match (request.endpoint, query) {
            ("image_search", "mystery") => (200, r#"{"foo": "bar"}"#.to_string()),
            ("image_search", "nothing") => (200, r#"{"images": []}"#.to_string()),
            ("image_search", _) => (200, r#"{"url": ["a.jpg", "b.jpg"]}"#.to_string()),
            ("facebook_images", _) => (200, r#""single.jpg""#.to_string()),
            ("idea_generation", _) => (
                200,
                r#"[{"recommendations": [{"title": "Behind the scenes reel", "summary": "Show the workshop"}]}]"#
                    .to_string(),
            ),
            ("market_research", _) => (500, "research workflow crashed".to_string()),
            _ => (404, "no such hook".to_string()),
        };
        Ok(TransportResponse { status, body })
    }
}

struct CannedLlm;

#[async_trait]
impl LlmClient for CannedLlm {
    fn provider(&self) -> &'static str {
        "canned"
    }

    async fn complete(&self, prompt: &LlmPrompt) -> Result<String, LlmError> {
        if prompt.json_output {
            return Ok("```json\n{\"headline\": \"Spring is here\", \"hashtags\": [\"spring\",],}\n```".into());
        }
        Ok("Lean into short-form video.".into())
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

struct TestApp {
    router: Router,
    transport: Arc<ScriptedTransport>,
    _uploads: tempfile::TempDir,
}

fn app() -> TestApp {
    let uploads = tempfile::tempdir().expect("tempdir");
    let blobs = FilesystemBlobStore::new(uploads.path().to_path_buf(), "http://cdn.test/files")
        .expect("blob store");
    let transport = Arc::new(ScriptedTransport::default());

    let state = AppState::new(Components {
        store: Arc::new(InMemoryRecordStore::new()),
        blobs: Arc::new(blobs),
        transport: transport.clone(),
        llm: Arc::new(CannedLlm),
        endpoints: WebhookEndpoints {
            image_search: endpoint("image_search", true),
            facebook_images: endpoint("facebook_images", true),
            idea_generation: endpoint("idea_generation", true),
            market_research: endpoint("market_research", true),
            news: endpoint("news", false),
        },
        webhook_cache: Arc::new(TtlCache::new("webhook")),
        client_cache: Arc::new(TtlCache::new("clients")),
        client_cache_ttl: Duration::from_secs(60),
        upload_max_bytes: 16,
    });

    TestApp {
        router: build_router(state),
        transport,
        _uploads: uploads,
    }
}

async fn call(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, HeaderMap, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(body) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };
    let response = router
        .clone()
        .oneshot(builder.body(body).expect("request"))
        .await
        .expect("router should respond");

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, headers, json)
}

async fn create_client(router: &Router, name: &str) -> String {
    let (status, _, body) = call(
        router,
        Method::POST,
        "/api/clients",
        Some(json!({"name": name, "industry": "Bakery", "website": "https://acme.test"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["client"]["id"].as_str().expect("client id").to_string()
}

fn assert_error_body(body: &Value) {
    assert_eq!(body["success"], false);
    assert!(
        body["error"].as_str().is_some_and(|error| !error.is_empty()),
        "error message expected in {body}"
    );
}

#[tokio::test]
async fn health_endpoints_report_ok() {
    let app = app();
    let (status, headers, body) = call(&app.router, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "status": "ok"}));
    assert!(headers.contains_key(REQUEST_ID_HEADER));

    let (status, _, body) = call(&app.router, Method::GET, "/health/storage", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn client_lifecycle() {
    let app = app();
    let id = create_client(&app.router, "Acme Bakery").await;

    let (status, _, body) =
        call(&app.router, Method::GET, &format!("/api/clients/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["client"]["name"], "Acme Bakery");

    let (status, _, body) = call(
        &app.router,
        Method::PATCH,
        &format!("/api/clients/{id}"),
        Some(json!({"description": "Sourdough specialists"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["client"]["description"], "Sourdough specialists");
    assert_eq!(body["client"]["industry"], "Bakery");

    let (status, _, body) = call(&app.router, Method::GET, "/api/clients?industry=Bakery", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["page"], 1);
    assert_eq!(body["total_pages"], 1);

    let (status, _, _) =
        call(&app.router, Method::DELETE, &format!("/api/clients/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) =
        call(&app.router, Method::GET, &format!("/api/clients/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_error_body(&body);
}

#[tokio::test]
async fn malformed_requests_use_the_error_envelope() {
    let app = app();

    let (status, _, body) = call(
        &app.router,
        Method::POST,
        "/api/clients",
        Some(json!({"name": "   ", "industry": "Retail"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_body(&body);

    let (status, _, body) = call(
        &app.router,
        Method::POST,
        "/api/clients",
        Some(json!({"industry": "Retail"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_error_body(&body);

    let (status, _, body) = call(&app.router, Method::GET, "/api/clients/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_body(&body);

    let (status, _, body) = call(
        &app.router,
        Method::POST,
        "/api/feedback",
        Some(json!({"client_id": uuid::Uuid::new_v4(), "rating": 9})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_body(&body);
}

#[tokio::test]
async fn competitors_are_deduplicated_and_exclude_the_client() {
    let app = app();
    let id = create_client(&app.router, "Acme Bakery").await;
    let uri = format!("/api/clients/{id}/competitors");

    let (status, _, body) = call(
        &app.router,
        Method::POST,
        &uri,
        Some(json!({"competitors": [
            {"name": "Crumb & Co", "platform": "instagram", "tags": ["local"]},
            {"name": "Acme Bakery", "platform": "facebook"},
            {"name": "Crumb & Co"}
        ]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["saved"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["skipped"], json!(["Crumb & Co"]));

    let (status, _, body) = call(&app.router, Method::POST, &uri, Some(json!([{"name": "Crumb & Co"}]))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["saved"], json!([]));

    let (status, _, body) = call(&app.router, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["items"][0]["name"], "Crumb & Co");

    let (_, _, body) = call(&app.router, Method::GET, &format!("{uri}?include_self=true"), None).await;
    assert_eq!(body["count"], 2);

    let (_, _, body) = call(&app.router, Method::GET, &format!("{uri}?tag=local&page_size=500"), None).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["page_size"], 100);
}

#[tokio::test]
async fn image_search_normalizes_and_caches() {
    let app = app();
    let request = json!({"query": "sourdough"});

    let (status, _, body) = call(&app.router, Method::POST, "/api/images/search", Some(request.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"success": true, "count": 2, "items": [{"url": "a.jpg"}, {"url": "b.jpg"}]})
    );

    let (status, _, _) = call(&app.router, Method::POST, "/api/images/search", Some(request)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.transport.calls(), 1);

    let (status, _, body) = call(&app.router, Method::DELETE, "/api/cache", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 1);
}

#[tokio::test]
async fn facebook_images_accept_bare_string_payloads() {
    let app = app();
    let (status, _, body) = call(
        &app.router,
        Method::POST,
        "/api/facebook/images",
        Some(json!({"page_url": "https://facebook.com/acme"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"], json!([{"url": "single.jpg"}]));

    let (status, _, body) = call(
        &app.router,
        Method::POST,
        "/api/facebook/images",
        Some(json!({"page_url": "javascript:alert(1)"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_body(&body);
}

#[tokio::test]
async fn unusable_upstream_payloads_are_unprocessable() {
    let app = app();

    let (status, _, body) = call(&app.router, Method::POST, "/api/images/search", Some(json!({"query": "mystery"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_error_body(&body);

    let (status, _, body) = call(&app.router, Method::POST, "/api/images/search", Some(json!({"query": "nothing"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_error_body(&body);
}

#[tokio::test]
async fn unconfigured_webhook_is_unavailable_without_calling_out() {
    let app = app();
    let (status, _, body) = call(&app.router, Method::POST, "/api/news", Some(json!({"topic": "bread"}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_error_body(&body);
    assert_eq!(app.transport.calls(), 0);
}

#[tokio::test]
async fn idea_generation_survives_market_research_failure() {
    let app = app();
    let client_id = create_client(&app.router, "Acme Bakery").await;

    let (status, _, body) = call(
        &app.router,
        Method::POST,
        "/api/ideas/generate",
        Some(json!({"client_id": client_id, "brief": "Spring menu", "platforms": ["instagram"]})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["ideas"][0]["title"], "Behind the scenes reel");
    assert_eq!(body["ideas"][0]["description"], "Show the workshop");
    assert_eq!(body["insights"], "Lean into short-form video.");
    assert!(body.get("market_research").is_none());
    assert_eq!(body["warnings"][0]["source"], "market_research");
}

#[tokio::test]
async fn saved_ideas_can_be_shared() {
    let app = app();
    let client_id = create_client(&app.router, "Acme Bakery").await;

    let (status, _, body) = call(
        &app.router,
        Method::POST,
        "/api/ideas/saved",
        Some(json!({"client_id": client_id, "title": "Reel", "content": {"hook": "flour cloud"}, "tags": ["video"]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let idea_id = body["idea"]["id"].as_str().expect("idea id").to_string();

    let (status, _, body) = call(
        &app.router,
        Method::POST,
        &format!("/api/ideas/saved/{idea_id}/share"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["idea"]["share_token"].as_str().expect("token").to_string();

    let (status, _, body) = call(&app.router, Method::GET, &format!("/api/share/{token}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["idea"]["content"]["hook"], "flour cloud");

    let (status, _, body) = call(&app.router, Method::GET, "/api/share/unknown-token", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_error_body(&body);
}

#[tokio::test]
async fn llm_routes_repair_json_output() {
    let app = app();
    let client_id = create_client(&app.router, "Acme Bakery").await;

    let (status, _, body) = call(
        &app.router,
        Method::POST,
        "/api/posts/mockup",
        Some(json!({"client_id": client_id, "idea": {"title": "Spring menu"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mockup"]["headline"], "Spring is here");
    assert_eq!(body["mockup"]["hashtags"], json!(["spring"]));

    let (status, _, body) = call(
        &app.router,
        Method::POST,
        "/api/llm/generate",
        Some(json!({"prompt": "tagline please"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], "Lean into short-form video.");
}

#[tokio::test]
async fn uploads_are_stored_and_served() {
    let app = app();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/uploads?filename=Logo.SVG")
                .body(Body::from("<svg/>"))
                .expect("request"),
        )
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::CREATED);
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let body: Value = serde_json::from_slice(&bytes).expect("json");
    let path = body["file"]["path"].as_str().expect("path").to_string();
    assert!(path.ends_with("-logo.svg"));
    assert_eq!(body["file"]["size_bytes"], 6);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/files/{path}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "image/svg+xml"
    );
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    assert_eq!(&bytes[..], b"<svg/>");

    let (status, _, body) = call(&app.router, Method::GET, "/files/2024/01/01/missing.png", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_error_body(&body);
}

#[tokio::test]
async fn oversized_uploads_are_rejected() {
    let app = app();
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/uploads?filename=big.bin")
                .body(Body::from(vec![0_u8; 64]))
                .expect("request"),
        )
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let body: Value = serde_json::from_slice(&bytes).expect("json");
    assert_error_body(&body);
}

#[tokio::test]
async fn deleting_a_client_removes_its_shared_ideas_and_feedback() {
    let app = app();
    let client_id = create_client(&app.router, "Acme Bakery").await;

    let (_, _, body) = call(
        &app.router,
        Method::POST,
        "/api/ideas/saved",
        Some(json!({"client_id": client_id, "title": "Reel", "content": {}})),
    )
    .await;
    let idea_id = body["idea"]["id"].as_str().expect("idea id").to_string();
    let (_, _, body) = call(
        &app.router,
        Method::POST,
        &format!("/api/ideas/saved/{idea_id}/share"),
        None,
    )
    .await;
    let token = body["idea"]["share_token"].as_str().expect("token").to_string();
    let (status, _, _) = call(
        &app.router,
        Method::POST,
        "/api/feedback",
        Some(json!({"client_id": client_id, "idea_id": idea_id, "rating": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _, _) =
        call(&app.router, Method::DELETE, &format!("/api/clients/{client_id}"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = call(&app.router, Method::GET, &format!("/api/share/{token}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, _, body) = call(
        &app.router,
        Method::GET,
        &format!("/api/feedback?client_id={client_id}"),
        None,
    )
    .await;
    assert_eq!(body["count"], 0);
    let (_, _, body) = call(
        &app.router,
        Method::GET,
        &format!("/api/ideas/saved?client_id={client_id}"),
        None,
    )
    .await;
    assert_eq!(body["count"], 0);
}
