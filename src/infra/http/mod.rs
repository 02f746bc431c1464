//! JSON HTTP surface: routing, extractors, error rendering and request logging.

mod error;
mod handlers;
mod middleware;
mod models;
mod state;

pub use error::{ApiError, ApiErrorBody};
pub use middleware::{REQUEST_ID_HEADER, RequestContext};
pub use state::{AppState, Components};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, patch, post},
};

use self::middleware::{log_responses, set_request_context};

pub fn build_router(state: AppState) -> Router {
    let upload_limit = usize::try_from(state.uploads.max_bytes()).unwrap_or(usize::MAX);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/health/storage", get(handlers::storage_health))
        .route(
            "/api/clients",
            get(handlers::clients::list_clients).post(handlers::clients::create_client),
        )
        .route(
            "/api/clients/{id}",
            get(handlers::clients::get_client)
                .patch(handlers::clients::update_client)
                .delete(handlers::clients::delete_client),
        )
        .route(
            "/api/clients/{id}/competitors",
            get(handlers::competitors::list_competitors)
                .post(handlers::competitors::save_competitors),
        )
        .route("/api/images/search", post(handlers::creative::search_images))
        .route(
            "/api/facebook/images",
            post(handlers::creative::facebook_images),
        )
        .route("/api/news", post(handlers::creative::news))
        .route("/api/posts/mockup", post(handlers::creative::post_mockup))
        .route("/api/llm/generate", post(handlers::creative::generate))
        .route("/api/ideas/generate", post(handlers::ideas::generate_ideas))
        .route(
            "/api/ideas/saved",
            get(handlers::ideas::list_saved).post(handlers::ideas::save_idea),
        )
        .route(
            "/api/ideas/saved/{id}",
            patch(handlers::ideas::update_saved).delete(handlers::ideas::delete_saved),
        )
        .route(
            "/api/ideas/saved/{id}/share",
            post(handlers::ideas::share_saved),
        )
        .route("/api/share/{token}", get(handlers::ideas::shared_idea))
        .route(
            "/api/feedback",
            get(handlers::feedback::list_feedback).post(handlers::feedback::submit_feedback),
        )
        .route(
            "/api/uploads",
            post(handlers::uploads::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/files/{*path}", get(handlers::uploads::serve_file))
        .route("/api/cache", axum::routing::delete(handlers::clear_cache))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
