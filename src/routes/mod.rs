use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
    Router,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::{auth::Reviewer, state::AppState};

pub mod health;
pub mod projects;
pub mod reviews;

fn cors_layer(allowed: Option<&str>) -> CorsLayer {
    let allow_origin = match allowed {
        Some(origins) => {
            let headers: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .filter_map(|value| match value.parse::<HeaderValue>() {
                    Ok(header) => Some(header),
                    Err(_) => {
                        warn!(origin = value, "ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(headers)
        }
        None => AllowOrigin::mirror_request(),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn create_router(state: AppState) -> Router<()> {
    let cors = cors_layer(state.config.cors_allowed_origin.as_deref());
    let body_limit = state.config.upload_max_bytes;

    let project_routes = Router::new()
        .route("/", post(projects::submit_project))
        .route("/:id", get(projects::get_project))
        .route("/:id/status", patch(projects::update_project_status))
        .route("/:id/document", patch(projects::replace_project_document));

    let review_routes = Router::new()
        .route("/", post(reviews::create_review))
        .route(
            "/:id",
            get(reviews::get_review)
                .patch(reviews::update_review)
                .delete(reviews::delete_review),
        );

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/projects", project_routes)
        .nest("/api/reviews", review_routes)
        .layer(middleware::from_extractor_with_state::<Reviewer, _>(protected_state));

    Router::new()
        .merge(protected_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(body_limit))
}

pub(crate) fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}
