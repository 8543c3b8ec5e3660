//! API layer - HTTP handlers and routing
//!
//! JSON endpoints under `/api/v1`:
//! - Post listing, search, lookup and comment submission
//! - Tag cloud and tag listings
//! - Site info and archive
//!
//! The RSS feed is served at `/rss`.

pub mod common;
pub mod feed;
pub mod middleware;
pub mod posts;
pub mod responses;
pub mod site;
pub mod tags;

use axum::{
    http::{header, HeaderValue, Method},
    Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

pub use feed::FeedRenderer;
pub use middleware::{ApiError, AppState};

/// Build the `/api/v1` router
pub fn build_api_router() -> Router<AppState> {
    Router::new()
        .nest("/posts", posts::router())
        .nest("/tags", tags::router())
        .merge(site::router())
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors = cors.allow_origin(origin),
        Err(e) => tracing::warn!(origin = %cors_origin, error = %e, "Ignoring invalid CORS origin"),
    }

    Router::new()
        .nest("/api/v1", build_api_router())
        .merge(feed::router())
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
