//! cdp-api library - deep populate content service
//!
//! Read-only HTTP surface over the content store: content queries with
//! populate directives, plan preview and registry listing.

use std::sync::Arc;

use axum::Router;
use cdp_common::{ContentTypeRegistry, SchemaRegistry, Settings};
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod directive;
pub mod pagination;
pub mod query;
pub mod response;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Content store connection pool (read-only)
    pub db: SqlitePool,
    pub schemas: Arc<SchemaRegistry>,
    /// Content-type identifiers known to the sanitizer
    pub content_types: Arc<ContentTypeRegistry>,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Create new application state; the content-type registry is derived
    /// from the schemas
    pub fn new(db: SqlitePool, schemas: SchemaRegistry, settings: Settings) -> Self {
        let content_types = ContentTypeRegistry::from_schemas(&schemas);
        Self {
            db,
            schemas: Arc::new(schemas),
            content_types: Arc::new(content_types),
            settings: Arc::new(settings),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    let content = Router::new()
        .route("/api/content/:uid", get(api::get_content))
        .route("/api/content-types", get(api::list_content_types))
        .route("/api/plan/:uid", get(api::get_plan))
        .route("/api/buildinfo", get(api::get_build_info));

    Router::new()
        .merge(content)
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // Enable CORS for browser clients
        .layer(CorsLayer::permissive())
}
