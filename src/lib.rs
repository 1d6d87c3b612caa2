use std::path::Path;
use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod config;
pub mod entities;
pub mod error;
pub mod hubspot;
pub mod jobs;
pub mod routes;
pub mod store;

use store::StoreConnector;

/// Shared handler state. Holds no connection; each request opens its own.
#[derive(Clone)]
pub struct AppState {
    pub connector: Arc<dyn StoreConnector>,
}

impl AppState {
    pub fn new(connector: impl StoreConnector + 'static) -> Self {
        Self {
            connector: Arc::new(connector),
        }
    }
}

/// Installs the global `tracing` subscriber; `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = String)
    )
)]
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "Service is healthy")
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HubSpot Deals API",
        version = "1.0.0",
        description = "Manage and view HubSpot deals stored in PostgreSQL."
    ),
    paths(
        health_check,
        routes::deals::create_deal,
        routes::deals::list_deals,
        routes::deals::get_deal
    ),
    components(schemas(
        routes::deals::Deal,
        store::deals::DealCreate
    )),
    tags(
        (name = "Deals", description = "Deal records mirrored from HubSpot")
    )
)]
struct ApiDoc;

/// Create the application with all routes and middleware
pub fn create_app(state: AppState, static_dir: impl AsRef<Path>) -> Router {
    let static_dir = static_dir.as_ref();

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route(
            "/deals",
            get(routes::deals::list_deals).post(routes::deals::create_deal),
        )
        .route("/deals/{id}", get(routes::deals::get_deal))
        .with_state(state);

    let docs_router = SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi());

    // Frontend bundle; not part of the data pipeline.
    let frontend = Router::new()
        .nest_service("/static", ServeDir::new(static_dir))
        .route_service("/", ServeFile::new(static_dir.join("index.html")));

    Router::new()
        .merge(api_routes)
        .merge(docs_router)
        .merge(frontend)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
