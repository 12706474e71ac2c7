//! Router configuration for the HTTP API.

use axum::{
    extract::{DefaultBodyLimit, Request},
    middleware,
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use super::dto::{ResourceResponse, UserResponse};
use super::handlers::{
    self, create_directory, delete_resource, download_resource, get_resource, list_directory,
    me, move_resource, search_resources, upload_resources, AppState,
};
use super::middleware::{create_cors_layer, jwt_auth, JwtState};

/// OpenAPI document of every route.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_resource,
        handlers::delete_resource,
        handlers::download_resource,
        handlers::move_resource,
        handlers::search_resources,
        handlers::upload_resources,
        handlers::list_directory,
        handlers::create_directory,
        handlers::me,
    ),
    components(schemas(ResourceResponse, UserResponse)),
    modifiers(&SecurityAddon),
    tags(
        (name = "resources", description = "Files and directories"),
        (name = "directories", description = "Directory listing and creation"),
        (name = "user", description = "Current user")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the main API router.
pub fn create_router(
    app_state: Arc<AppState>,
    jwt_state: Arc<JwtState>,
    cors_origins: &[String],
) -> Router {
    let resource_routes = Router::new()
        .route(
            "/",
            get(get_resource)
                .delete(delete_resource)
                .post(upload_resources),
        )
        .route("/download", get(download_resource))
        .route("/move", get(move_resource))
        .route("/search", get(search_resources));

    let api_routes = Router::new()
        .nest("/resource", resource_routes)
        .route("/directory", get(list_directory).post(create_directory))
        .route("/user/me", get(me))
        .layer(DefaultBodyLimit::max(app_state.max_upload_size));

    // Clone jwt_state for the middleware closure
    let jwt_state_for_middleware = jwt_state.clone();

    Router::new()
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http().make_span_with(request_span))
                .layer(create_cors_layer(cors_origins))
                .layer(middleware::from_fn(move |req, next| {
                    let state = jwt_state_for_middleware.clone();
                    jwt_auth(state, req, next)
                })),
        )
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Serve the OpenAPI document.
pub fn create_openapi_router() -> Router {
    Router::new().route("/api-docs/openapi.json", get(openapi_json))
}

/// API router plus health check and OpenAPI document.
pub fn create_app(
    app_state: Arc<AppState>,
    jwt_state: Arc<JwtState>,
    cors_origins: &[String],
) -> Router {
    create_router(app_state, jwt_state, cors_origins)
        .merge(create_health_router())
        .merge(create_openapi_router())
}

/// Span for one request. Only the path is recorded: the query may carry a token.
fn request_span(request: &Request) -> tracing::Span {
    tracing::debug_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
    )
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
