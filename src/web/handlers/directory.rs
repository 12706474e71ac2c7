//! Directory handlers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::path::ResourcePath;
use crate::web::dto::{resource_list, ApiResponse, PathQuery, ResourceResponse};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AuthTenant;

/// GET /api/directory - List the immediate content of a directory.
#[utoipa::path(
    get,
    path = "/api/directory",
    tag = "directories",
    params(
        ("path" = String, Query, description = "Directory path ending with '/'; empty for the root")
    ),
    responses(
        (status = 200, description = "Directory content", body = Vec<ResourceResponse>),
        (status = 400, description = "Invalid path"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Directory not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_directory(
    State(state): State<Arc<AppState>>,
    auth: AuthTenant,
    Query(query): Query<PathQuery>,
) -> Result<Json<ApiResponse<Vec<ResourceResponse>>>, ApiError> {
    let path = ResourcePath::parse(&query.path)?;
    let resources = state.resources.list(auth.tenant, &path).await?;
    Ok(Json(ApiResponse::new(resource_list(resources))))
}

/// POST /api/directory - Create an empty directory.
#[utoipa::path(
    post,
    path = "/api/directory",
    tag = "directories",
    params(
        ("path" = String, Query, description = "New directory path ending with '/'")
    ),
    responses(
        (status = 201, description = "Directory created", body = ResourceResponse),
        (status = 400, description = "Invalid path"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Parent directory not found"),
        (status = 409, description = "Directory already exists")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_directory(
    State(state): State<Arc<AppState>>,
    auth: AuthTenant,
    Query(query): Query<PathQuery>,
) -> Result<(StatusCode, Json<ApiResponse<ResourceResponse>>), ApiError> {
    let path = ResourcePath::parse(&query.path)?;
    let resource = state.resources.create_directory(auth.tenant, &path).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(resource.into()))))
}
