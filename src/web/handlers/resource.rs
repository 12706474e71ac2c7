//! Resource handlers: info, delete, download, move, search and upload.

use axum::{
    body::Body,
    extract::{multipart::MultipartError, Multipart, Query, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use futures::TryStreamExt;
use std::sync::Arc;

use crate::path::ResourcePath;
use crate::resource::UploadFile;
use crate::web::dto::{
    resource_list, ApiResponse, MoveQuery, PathQuery, ResourceResponse, SearchQuery,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AuthTenant;
use crate::CloudshelfError;

/// Multipart field carrying uploaded files.
pub const UPLOAD_FIELD: &str = "object";

/// Generate a safe Content-Disposition header value for downloads.
///
/// Control characters are removed and quotes/backslashes replaced in the plain
/// `filename` parameter; non-ASCII names are also sent RFC 5987 encoded.
fn content_disposition_header(filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' => '_',
            _ => c,
        })
        .collect();

    if filename.is_ascii() && sanitized == filename {
        return format!("attachment; filename=\"{}\"", filename);
    }

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized,
        urlencoding::encode(filename)
    )
}

/// GET /api/resource - Get resource info.
#[utoipa::path(
    get,
    path = "/api/resource",
    tag = "resources",
    params(
        ("path" = String, Query, description = "Resource path; directories end with '/'")
    ),
    responses(
        (status = 200, description = "Resource info", body = ResourceResponse),
        (status = 400, description = "Invalid path"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Resource not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_resource(
    State(state): State<Arc<AppState>>,
    auth: AuthTenant,
    Query(query): Query<PathQuery>,
) -> Result<Json<ApiResponse<ResourceResponse>>, ApiError> {
    let path = ResourcePath::parse(&query.path)?;
    let resource = state.resources.info(auth.tenant, &path).await?;
    Ok(Json(ApiResponse::new(resource.into())))
}

/// DELETE /api/resource - Delete a file or a directory with its content.
#[utoipa::path(
    delete,
    path = "/api/resource",
    tag = "resources",
    params(
        ("path" = String, Query, description = "Resource path; directories end with '/'")
    ),
    responses(
        (status = 204, description = "Resource deleted"),
        (status = 400, description = "Invalid path"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Resource not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_resource(
    State(state): State<Arc<AppState>>,
    auth: AuthTenant,
    Query(query): Query<PathQuery>,
) -> Result<StatusCode, ApiError> {
    let path = ResourcePath::parse(&query.path)?;
    state.resources.delete(auth.tenant, &path).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/resource/download - Download a file, or a directory as a zip archive.
#[utoipa::path(
    get,
    path = "/api/resource/download",
    tag = "resources",
    params(
        ("path" = String, Query, description = "Resource path; directories end with '/'")
    ),
    responses(
        (status = 200, description = "Binary content; a zip archive for directories"),
        (status = 400, description = "Invalid path"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Resource not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn download_resource(
    State(state): State<Arc<AppState>>,
    auth: AuthTenant,
    Query(query): Query<PathQuery>,
) -> Result<Response, ApiError> {
    let path = ResourcePath::parse(&query.path)?;
    let download = state.resources.download(auth.tenant, &path).await?;

    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_header(&download.filename),
        );
    if let Some(size) = download.size {
        builder = builder.header(header::CONTENT_LENGTH, size);
    }

    builder
        .body(Body::from_stream(download.body))
        .map_err(|e| {
            tracing::error!("Failed to build download response: {}", e);
            ApiError::internal("Failed to build response")
        })
}

/// GET /api/resource/move - Move or rename a resource.
#[utoipa::path(
    get,
    path = "/api/resource/move",
    tag = "resources",
    params(
        ("from" = String, Query, description = "Current path"),
        ("to" = String, Query, description = "New path")
    ),
    responses(
        (status = 200, description = "Resource at its new path", body = ResourceResponse),
        (status = 400, description = "Invalid path"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Source not found"),
        (status = 409, description = "Destination already exists")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn move_resource(
    State(state): State<Arc<AppState>>,
    auth: AuthTenant,
    Query(query): Query<MoveQuery>,
) -> Result<Json<ApiResponse<ResourceResponse>>, ApiError> {
    let from = ResourcePath::parse(&query.from)?;
    let to = ResourcePath::parse(&query.to)?;
    let resource = state.resources.move_resource(auth.tenant, &from, &to).await?;
    Ok(Json(ApiResponse::new(resource.into())))
}

/// GET /api/resource/search - Find resources by name.
#[utoipa::path(
    get,
    path = "/api/resource/search",
    tag = "resources",
    params(
        ("query" = String, Query, description = "Case-insensitive name fragment")
    ),
    responses(
        (status = 200, description = "Matching resources", body = Vec<ResourceResponse>),
        (status = 400, description = "Invalid query"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn search_resources(
    State(state): State<Arc<AppState>>,
    auth: AuthTenant,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ApiResponse<Vec<ResourceResponse>>>, ApiError> {
    let resources = state.resources.search(auth.tenant, &query.query).await?;
    Ok(Json(ApiResponse::new(resource_list(resources))))
}

/// POST /api/resource - Upload files into a directory.
///
/// Request body: multipart/form-data with one or more `object` file fields.
#[utoipa::path(
    post,
    path = "/api/resource",
    tag = "resources",
    params(
        ("path" = String, Query, description = "Target directory, ending with '/'")
    ),
    responses(
        (status = 201, description = "Uploaded files", body = Vec<ResourceResponse>),
        (status = 400, description = "Invalid path, empty file or request too large"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "A resource already exists at a target path")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn upload_resources(
    State(state): State<Arc<AppState>>,
    auth: AuthTenant,
    Query(query): Query<PathQuery>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<Vec<ResourceResponse>>>), ApiError> {
    let path = ResourcePath::parse(&query.path)?;

    // Each field is streamed into the store as it arrives; the body limit layer caps the
    // request as a whole.
    let mut upload = state.resources.begin_upload(auth.tenant, &path)?;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .ok_or_else(|| ApiError::bad_request("Uploaded part has no filename"))?;
        upload
            .write(UploadFile::from_stream(filename, field.map_err(multipart_error)))
            .await?;
    }

    let created = upload.finish();
    if created.is_empty() {
        return Err(ApiError::bad_request("No file provided"));
    }
    Ok((StatusCode::CREATED, Json(ApiResponse::new(resource_list(created)))))
}

fn multipart_error(e: MultipartError) -> CloudshelfError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return CloudshelfError::PayloadTooLarge(e.body_text());
    }
    tracing::debug!("Failed to read multipart field: {}", e);
    CloudshelfError::InvalidUpload(e.body_text())
}
