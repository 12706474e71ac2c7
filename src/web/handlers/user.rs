//! User handlers.

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::web::dto::{ApiResponse, UserResponse};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AuthTenant;

/// GET /api/user/me - Get the current user.
///
/// Also makes sure the user's root directory exists.
#[utoipa::path(
    get,
    path = "/api/user/me",
    tag = "user",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn me(
    State(state): State<Arc<AppState>>,
    auth: AuthTenant,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    state.resources.provision_tenant(auth.tenant).await?;
    Ok(Json(ApiResponse::new(UserResponse {
        username: auth.username,
    })))
}
