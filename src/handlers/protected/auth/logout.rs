// handlers/protected/auth/logout.rs - POST /api/auth/logout handler

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::auth_service::LogoutResponse;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

/**
 * POST /api/auth/logout - Revoke the caller's refresh token
 *
 * Expected Input:
 * ```json
 * { "refreshToken": "eyJ..." }
 * ```
 *
 * The access token stays valid until it expires; clients drop it locally.
 * Errors: 400 when refreshToken is missing, 403 when it belongs to someone else.
 */
pub async fn logout_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<LogoutRequest>, JsonRejection>,
) -> ApiResult<LogoutResponse> {
    let Json(request) = payload?;
    let result = state
        .auth()
        .logout(&user, request.refresh_token.as_deref(), chrono::Utc::now())
        .await?;
    Ok(ApiResponse::success(result).with_message("Logged out"))
}
