// handlers/public/auth/refresh.rs - POST /api/auth/refresh handler

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::auth_service::TokenResponse;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// POST /api/auth/refresh - Exchange a refresh token for a new pair.
///
/// The presented token is revoked, so each refresh token works once.
/// A revoked, expired or access-type token is a 401.
pub async fn refresh_post(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> ApiResult<TokenResponse> {
    let Json(request) = payload?;
    let tokens = state
        .auth()
        .refresh(&request.refresh_token, chrono::Utc::now())
        .await?;
    Ok(ApiResponse::success(tokens))
}
