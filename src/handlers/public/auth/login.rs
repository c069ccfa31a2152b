// handlers/public/auth/login.rs - POST /api/auth/login handler

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::auth_service::{LoginRequest, TokenResponse};

/**
 * POST /api/auth/login - Authenticate and receive a token pair
 *
 * Expected Input:
 * ```json
 * { "username": "prof.kim", "password": "..." }
 * ```
 *
 * Expected Output (Success):
 * ```json
 * {
 *   "success": true,
 *   "data": {
 *     "accessToken": "eyJ...",
 *     "refreshToken": "eyJ...",
 *     "tokenType": "Bearer",
 *     "expiresIn": 3600,
 *     "user": { "userIdx": 7, "username": "prof.kim", "role": "PROFESSOR", ... }
 *   }
 * }
 * ```
 *
 * Errors: 400 missing fields, 401 bad credentials, 429 too many failed attempts.
 */
pub async fn login_post(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<TokenResponse> {
    let Json(request) = payload?;
    let tokens = state.auth().login(request).await?;
    Ok(ApiResponse::success(tokens))
}
