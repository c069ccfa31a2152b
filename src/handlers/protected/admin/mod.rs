// handlers/protected/admin/mod.rs - Administrator-only handlers
//
// Mounted under /api/admin/* with require_admin_middleware layered after the
// JWT check, so non-admin tokens get 403 before reaching these functions.

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};

use crate::app::AppState;
use crate::database::models::{Facility, User};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::auth_service::CreateUserRequest;
use crate::services::reservation_service::CreateFacilityRequest;

/// POST /api/admin/users/create - Create a student, professor or admin account.
pub async fn user_create_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<User> {
    let Json(request) = payload?;
    let created = state.auth().create_user(&user, request).await?;
    Ok(ApiResponse::created(created))
}

/// POST /api/admin/facilities/create - Register a reservable facility.
pub async fn facility_create_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CreateFacilityRequest>, JsonRejection>,
) -> ApiResult<Facility> {
    let Json(request) = payload?;
    let facility = state.reservations().create_facility(&user, request).await?;
    Ok(ApiResponse::created(facility))
}
