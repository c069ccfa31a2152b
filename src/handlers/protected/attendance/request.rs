// handlers/protected/attendance/request.rs - POST /api/attendance/request

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};

use crate::app::AppState;
use crate::database::models::AttendanceRequest;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::attendance_service::AttendanceRequestInput;

/**
 * POST /api/attendance/request - Ask to be marked present
 *
 * Expected Input:
 * ```json
 * { "lecSerial": "CS101-01", "sessionNumber": 12, "requestReason": "..." }
 * ```
 *
 * The request expires at UTC midnight ATTENDANCE_REQUEST_EXPIRY_DAYS later.
 * Errors: 403 not enrolled, 409 session already recorded or requested,
 * 422 sessionNumber outside 1..=totalSessions.
 */
pub async fn request_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<AttendanceRequestInput>, JsonRejection>,
) -> ApiResult<AttendanceRequest> {
    let Json(input) = payload?;
    let request = state.attendance().request(&user, input, chrono::Utc::now()).await?;
    Ok(ApiResponse::created(request))
}
