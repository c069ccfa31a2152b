// handlers/protected/attendance/approve.rs - POST /api/attendance/approve

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::attendance_service::{ApprovalInput, ApprovalReport};

/**
 * POST /api/attendance/approve - Record one session for many students
 *
 * Expected Input:
 * ```json
 * {
 *   "lecSerial": "CS101-01",
 *   "sessionNumber": 12,
 *   "attendanceRecords": [
 *     { "studentIdx": 31, "status": "출" },
 *     { "studentIdx": 32, "status": "결", "rejectReason": "no evidence" }
 *   ]
 * }
 * ```
 *
 * Each record stands alone: a pending request is resolved (REJECTED for 결),
 * otherwise the mark is written directly. Output reports
 * `{processed, succeeded, failed: [{studentIdx, reason}]}` with HTTP 200 even
 * when some records failed.
 */
pub async fn approve_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<ApprovalInput>, JsonRejection>,
) -> ApiResult<ApprovalReport> {
    let Json(input) = payload?;
    let report = state.attendance().approve(&user, input, chrono::Utc::now()).await?;
    let message = format!("{}/{} records applied", report.succeeded, report.processed);
    Ok(ApiResponse::success(report).with_message(message))
}
