// handlers/protected/attendance/view.rs - Attendance views

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};

use super::LectureRef;
use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::attendance_service::{CourseAttendance, StudentAttendance};

/// POST /api/attendance/student/view - Own records, requests and summary.
pub async fn student_view_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<LectureRef>, JsonRejection>,
) -> ApiResult<StudentAttendance> {
    let Json(lecture) = payload?;
    let view = state.attendance().student_view(&user, &lecture.lec_serial).await?;
    Ok(ApiResponse::success(view))
}

/// POST /api/attendance/professor/view - Every enrolled student plus pending requests.
pub async fn professor_view_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<LectureRef>, JsonRejection>,
) -> ApiResult<CourseAttendance> {
    let Json(lecture) = payload?;
    let view = state.attendance().professor_view(&user, &lecture.lec_serial).await?;
    Ok(ApiResponse::success(view))
}
