// handlers/protected/courses/lecture.rs - Lecture creation and enrollment

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::database::models::{Enrollment, Lecture};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::course_service::CreateLectureRequest;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollRequest {
    pub lec_serial: String,
}

/// POST /api/lectures/create - Professors open lectures for themselves;
/// admins pass `professorIdx`.
pub async fn lecture_create_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CreateLectureRequest>, JsonRejection>,
) -> ApiResult<Lecture> {
    let Json(request) = payload?;
    let lecture = state.courses().create_lecture(&user, request).await?;
    Ok(ApiResponse::created(lecture))
}

/// POST /api/enrollments/enroll - The calling student joins a lecture.
pub async fn enroll_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<EnrollRequest>, JsonRejection>,
) -> ApiResult<Enrollment> {
    let Json(request) = payload?;
    let enrollment = state.courses().enroll(&user, &request.lec_serial).await?;
    Ok(ApiResponse::created(enrollment))
}
