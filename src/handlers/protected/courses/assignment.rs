// handlers/protected/courses/assignment.rs - Assignments and their scores

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};

use crate::app::AppState;
use crate::database::models::{Assignment, AssignmentGrade};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::course_service::{CreateAssignmentRequest, GradeAssignmentRequest};

/// POST /api/assignments/create - Add an assignment; its maxScore joins the course total.
pub async fn assignment_create_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CreateAssignmentRequest>, JsonRejection>,
) -> ApiResult<Assignment> {
    let Json(request) = payload?;
    let assignment = state.courses().create_assignment(&user, request).await?;
    Ok(ApiResponse::created(assignment))
}

/// POST /api/assignments/grade - Record or overwrite a student's score.
pub async fn assignment_grade_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<GradeAssignmentRequest>, JsonRejection>,
) -> ApiResult<AssignmentGrade> {
    let Json(request) = payload?;
    let grade = state.courses().grade_assignment(&user, request).await?;
    Ok(ApiResponse::success(grade))
}
