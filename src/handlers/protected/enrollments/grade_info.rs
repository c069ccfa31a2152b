// handlers/protected/enrollments/grade_info.rs - POST /api/enrollments/grade-info

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::handlers::expect_action;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::grade_service::{ProfessorGradeView, StudentGrade};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeInfoRequest {
    pub action: String,
    pub lec_serial: String,
    pub student_idx: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum GradeInfo {
    Student(StudentGrade),
    Professor(ProfessorGradeView),
}

/// POST /api/enrollments/grade-info - One student's computed grade.
///
/// `get-grade`: students read their own grade (studentIdx optional, must be
/// themselves); the course professor or an admin names the student.
/// `professor-view`: the same grade plus `statistics {rank, totalStudents,
/// classAverage}`, course professor or admin only.
pub async fn grade_info_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<GradeInfoRequest>, JsonRejection>,
) -> ApiResult<GradeInfo> {
    let Json(request) = payload?;
    expect_action(&request.action, &["get-grade", "professor-view"])?;

    let grades = state.grades();
    let info = if request.action == "professor-view" {
        GradeInfo::Professor(
            grades
                .professor_view(&user, &request.lec_serial, request.student_idx)
                .await?,
        )
    } else {
        GradeInfo::Student(
            grades
                .student_grade(&user, &request.lec_serial, request.student_idx)
                .await?,
        )
    };
    Ok(ApiResponse::success(info))
}
