// handlers/protected/enrollments/grade_list.rs - POST /api/enrollments/grade-list

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::grading::ListQuery;
use crate::handlers::expect_action;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::grade_service::GradeListing;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeListRequest {
    pub action: String,
    pub lec_serial: String,
    #[serde(flatten)]
    pub query: ListQuery,
}

/**
 * POST /api/enrollments/grade-list - Every enrolled student's grade, paged
 *
 * Expected Input:
 * ```json
 * { "action": "list-all", "lecSerial": "CS101-01",
 *   "sortBy": "percentage", "sortOrder": "desc", "page": 0, "size": 20 }
 * ```
 *
 * Rows are ranked 1..n in the requested order before paging.
 * Output: `{content, totalElements, totalPages, currentPage, pageSize, sortBy,
 * sortOrder, gradeConfig}`, where `gradeConfig` holds attendanceMaxScore,
 * latePenaltyPerSession and gradeDistribution.
 */
pub async fn grade_list_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<GradeListRequest>, JsonRejection>,
) -> ApiResult<GradeListing> {
    let Json(request) = payload?;
    expect_action(&request.action, &["list-all"])?;

    let page = state
        .grades()
        .list_all(&user, &request.lec_serial, &request.query)
        .await?;
    Ok(ApiResponse::success(page))
}
