// handlers/protected/enrollments/grade_config.rs - POST /api/enrollments/grade-config

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::grading::GradeConfigUpdate;
use crate::handlers::expect_action;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::grade_service::SavedGradeConfig;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeConfigRequest {
    pub action: String,
    pub lec_serial: String,
    #[serde(flatten)]
    pub update: GradeConfigUpdate,
}

/**
 * POST /api/enrollments/grade-config - Save or read a course's grading policy
 *
 * Expected Input:
 * ```json
 * {
 *   "action": "set-config",
 *   "lecSerial": "CS101-01",
 *   "attendanceMaxScore": 20,
 *   "latePenaltyPerSession": 0.5,
 *   "totalSessions": 80,
 *   "gradeDistribution": { "A": 30, "B": 40, "C": 20, "D": 10 }
 * }
 * ```
 *
 * Omitted fields keep their stored value. `assignmentTotalScore` is accepted
 * and ignored: the assignment total is always the sum of assignment maxScores.
 * A distribution that does not sum to 100 is saved and reported in `warnings`.
 *
 * Errors: 403 not the course professor, 422 out-of-range values.
 */
pub async fn grade_config_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<GradeConfigRequest>, JsonRejection>,
) -> ApiResult<SavedGradeConfig> {
    let Json(request) = payload?;
    expect_action(&request.action, &["set-config", "get-config"])?;

    if request.action == "get-config" {
        let config = state.grades().get_config(&user, &request.lec_serial).await?;
        return Ok(ApiResponse::success(SavedGradeConfig {
            lec_serial: request.lec_serial,
            warnings: config.warnings(),
            config,
        }));
    }

    let saved = state
        .grades()
        .set_config(&user, &request.lec_serial, &request.update, chrono::Utc::now())
        .await?;
    let response = ApiResponse::success(saved);
    Ok(response.with_message("Grade configuration saved"))
}
