// handlers/protected/enrollments/grade_finalize.rs - POST /api/enrollments/grade-finalize

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::handlers::expect_action;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::grade_service::{FinalizeOptions, FinalizeReport};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    pub action: String,
    pub lec_serial: String,
    #[serde(flatten)]
    pub options: FinalizeOptions,
}

/**
 * POST /api/enrollments/grade-finalize - Assign letter grades to the roster
 *
 * Expected Input:
 * ```json
 * { "action": "finalize", "lecSerial": "CS101-01",
 *   "passingThreshold": 60,
 *   "gradeDistribution": { "A": 30, "B": 40, "C": 20, "D": 10 },
 *   "refinalize": false }
 * ```
 *
 * passingThreshold defaults to GRADING_DEFAULT_PASSING_THRESHOLD and the
 * distribution to the stored config. Letter grade, rank and finalizedAt are
 * written to every enrollment in one transaction.
 *
 * Errors: 400 empty roster, 409 already finalized without refinalize,
 * 422 invalid threshold or distribution.
 */
pub async fn grade_finalize_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<FinalizeRequest>, JsonRejection>,
) -> ApiResult<FinalizeReport> {
    let Json(request) = payload?;
    expect_action(&request.action, &["finalize"])?;

    let report = state
        .grades()
        .finalize(&user, &request.lec_serial, &request.options, chrono::Utc::now())
        .await?;
    let message = format!("Finalized grades for {} students", report.stats.total_students);
    Ok(ApiResponse::success(report).with_message(message))
}
