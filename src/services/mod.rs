use std::collections::HashMap;
use thiserror::Error;

use crate::auth::JwtError;
use crate::config::GradingConfig;
use crate::database::models::{Enrollment, Lecture, Role};
use crate::database::{DatabaseError, Store};
use crate::grading::{GradeConfig, GradeError};
use crate::middleware::AuthUser;

pub mod attendance_service;
pub mod auth_service;
pub mod board_service;
pub mod course_service;
pub mod grade_service;
pub mod reservation_service;

pub use attendance_service::AttendanceService;
pub use auth_service::{AuthService, LoginRateLimiter};
pub use board_service::BoardService;
pub use course_service::CourseService;
pub use grade_service::GradeService;
pub use reservation_service::ReservationService;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    BadRequest(String),

    #[error("validation failed: {0:?}")]
    Validation(HashMap<String, String>),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    TooManyRequests(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Grade(#[from] GradeError),

    #[error(transparent)]
    Token(#[from] JwtError),

    #[error("password hashing failed: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    #[error("{0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

pub(crate) fn require_role(user: &AuthUser, allowed: &[Role]) -> ServiceResult<()> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        tracing::warn!("User {} ({}) denied: requires one of {:?}", user.username, user.role, allowed);
        Err(ServiceError::Forbidden("You do not have permission to perform this action".to_string()))
    }
}

pub(crate) async fn load_lecture(store: &dyn Store, lec_serial: &str) -> ServiceResult<Lecture> {
    store
        .find_lecture(lec_serial)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Lecture '{}' not found", lec_serial)))
}

/// The lecture's own professor, or an admin.
pub(crate) async fn require_course_professor(
    store: &dyn Store,
    user: &AuthUser,
    lec_serial: &str,
) -> ServiceResult<Lecture> {
    let lecture = load_lecture(store, lec_serial).await?;
    let allowed = match user.role {
        Role::Admin => true,
        Role::Professor => lecture.professor_idx == user.user_id,
        Role::Student => false,
    };
    if !allowed {
        tracing::warn!("User {} is not the professor of {}", user.username, lec_serial);
        return Err(ServiceError::Forbidden(
            "Only the professor of this lecture can perform this action".to_string(),
        ));
    }
    Ok(lecture)
}

/// The calling student's enrollment in the lecture.
pub(crate) async fn require_enrolled(
    store: &dyn Store,
    user: &AuthUser,
    lec_serial: &str,
) -> ServiceResult<Enrollment> {
    require_role(user, &[Role::Student])?;
    load_lecture(store, lec_serial).await?;
    store
        .find_enrollment(lec_serial, user.user_id)
        .await?
        .ok_or_else(|| ServiceError::Forbidden("You are not enrolled in this lecture".to_string()))
}

/// Stored grading policy of a lecture, falling back to the configured defaults.
/// `assignment_total_max_score` is always recomputed from the lecture's assignments.
pub(crate) async fn load_grade_config(
    store: &dyn Store,
    defaults: &GradingConfig,
    lec_serial: &str,
) -> ServiceResult<GradeConfig> {
    let mut config = store
        .get_grade_config(lec_serial)
        .await?
        .unwrap_or_else(|| GradeConfig::with_defaults(defaults));
    config.assignment_total_max_score = store
        .list_assignments(lec_serial)
        .await?
        .iter()
        .map(|a| a.max_score)
        .sum();
    Ok(config)
}
