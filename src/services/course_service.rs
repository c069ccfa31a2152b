use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::database::models::{Assignment, AssignmentGrade, Enrollment, Lecture, NewAssignment, NewLecture, Role};
use crate::database::Store;
use crate::middleware::AuthUser;
use crate::services::{load_lecture, require_course_professor, require_role, ServiceError, ServiceResult};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLectureRequest {
    pub lec_serial: String,
    pub title: String,
    /// Required when an admin opens a lecture on behalf of a professor.
    pub professor_idx: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssignmentRequest {
    pub lec_serial: String,
    pub name: String,
    pub max_score: f64,
    pub due_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeAssignmentRequest {
    pub assignment_idx: i64,
    pub student_idx: i64,
    pub score: f64,
}

/// Lectures, enrollment and assignments: the records grades are computed from.
pub struct CourseService {
    store: Arc<dyn Store>,
}

impl CourseService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create_lecture(&self, user: &AuthUser, request: CreateLectureRequest) -> ServiceResult<Lecture> {
        require_role(user, &[Role::Professor, Role::Admin])?;

        let mut errors = HashMap::new();
        let lec_serial = request.lec_serial.trim();
        if lec_serial.is_empty() {
            errors.insert("lecSerial".to_string(), "is required".to_string());
        }
        if request.title.trim().is_empty() {
            errors.insert("title".to_string(), "is required".to_string());
        }

        let professor_idx = match (user.role, request.professor_idx) {
            (Role::Admin, Some(idx)) => idx,
            (Role::Admin, None) => {
                errors.insert("professorIdx".to_string(), "is required".to_string());
                0
            }
            _ => user.user_id,
        };
        if !errors.is_empty() {
            return Err(ServiceError::Validation(errors));
        }

        let professor = self
            .store
            .find_user(professor_idx)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", professor_idx)))?;
        if professor.role != Role::Professor {
            return Err(ServiceError::BadRequest(format!(
                "User {} is not a professor",
                professor_idx
            )));
        }

        let lecture = self
            .store
            .create_lecture(NewLecture {
                lec_serial: lec_serial.to_string(),
                title: request.title.trim().to_string(),
                professor_idx,
            })
            .await?;

        tracing::info!("Lecture {} opened for professor {}", lecture.lec_serial, professor.username);
        Ok(lecture)
    }

    pub async fn enroll(&self, user: &AuthUser, lec_serial: &str) -> ServiceResult<Enrollment> {
        require_role(user, &[Role::Student])?;
        load_lecture(self.store.as_ref(), lec_serial).await?;

        let enrollment = self.store.enroll(lec_serial, user.user_id).await?;
        tracing::info!("Student {} enrolled in {}", user.username, lec_serial);
        Ok(enrollment)
    }

    pub async fn create_assignment(
        &self,
        user: &AuthUser,
        request: CreateAssignmentRequest,
    ) -> ServiceResult<Assignment> {
        require_course_professor(self.store.as_ref(), user, &request.lec_serial).await?;

        let mut errors = HashMap::new();
        if request.name.trim().is_empty() {
            errors.insert("name".to_string(), "is required".to_string());
        }
        if !request.max_score.is_finite() || request.max_score <= 0.0 {
            errors.insert("maxScore".to_string(), "must be greater than 0".to_string());
        }
        if !errors.is_empty() {
            return Err(ServiceError::Validation(errors));
        }

        let assignment = self
            .store
            .create_assignment(NewAssignment {
                lec_serial: request.lec_serial,
                name: request.name.trim().to_string(),
                max_score: request.max_score,
                due_at: request.due_at,
            })
            .await?;

        tracing::info!(
            "Assignment '{}' ({} pts) created in {}",
            assignment.name,
            assignment.max_score,
            assignment.lec_serial
        );
        Ok(assignment)
    }

    pub async fn grade_assignment(
        &self,
        user: &AuthUser,
        request: GradeAssignmentRequest,
    ) -> ServiceResult<AssignmentGrade> {
        let assignment = self
            .store
            .find_assignment(request.assignment_idx)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Assignment {} not found", request.assignment_idx)))?;
        require_course_professor(self.store.as_ref(), user, &assignment.lec_serial).await?;

        if self
            .store
            .find_enrollment(&assignment.lec_serial, request.student_idx)
            .await?
            .is_none()
        {
            return Err(ServiceError::NotFound(format!(
                "Student {} is not enrolled in {}",
                request.student_idx, assignment.lec_serial
            )));
        }

        if !request.score.is_finite() || request.score < 0.0 || request.score > assignment.max_score {
            let mut errors = HashMap::new();
            errors.insert(
                "score".to_string(),
                format!("must be between 0 and {}", assignment.max_score),
            );
            return Err(ServiceError::Validation(errors));
        }

        let grade = self
            .store
            .save_assignment_score(assignment.assignment_idx, request.student_idx, request.score)
            .await?;
        tracing::debug!(
            "Scored student {} on assignment {}: {}",
            grade.student_idx,
            grade.assignment_idx,
            grade.score
        );
        Ok(grade)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{hash_password, MIN_HASH_COST};
    use crate::database::models::NewUser;
    use crate::database::MemoryStore;

    async fn seed(store: &MemoryStore, username: &str, role: Role) -> AuthUser {
        let user = store
            .create_user(NewUser {
                username: username.to_string(),
                user_code: username.to_uppercase(),
                name: username.to_string(),
                email: None,
                role,
                password_hash: hash_password("password123", MIN_HASH_COST).unwrap(),
            })
            .await
            .unwrap();
        AuthUser {
            user_id: user.user_idx,
            username: user.username,
            role,
        }
    }

    fn lecture(professor_idx: Option<i64>) -> CreateLectureRequest {
        CreateLectureRequest {
            lec_serial: "CS101".to_string(),
            title: "Intro to CS".to_string(),
            professor_idx,
        }
    }

    #[tokio::test]
    async fn admin_must_name_a_professor() {
        let store = Arc::new(MemoryStore::new());
        let admin = seed(&store, "root", Role::Admin).await;
        let student = seed(&store, "kim", Role::Student).await;
        let professor = seed(&store, "lee", Role::Professor).await;
        let service = CourseService::new(store.clone());

        assert!(matches!(
            service.create_lecture(&admin, lecture(None)).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            service.create_lecture(&admin, lecture(Some(student.user_id))).await,
            Err(ServiceError::BadRequest(_))
        ));
        assert!(matches!(
            service.create_lecture(&student, lecture(None)).await,
            Err(ServiceError::Forbidden(_))
        ));

        let opened = service
            .create_lecture(&admin, lecture(Some(professor.user_id)))
            .await
            .unwrap();
        assert_eq!(opened.professor_idx, professor.user_id);
    }

    #[tokio::test]
    async fn scores_are_bounded_and_need_enrollment() {
        let store = Arc::new(MemoryStore::new());
        let professor = seed(&store, "lee", Role::Professor).await;
        let enrolled = seed(&store, "kim", Role::Student).await;
        let outsider = seed(&store, "park", Role::Student).await;
        let service = CourseService::new(store.clone());

        service.create_lecture(&professor, lecture(None)).await.unwrap();
        service.enroll(&enrolled, "CS101").await.unwrap();
        assert!(matches!(
            service.enroll(&professor, "CS101").await,
            Err(ServiceError::Forbidden(_))
        ));

        let assignment = service
            .create_assignment(
                &professor,
                CreateAssignmentRequest {
                    lec_serial: "CS101".to_string(),
                    name: "Lab 1".to_string(),
                    max_score: 10.0,
                    due_at: None,
                },
            )
            .await
            .unwrap();

        let score = |student_idx: i64, score: f64| GradeAssignmentRequest {
            assignment_idx: assignment.assignment_idx,
            student_idx,
            score,
        };
        assert!(matches!(
            service.grade_assignment(&professor, score(enrolled.user_id, 11.0)).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            service.grade_assignment(&professor, score(outsider.user_id, 5.0)).await,
            Err(ServiceError::NotFound(_))
        ));
        let saved = service
            .grade_assignment(&professor, score(enrolled.user_id, 9.5))
            .await
            .unwrap();
        assert_eq!(saved.score, 9.5);
    }
}
