use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::models::{Enrollment, Lecture, Role};
use crate::database::{DatabaseError, Store};
use crate::grading::{
    class_statistics, compute_grade, finalize, paginate, rank_rows, AssignmentInput, AttendanceTally,
    ClassStatistics, FinalGrade, FinalizeStats, GradeBreakdown, GradeConfig, GradeConfigUpdate,
    GradeDistribution, GradePolicy, GradeRow, LetterGrade, ListQuery, Page, RosterEntry,
};
use crate::middleware::AuthUser;
use crate::services::{
    load_grade_config, require_course_professor, require_enrolled, ServiceError, ServiceResult,
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedGradeConfig {
    pub lec_serial: String,
    pub config: GradeConfig,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentGrade {
    pub lec_serial: String,
    pub student_idx: i64,
    pub student_name: String,
    pub student_id: String,
    #[serde(flatten)]
    pub grade: GradeBreakdown,
    pub percentage: f64,
    pub letter_grade: Option<LetterGrade>,
    pub rank: Option<u32>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub grade_config: GradePolicy,
}

/// A page of `list-all` rows plus the policy they were computed under.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeListing {
    pub grade_config: GradePolicy,
    #[serde(flatten)]
    pub page: Page<GradeRow>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfessorGradeView {
    #[serde(flatten)]
    pub grade: StudentGrade,
    pub statistics: ClassStatistics,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeOptions {
    pub passing_threshold: Option<f64>,
    pub grade_distribution: Option<GradeDistribution>,
    #[serde(default)]
    pub refinalize: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeReport {
    pub lec_serial: String,
    pub finalized_at: DateTime<Utc>,
    pub grades: Vec<FinalGrade>,
    pub stats: FinalizeStats,
}

/// One enrolled student with the grade computed from the current records.
struct RosterRow {
    enrollment: Enrollment,
    student_name: String,
    student_id: String,
    grade: GradeBreakdown,
}

impl RosterRow {
    fn into_student_grade(self, policy: GradePolicy) -> StudentGrade {
        StudentGrade {
            lec_serial: self.enrollment.lec_serial,
            student_idx: self.enrollment.student_idx,
            student_name: self.student_name,
            student_id: self.student_id,
            percentage: self.grade.total.percentage,
            grade: self.grade,
            letter_grade: self.enrollment.letter_grade,
            rank: self.enrollment.rank,
            finalized_at: self.enrollment.finalized_at,
            grade_config: policy,
        }
    }

    fn into_grade_row(self) -> GradeRow {
        GradeRow {
            student_idx: self.enrollment.student_idx,
            student_name: self.student_name,
            student_id: self.student_id,
            percentage: self.grade.total.percentage,
            grade: self.grade,
            letter_grade: self.enrollment.letter_grade,
            rank: 0,
        }
    }
}

pub struct GradeService {
    store: Arc<dyn Store>,
    config: Arc<AppConfig>,
}

impl GradeService {
    pub fn new(store: Arc<dyn Store>, config: Arc<AppConfig>) -> Self {
        Self { store, config }
    }

    pub async fn set_config(
        &self,
        user: &AuthUser,
        lec_serial: &str,
        update: &GradeConfigUpdate,
        now: DateTime<Utc>,
    ) -> ServiceResult<SavedGradeConfig> {
        require_course_professor(self.store.as_ref(), user, lec_serial).await?;

        let current = load_grade_config(self.store.as_ref(), &self.config.grading, lec_serial).await?;
        let config = current.apply(update, now)?;
        self.store.save_grade_config(lec_serial, &config).await?;

        let warnings = config.warnings();
        for warning in &warnings {
            tracing::warn!("Grade config for {}: {}", lec_serial, warning);
        }
        tracing::info!(
            "Grade config saved for {} by {} (attendance max {}, late penalty {}, {} sessions)",
            lec_serial,
            user.username,
            config.attendance_max_score,
            config.late_penalty_per_session,
            config.total_sessions
        );

        Ok(SavedGradeConfig {
            lec_serial: lec_serial.to_string(),
            config,
            warnings,
        })
    }

    pub async fn get_config(&self, user: &AuthUser, lec_serial: &str) -> ServiceResult<GradeConfig> {
        require_course_professor(self.store.as_ref(), user, lec_serial).await?;
        load_grade_config(self.store.as_ref(), &self.config.grading, lec_serial).await
    }

    /// Students may read only their own grade; professors and admins name the student.
    pub async fn student_grade(
        &self,
        user: &AuthUser,
        lec_serial: &str,
        student_idx: Option<i64>,
    ) -> ServiceResult<StudentGrade> {
        let target = match user.role {
            Role::Student => {
                if student_idx.is_some_and(|idx| idx != user.user_id) {
                    tracing::warn!("Student {} tried to read another student's grade", user.username);
                    return Err(ServiceError::Forbidden("Students can only view their own grade".to_string()));
                }
                require_enrolled(self.store.as_ref(), user, lec_serial).await?;
                user.user_id
            }
            Role::Professor | Role::Admin => {
                require_course_professor(self.store.as_ref(), user, lec_serial).await?;
                student_idx.ok_or_else(|| ServiceError::BadRequest("studentIdx is required".to_string()))?
            }
        };

        let (config, rows) = self.compute_roster(lec_serial).await?;
        rows.into_iter()
            .find(|row| row.enrollment.student_idx == target)
            .map(|row| row.into_student_grade(config.policy()))
            .ok_or_else(|| not_enrolled(target, lec_serial))
    }

    pub async fn professor_view(
        &self,
        user: &AuthUser,
        lec_serial: &str,
        student_idx: Option<i64>,
    ) -> ServiceResult<ProfessorGradeView> {
        require_course_professor(self.store.as_ref(), user, lec_serial).await?;
        let student_idx =
            student_idx.ok_or_else(|| ServiceError::BadRequest("studentIdx is required".to_string()))?;

        let (config, rows) = self.compute_roster(lec_serial).await?;
        let percentages: Vec<(i64, f64)> = rows
            .iter()
            .map(|row| (row.enrollment.student_idx, row.grade.total.percentage))
            .collect();
        let statistics =
            class_statistics(&percentages, student_idx).ok_or_else(|| not_enrolled(student_idx, lec_serial))?;

        let grade = rows
            .into_iter()
            .find(|row| row.enrollment.student_idx == student_idx)
            .map(|row| row.into_student_grade(config.policy()))
            .ok_or_else(|| not_enrolled(student_idx, lec_serial))?;

        Ok(ProfessorGradeView { grade, statistics })
    }

    pub async fn list_all(
        &self,
        user: &AuthUser,
        lec_serial: &str,
        query: &ListQuery,
    ) -> ServiceResult<GradeListing> {
        require_course_professor(self.store.as_ref(), user, lec_serial).await?;

        let (config, rows) = self.compute_roster(lec_serial).await?;
        let mut rows: Vec<GradeRow> = rows.into_iter().map(RosterRow::into_grade_row).collect();
        rank_rows(&mut rows, query.sort_by, query.sort_order);
        Ok(GradeListing {
            grade_config: config.policy(),
            page: paginate(rows, query),
        })
    }

    pub async fn finalize(
        &self,
        user: &AuthUser,
        lec_serial: &str,
        options: &FinalizeOptions,
        now: DateTime<Utc>,
    ) -> ServiceResult<FinalizeReport> {
        let lecture: Lecture = require_course_professor(self.store.as_ref(), user, lec_serial).await?;

        let threshold = options
            .passing_threshold
            .unwrap_or(self.config.grading.default_passing_threshold);
        if !threshold.is_finite() || !(0.0..=100.0).contains(&threshold) {
            let mut errors = HashMap::new();
            errors.insert("passingThreshold".to_string(), "must be between 0 and 100".to_string());
            return Err(ServiceError::Validation(errors));
        }

        let (mut config, rows) = self.compute_roster(lec_serial).await?;
        if let Some(distribution) = options.grade_distribution {
            config.grade_distribution = distribution;
            config.validate()?;
        }
        for warning in config.warnings() {
            tracing::warn!("Finalizing {}: {}", lec_serial, warning);
        }

        let roster: Vec<RosterEntry> = rows
            .iter()
            .map(|row| RosterEntry {
                student_idx: row.enrollment.student_idx,
                percentage: row.grade.total.percentage,
            })
            .collect();
        let outcome = finalize(&roster, &config.grade_distribution, threshold)?;

        match self
            .store
            .save_final_grades(&lecture.lec_serial, &outcome.grades, now, options.refinalize)
            .await
        {
            Err(DatabaseError::Conflict(_)) => {
                return Err(ServiceError::Conflict(format!(
                    "Grades for {} are already finalized; pass refinalize to recompute",
                    lec_serial
                )));
            }
            other => other?,
        }

        let counts: Vec<String> = outcome
            .stats
            .grade_counts
            .iter()
            .map(|(letter, count)| format!("{}={}", letter, count))
            .collect();
        tracing::info!(
            "Finalized {} for {} students ({}), average {}",
            lec_serial,
            outcome.stats.total_students,
            counts.join(" "),
            outcome.stats.average_percentage
        );

        Ok(FinalizeReport {
            lec_serial: lecture.lec_serial,
            finalized_at: now,
            grades: outcome.grades,
            stats: outcome.stats,
        })
    }

    /// Load every enrollment of a lecture and compute its grade from current scores.
    async fn compute_roster(&self, lec_serial: &str) -> ServiceResult<(GradeConfig, Vec<RosterRow>)> {
        let store = self.store.as_ref();
        let config = load_grade_config(store, &self.config.grading, lec_serial).await?;
        let assignments = store.list_assignments(lec_serial).await?;

        let scores: HashMap<(i64, i64), f64> = store
            .list_assignment_scores(lec_serial)
            .await?
            .into_iter()
            .map(|s| ((s.assignment_idx, s.student_idx), s.score))
            .collect();

        let mut tallies: HashMap<i64, AttendanceTally> = HashMap::new();
        for record in store.list_attendance(lec_serial, None).await? {
            tallies.entry(record.student_idx).or_default().record(record.status);
        }

        let mut rows = Vec::new();
        for enrollment in store.list_enrollments(lec_serial).await? {
            let student_idx = enrollment.student_idx;
            let (student_name, student_id) = match store.find_user(student_idx).await? {
                Some(user) => (user.name, user.user_code),
                None => {
                    tracing::warn!("Enrollment in {} references missing user {}", lec_serial, student_idx);
                    (String::new(), String::new())
                }
            };

            let inputs: Vec<AssignmentInput> = assignments
                .iter()
                .map(|a| AssignmentInput {
                    assignment_idx: a.assignment_idx,
                    name: a.name.clone(),
                    max_score: a.max_score,
                    score: scores.get(&(a.assignment_idx, student_idx)).copied(),
                })
                .collect();
            let tally = tallies.get(&student_idx).copied().unwrap_or_default();
            let grade = compute_grade(&tally, &inputs, &config);
            tracing::debug!("{} student {}: {}%", lec_serial, student_idx, grade.total.percentage);

            rows.push(RosterRow {
                enrollment,
                student_name,
                student_id,
                grade,
            });
        }

        Ok((config, rows))
    }
}

fn not_enrolled(student_idx: i64, lec_serial: &str) -> ServiceError {
    ServiceError::NotFound(format!("Student {} is not enrolled in {}", student_idx, lec_serial))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{hash_password, MIN_HASH_COST};
    use crate::database::models::{AttendanceRecord, NewAssignment, NewLecture, NewUser};
    use crate::database::MemoryStore;
    use crate::grading::AttendanceStatus;

    struct Fixture {
        service: GradeService,
        store: Arc<MemoryStore>,
        professor: AuthUser,
        students: Vec<AuthUser>,
    }

    async fn add_user(store: &MemoryStore, username: &str, role: Role) -> AuthUser {
        let user = store
            .create_user(NewUser {
                username: username.to_string(),
                user_code: format!("{}-code", username),
                name: username.to_string(),
                email: None,
                role,
                password_hash: hash_password("password", MIN_HASH_COST).unwrap(),
            })
            .await
            .unwrap();
        AuthUser {
            user_id: user.user_idx,
            username: user.username,
            role,
        }
    }

    async fn fixture(student_count: usize) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let professor = add_user(&store, "prof", Role::Professor).await;
        store
            .create_lecture(NewLecture {
                lec_serial: "CS101".to_string(),
                title: "Intro".to_string(),
                professor_idx: professor.user_id,
            })
            .await
            .unwrap();

        let mut students = Vec::new();
        for i in 0..student_count {
            let student = add_user(&store, &format!("s{}", i), Role::Student).await;
            store.enroll("CS101", student.user_id).await.unwrap();
            students.push(student);
        }

        let service = GradeService::new(store.clone(), Arc::new(AppConfig::development()));
        Fixture {
            service,
            store,
            professor,
            students,
        }
    }

    async fn mark(store: &MemoryStore, student: i64, sessions: u32, status: AttendanceStatus) {
        for session in 1..=sessions {
            store
                .record_attendance(
                    AttendanceRecord {
                        lec_serial: "CS101".to_string(),
                        session_number: session,
                        student_idx: student,
                        status,
                        approved_by: None,
                        approved_at: Utc::now(),
                        auto_approved: false,
                    },
                    None,
                )
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn set_config_keeps_omitted_fields() {
        let f = fixture(1).await;
        let first = GradeConfigUpdate {
            attendance_max_score: Some(80.0),
            late_penalty_per_session: Some(0.5),
            total_sessions: Some(20),
            ..Default::default()
        };
        f.service.set_config(&f.professor, "CS101", &first, Utc::now()).await.unwrap();

        let second = GradeConfigUpdate {
            total_sessions: Some(16),
            ..Default::default()
        };
        let saved = f.service.set_config(&f.professor, "CS101", &second, Utc::now()).await.unwrap();
        assert_eq!(saved.config.attendance_max_score, 80.0);
        assert_eq!(saved.config.late_penalty_per_session, 0.5);
        assert_eq!(saved.config.total_sessions, 16);
    }

    #[tokio::test]
    async fn uneven_distribution_is_saved_with_warning() {
        let f = fixture(1).await;
        let update = GradeConfigUpdate {
            grade_distribution: Some(GradeDistribution { a: 50.0, b: 50.0, c: 50.0, d: 0.0 }),
            ..Default::default()
        };
        let saved = f.service.set_config(&f.professor, "CS101", &update, Utc::now()).await.unwrap();
        assert_eq!(saved.warnings.len(), 1);
    }

    #[tokio::test]
    async fn assignment_total_follows_assignments() {
        let f = fixture(1).await;
        for max in [30.0, 50.0] {
            f.store
                .create_assignment(NewAssignment {
                    lec_serial: "CS101".to_string(),
                    name: "HW".to_string(),
                    max_score: max,
                    due_at: None,
                })
                .await
                .unwrap();
        }
        let update: GradeConfigUpdate = serde_json::from_value(serde_json::json!({
            "assignmentTotalScore": 1,
            "assignmentTotalMaxScore": 1
        }))
        .unwrap();
        let saved = f.service.set_config(&f.professor, "CS101", &update, Utc::now()).await.unwrap();
        assert_eq!(saved.config.assignment_total_max_score, 80.0);
    }

    #[tokio::test]
    async fn student_cannot_read_classmate() {
        let f = fixture(2).await;
        let other = f.students[1].user_id;
        let result = f.service.student_grade(&f.students[0], "CS101", Some(other)).await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));

        let own = f.service.student_grade(&f.students[0], "CS101", None).await.unwrap();
        assert_eq!(own.student_idx, f.students[0].user_id);
    }

    #[tokio::test]
    async fn professor_view_reports_class_rank() {
        let f = fixture(3).await;
        let update = GradeConfigUpdate {
            total_sessions: Some(10),
            ..Default::default()
        };
        f.service.set_config(&f.professor, "CS101", &update, Utc::now()).await.unwrap();
        mark(&f.store, f.students[0].user_id, 10, AttendanceStatus::Present).await;
        mark(&f.store, f.students[1].user_id, 5, AttendanceStatus::Present).await;

        let view = f
            .service
            .professor_view(&f.professor, "CS101", Some(f.students[1].user_id))
            .await
            .unwrap();
        assert_eq!(view.statistics.rank, 2);
        assert_eq!(view.statistics.total_students, 3);
        assert_eq!(view.statistics.class_average, 50.0);
    }

    #[tokio::test]
    async fn finalize_refuses_second_run_without_flag() {
        let f = fixture(4).await;
        mark(&f.store, f.students[0].user_id, 80, AttendanceStatus::Present).await;

        let report = f
            .service
            .finalize(&f.professor, "CS101", &FinalizeOptions::default(), Utc::now())
            .await
            .unwrap();
        assert_eq!(report.stats.total_students, 4);
        assert_eq!(report.stats.passing_students, 1);

        let again = f
            .service
            .finalize(&f.professor, "CS101", &FinalizeOptions::default(), Utc::now())
            .await;
        assert!(matches!(again, Err(ServiceError::Conflict(_))));

        let options = FinalizeOptions {
            refinalize: true,
            ..Default::default()
        };
        assert!(f.service.finalize(&f.professor, "CS101", &options, Utc::now()).await.is_ok());

        let enrollment = f.store.find_enrollment("CS101", f.students[0].user_id).await.unwrap().unwrap();
        assert_eq!(enrollment.letter_grade, Some(LetterGrade::A));
        assert_eq!(enrollment.rank, Some(1));
    }

    #[tokio::test]
    async fn other_professor_is_forbidden() {
        let f = fixture(1).await;
        let stranger = add_user(&f.store, "other-prof", Role::Professor).await;
        let result = f.service.list_all(&stranger, "CS101", &ListQuery::default()).await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));
    }
}
