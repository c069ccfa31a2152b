use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::*;
use crate::database::store::Store;
use crate::grading::{AttendanceStatus, FinalGrade, GradeConfig, GradeDistribution, LetterGrade};

/// Postgres-backed store. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn decode_error(message: String) -> DatabaseError {
    DatabaseError::Sqlx(sqlx::Error::Decode(message.into()))
}

fn parse_column<T>(row: &PgRow, column: &str) -> Result<T, DatabaseError>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(decode_error)
}

fn user_from_row(row: &PgRow) -> Result<User, DatabaseError> {
    Ok(User {
        user_idx: row.try_get("user_idx")?,
        username: row.try_get("username")?,
        user_code: row.try_get("user_code")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        role: parse_column(row, "role")?,
        password_hash: row.try_get("password_hash")?,
        created_at: row.try_get("created_at")?,
    })
}

fn lecture_from_row(row: &PgRow) -> Result<Lecture, DatabaseError> {
    Ok(Lecture {
        lec_serial: row.try_get("lec_serial")?,
        title: row.try_get("title")?,
        professor_idx: row.try_get("professor_idx")?,
        created_at: row.try_get("created_at")?,
    })
}

fn enrollment_from_row(row: &PgRow) -> Result<Enrollment, DatabaseError> {
    let letter: Option<String> = row.try_get("letter_grade")?;
    let rank: Option<i32> = row.try_get("grade_rank")?;
    Ok(Enrollment {
        lec_serial: row.try_get("lec_serial")?,
        student_idx: row.try_get("student_idx")?,
        enrolled_at: row.try_get("enrolled_at")?,
        letter_grade: letter
            .map(|l| l.parse::<LetterGrade>())
            .transpose()
            .map_err(decode_error)?,
        rank: rank.map(|r| r as u32),
        finalized_at: row.try_get("finalized_at")?,
    })
}

fn grade_config_from_row(row: &PgRow) -> Result<GradeConfig, DatabaseError> {
    let distribution: Json<GradeDistribution> = row.try_get("grade_distribution")?;
    let total_sessions: i32 = row.try_get("total_sessions")?;
    Ok(GradeConfig {
        attendance_max_score: row.try_get("attendance_max_score")?,
        late_penalty_per_session: row.try_get("late_penalty_per_session")?,
        total_sessions: total_sessions.max(0) as u32,
        grade_distribution: distribution.0,
        assignment_total_max_score: 0.0,
        configured_at: row.try_get("configured_at")?,
    })
}

fn assignment_from_row(row: &PgRow) -> Result<Assignment, DatabaseError> {
    Ok(Assignment {
        assignment_idx: row.try_get("assignment_idx")?,
        lec_serial: row.try_get("lec_serial")?,
        name: row.try_get("name")?,
        max_score: row.try_get("max_score")?,
        due_at: row.try_get("due_at")?,
        created_at: row.try_get("created_at")?,
    })
}

fn assignment_grade_from_row(row: &PgRow) -> Result<AssignmentGrade, DatabaseError> {
    Ok(AssignmentGrade {
        assignment_idx: row.try_get("assignment_idx")?,
        student_idx: row.try_get("student_idx")?,
        score: row.try_get("score")?,
        graded_at: row.try_get("graded_at")?,
    })
}

fn attendance_from_row(row: &PgRow) -> Result<AttendanceRecord, DatabaseError> {
    let session: i32 = row.try_get("session_number")?;
    Ok(AttendanceRecord {
        lec_serial: row.try_get("lec_serial")?,
        session_number: session.max(0) as u32,
        student_idx: row.try_get("student_idx")?,
        status: parse_column::<AttendanceStatus>(row, "status")?,
        approved_by: row.try_get("approved_by")?,
        approved_at: row.try_get("approved_at")?,
        auto_approved: row.try_get("auto_approved")?,
    })
}

fn request_from_row(row: &PgRow) -> Result<AttendanceRequest, DatabaseError> {
    let session: i32 = row.try_get("session_number")?;
    Ok(AttendanceRequest {
        request_idx: row.try_get("request_idx")?,
        lec_serial: row.try_get("lec_serial")?,
        session_number: session.max(0) as u32,
        student_idx: row.try_get("student_idx")?,
        request_reason: row.try_get("request_reason")?,
        status: parse_column(row, "status")?,
        requested_at: row.try_get("requested_at")?,
        expires_at: row.try_get("expires_at")?,
        resolved_at: row.try_get("resolved_at")?,
        resolved_by: row.try_get("resolved_by")?,
        reject_reason: row.try_get("reject_reason")?,
    })
}

fn reservation_from_row(row: &PgRow) -> Result<Reservation, DatabaseError> {
    Ok(Reservation {
        reservation_idx: row.try_get("reservation_idx")?,
        facility_idx: row.try_get("facility_idx")?,
        user_idx: row.try_get("user_idx")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        party_size: row.try_get("party_size")?,
        purpose: row.try_get("purpose")?,
        status: parse_column(row, "status")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn collect<T>(rows: Vec<PgRow>, map: fn(&PgRow) -> Result<T, DatabaseError>) -> Result<Vec<T>, DatabaseError> {
    rows.iter().map(map).collect()
}

const USER_COLUMNS: &str = "user_idx, username, user_code, name, email, role, password_hash, created_at";
const ENROLLMENT_COLUMNS: &str = "lec_serial, student_idx, enrolled_at, letter_grade, grade_rank, finalized_at";
const REQUEST_COLUMNS: &str = "request_idx, lec_serial, session_number, student_idx, request_reason, status, \
     requested_at, expires_at, resolved_at, resolved_by, reject_reason";
const RESERVATION_COLUMNS: &str = "reservation_idx, facility_idx, user_idx, start_time, end_time, party_size, \
     purpose, status, created_at, updated_at";

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }

    async fn create_user(&self, user: NewUser) -> Result<User, DatabaseError> {
        let sql = format!(
            "INSERT INTO users (username, user_code, name, email, role, password_hash) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            USER_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(&user.username)
            .bind(&user.user_code)
            .bind(&user.name)
            .bind(&user.email)
            .bind(user.role.as_str())
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_unique_violation(e, format!("user '{}' already exists", user.username)))?;
        user_from_row(&row)
    }

    async fn find_user(&self, user_idx: i64) -> Result<Option<User>, DatabaseError> {
        let sql = format!("SELECT {} FROM users WHERE user_idx = $1", USER_COLUMNS);
        let row = sqlx::query(&sql).bind(user_idx).fetch_optional(&self.pool).await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, DatabaseError> {
        let sql = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);
        let row = sqlx::query(&sql).bind(username).fetch_optional(&self.pool).await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn save_refresh_token(
        &self,
        jti: Uuid,
        user_idx: i64,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        sqlx::query("INSERT INTO refresh_tokens (jti, user_idx, expires_at) VALUES ($1, $2, $3)")
            .bind(jti)
            .bind(user_idx)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn revoke_refresh_token(&self, jti: Uuid, now: DateTime<Utc>) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = $2 \
             WHERE jti = $1 AND revoked_at IS NULL AND expires_at > $2",
        )
        .bind(jti)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn create_lecture(&self, lecture: NewLecture) -> Result<Lecture, DatabaseError> {
        let row = sqlx::query(
            "INSERT INTO lectures (lec_serial, title, professor_idx) VALUES ($1, $2, $3) \
             RETURNING lec_serial, title, professor_idx, created_at",
        )
        .bind(&lecture.lec_serial)
        .bind(&lecture.title)
        .bind(lecture.professor_idx)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_unique_violation(e, format!("lecture '{}' already exists", lecture.lec_serial)))?;
        lecture_from_row(&row)
    }

    async fn find_lecture(&self, lec_serial: &str) -> Result<Option<Lecture>, DatabaseError> {
        let row = sqlx::query("SELECT lec_serial, title, professor_idx, created_at FROM lectures WHERE lec_serial = $1")
            .bind(lec_serial)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(lecture_from_row).transpose()
    }

    async fn enroll(&self, lec_serial: &str, student_idx: i64) -> Result<Enrollment, DatabaseError> {
        let sql = format!(
            "INSERT INTO enrollments (lec_serial, student_idx) VALUES ($1, $2) RETURNING {}",
            ENROLLMENT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(lec_serial)
            .bind(student_idx)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_unique_violation(e, "already enrolled in this lecture"))?;
        enrollment_from_row(&row)
    }

    async fn find_enrollment(&self, lec_serial: &str, student_idx: i64) -> Result<Option<Enrollment>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM enrollments WHERE lec_serial = $1 AND student_idx = $2",
            ENROLLMENT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(lec_serial)
            .bind(student_idx)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(enrollment_from_row).transpose()
    }

    async fn list_enrollments(&self, lec_serial: &str) -> Result<Vec<Enrollment>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM enrollments WHERE lec_serial = $1 ORDER BY student_idx",
            ENROLLMENT_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(lec_serial).fetch_all(&self.pool).await?;
        collect(rows, enrollment_from_row)
    }

    async fn get_grade_config(&self, lec_serial: &str) -> Result<Option<GradeConfig>, DatabaseError> {
        let row = sqlx::query(
            "SELECT attendance_max_score, late_penalty_per_session, total_sessions, grade_distribution, configured_at \
             FROM grade_configs WHERE lec_serial = $1",
        )
        .bind(lec_serial)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(grade_config_from_row).transpose()
    }

    async fn save_grade_config(&self, lec_serial: &str, config: &GradeConfig) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO grade_configs \
                 (lec_serial, attendance_max_score, late_penalty_per_session, total_sessions, grade_distribution, configured_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (lec_serial) DO UPDATE SET \
                 attendance_max_score = EXCLUDED.attendance_max_score, \
                 late_penalty_per_session = EXCLUDED.late_penalty_per_session, \
                 total_sessions = EXCLUDED.total_sessions, \
                 grade_distribution = EXCLUDED.grade_distribution, \
                 configured_at = EXCLUDED.configured_at",
        )
        .bind(lec_serial)
        .bind(config.attendance_max_score)
        .bind(config.late_penalty_per_session)
        .bind(config.total_sessions as i32)
        .bind(Json(config.grade_distribution))
        .bind(config.configured_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_assignment(&self, assignment: NewAssignment) -> Result<Assignment, DatabaseError> {
        let row = sqlx::query(
            "INSERT INTO assignments (lec_serial, name, max_score, due_at) VALUES ($1, $2, $3, $4) \
             RETURNING assignment_idx, lec_serial, name, max_score, due_at, created_at",
        )
        .bind(&assignment.lec_serial)
        .bind(&assignment.name)
        .bind(assignment.max_score)
        .bind(assignment.due_at)
        .fetch_one(&self.pool)
        .await?;
        assignment_from_row(&row)
    }

    async fn find_assignment(&self, assignment_idx: i64) -> Result<Option<Assignment>, DatabaseError> {
        let row = sqlx::query(
            "SELECT assignment_idx, lec_serial, name, max_score, due_at, created_at \
             FROM assignments WHERE assignment_idx = $1",
        )
        .bind(assignment_idx)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(assignment_from_row).transpose()
    }

    async fn list_assignments(&self, lec_serial: &str) -> Result<Vec<Assignment>, DatabaseError> {
        let rows = sqlx::query(
            "SELECT assignment_idx, lec_serial, name, max_score, due_at, created_at \
             FROM assignments WHERE lec_serial = $1 ORDER BY assignment_idx",
        )
        .bind(lec_serial)
        .fetch_all(&self.pool)
        .await?;
        collect(rows, assignment_from_row)
    }

    async fn save_assignment_score(
        &self,
        assignment_idx: i64,
        student_idx: i64,
        score: f64,
    ) -> Result<AssignmentGrade, DatabaseError> {
        let row = sqlx::query(
            "INSERT INTO assignment_scores (assignment_idx, student_idx, score) VALUES ($1, $2, $3) \
             ON CONFLICT (assignment_idx, student_idx) DO UPDATE SET score = EXCLUDED.score, graded_at = now() \
             RETURNING assignment_idx, student_idx, score, graded_at",
        )
        .bind(assignment_idx)
        .bind(student_idx)
        .bind(score)
        .fetch_one(&self.pool)
        .await?;
        assignment_grade_from_row(&row)
    }

    async fn list_assignment_scores(&self, lec_serial: &str) -> Result<Vec<AssignmentGrade>, DatabaseError> {
        let rows = sqlx::query(
            "SELECT s.assignment_idx, s.student_idx, s.score, s.graded_at \
             FROM assignment_scores s JOIN assignments a ON a.assignment_idx = s.assignment_idx \
             WHERE a.lec_serial = $1",
        )
        .bind(lec_serial)
        .fetch_all(&self.pool)
        .await?;
        collect(rows, assignment_grade_from_row)
    }

    async fn list_attendance(
        &self,
        lec_serial: &str,
        student_idx: Option<i64>,
    ) -> Result<Vec<AttendanceRecord>, DatabaseError> {
        let rows = sqlx::query(
            "SELECT lec_serial, session_number, student_idx, status, approved_by, approved_at, auto_approved \
             FROM attendance_records \
             WHERE lec_serial = $1 AND ($2::BIGINT IS NULL OR student_idx = $2) \
             ORDER BY student_idx, session_number",
        )
        .bind(lec_serial)
        .bind(student_idx)
        .fetch_all(&self.pool)
        .await?;
        collect(rows, attendance_from_row)
    }

    async fn find_attendance(
        &self,
        lec_serial: &str,
        session_number: u32,
        student_idx: i64,
    ) -> Result<Option<AttendanceRecord>, DatabaseError> {
        let row = sqlx::query(
            "SELECT lec_serial, session_number, student_idx, status, approved_by, approved_at, auto_approved \
             FROM attendance_records WHERE lec_serial = $1 AND session_number = $2 AND student_idx = $3",
        )
        .bind(lec_serial)
        .bind(session_number as i32)
        .bind(student_idx)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(attendance_from_row).transpose()
    }

    async fn record_attendance(
        &self,
        record: AttendanceRecord,
        resolution: Option<RequestResolution>,
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        if let Some(resolution) = resolution {
            let result = sqlx::query(
                "UPDATE attendance_requests \
                 SET status = $2, reject_reason = $3, resolved_at = $4, resolved_by = $5 \
                 WHERE request_idx = $1 AND status = 'PENDING'",
            )
            .bind(resolution.request_idx)
            .bind(resolution.status.as_str())
            .bind(&resolution.reject_reason)
            .bind(record.approved_at)
            .bind(record.approved_by)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 0 {
                return Err(DatabaseError::Conflict("attendance request is no longer pending".to_string()));
            }
        }

        sqlx::query(
            "INSERT INTO attendance_records \
                 (lec_serial, session_number, student_idx, status, approved_by, approved_at, auto_approved) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (lec_serial, session_number, student_idx) DO UPDATE SET \
                 status = EXCLUDED.status, approved_by = EXCLUDED.approved_by, \
                 approved_at = EXCLUDED.approved_at, auto_approved = EXCLUDED.auto_approved",
        )
        .bind(&record.lec_serial)
        .bind(record.session_number as i32)
        .bind(record.student_idx)
        .bind(record.status.mark())
        .bind(record.approved_by)
        .bind(record.approved_at)
        .bind(record.auto_approved)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn create_attendance_request(
        &self,
        request: NewAttendanceRequest,
    ) -> Result<AttendanceRequest, DatabaseError> {
        let sql = format!(
            "INSERT INTO attendance_requests \
                 (lec_serial, session_number, student_idx, request_reason, status, requested_at, expires_at) \
             VALUES ($1, $2, $3, $4, 'PENDING', $5, $6) RETURNING {}",
            REQUEST_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(&request.lec_serial)
            .bind(request.session_number as i32)
            .bind(request.student_idx)
            .bind(&request.request_reason)
            .bind(request.requested_at)
            .bind(request.expires_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                DatabaseError::from_unique_violation(e, "an attendance request for this session is already pending")
            })?;
        request_from_row(&row)
    }

    async fn find_pending_request(
        &self,
        lec_serial: &str,
        session_number: u32,
        student_idx: i64,
    ) -> Result<Option<AttendanceRequest>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM attendance_requests \
             WHERE lec_serial = $1 AND session_number = $2 AND student_idx = $3 AND status = 'PENDING'",
            REQUEST_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(lec_serial)
            .bind(session_number as i32)
            .bind(student_idx)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(request_from_row).transpose()
    }

    async fn list_attendance_requests(
        &self,
        lec_serial: &str,
        student_idx: Option<i64>,
    ) -> Result<Vec<AttendanceRequest>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM attendance_requests \
             WHERE lec_serial = $1 AND ($2::BIGINT IS NULL OR student_idx = $2) \
             ORDER BY request_idx",
            REQUEST_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(lec_serial)
            .bind(student_idx)
            .fetch_all(&self.pool)
            .await?;
        collect(rows, request_from_row)
    }

    async fn list_expired_requests(&self, now: DateTime<Utc>) -> Result<Vec<AttendanceRequest>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM attendance_requests WHERE status = 'PENDING' AND expires_at <= $1 ORDER BY request_idx",
            REQUEST_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(now).fetch_all(&self.pool).await?;
        collect(rows, request_from_row)
    }

    async fn save_final_grades(
        &self,
        lec_serial: &str,
        grades: &[FinalGrade],
        finalized_at: DateTime<Utc>,
        refinalize: bool,
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        // Row locks keep a concurrent finalize from slipping between check and write.
        let already: Vec<Option<DateTime<Utc>>> = sqlx::query_scalar(
            "SELECT finalized_at FROM enrollments WHERE lec_serial = $1 FOR UPDATE",
        )
        .bind(lec_serial)
        .fetch_all(&mut *tx)
        .await?;
        if !refinalize && already.iter().any(Option::is_some) {
            return Err(DatabaseError::Conflict(format!("grades for {} are already finalized", lec_serial)));
        }

        for grade in grades {
            let result = sqlx::query(
                "UPDATE enrollments SET letter_grade = $3, grade_rank = $4, finalized_at = $5 \
                 WHERE lec_serial = $1 AND student_idx = $2",
            )
            .bind(lec_serial)
            .bind(grade.student_idx)
            .bind(grade.letter_grade.as_str())
            .bind(grade.rank as i32)
            .bind(finalized_at)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                // Dropping the transaction rolls back the rows already written.
                return Err(DatabaseError::NotFound(format!(
                    "enrollment of student {} in {}",
                    grade.student_idx, lec_serial
                )));
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn create_board(&self, board: NewBoard) -> Result<Board, DatabaseError> {
        let created = sqlx::query_as::<_, Board>(
            "INSERT INTO boards (board_code, title, content, writer_idx, writer_name) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(board.board_code)
        .bind(&board.title)
        .bind(&board.content)
        .bind(board.writer_idx)
        .bind(&board.writer_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn list_boards(&self, board_code: Option<i32>, offset: i64, limit: i64) -> Result<BoardPage, DatabaseError> {
        let boards = sqlx::query_as::<_, Board>(
            "SELECT * FROM boards WHERE ($1::INTEGER IS NULL OR board_code = $1) \
             ORDER BY created_at DESC, board_idx DESC OFFSET $2 LIMIT $3",
        )
        .bind(board_code)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let (total_elements,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM boards WHERE ($1::INTEGER IS NULL OR board_code = $1)")
                .bind(board_code)
                .fetch_one(&self.pool)
                .await?;

        Ok(BoardPage { boards, total_elements })
    }

    async fn find_board(&self, board_idx: i64) -> Result<Option<Board>, DatabaseError> {
        let board = sqlx::query_as::<_, Board>("SELECT * FROM boards WHERE board_idx = $1")
            .bind(board_idx)
            .fetch_optional(&self.pool)
            .await?;
        Ok(board)
    }

    async fn view_board(&self, board_idx: i64) -> Result<Option<Board>, DatabaseError> {
        let board = sqlx::query_as::<_, Board>(
            "UPDATE boards SET view_count = view_count + 1 WHERE board_idx = $1 RETURNING *",
        )
        .bind(board_idx)
        .fetch_optional(&self.pool)
        .await?;
        Ok(board)
    }

    async fn update_board(
        &self,
        board_idx: i64,
        title: Option<String>,
        content: Option<String>,
    ) -> Result<Board, DatabaseError> {
        sqlx::query_as::<_, Board>(
            "UPDATE boards SET title = COALESCE($2, title), content = COALESCE($3, content), updated_at = now() \
             WHERE board_idx = $1 RETURNING *",
        )
        .bind(board_idx)
        .bind(title)
        .bind(content)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("board {}", board_idx)))
    }

    async fn create_facility(&self, facility: NewFacility) -> Result<Facility, DatabaseError> {
        let created = sqlx::query_as::<_, Facility>(
            "INSERT INTO facilities (name, facility_type, description, capacity, location) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(&facility.name)
        .bind(&facility.facility_type)
        .bind(&facility.description)
        .bind(facility.capacity)
        .bind(&facility.location)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn find_facility(&self, facility_idx: i64) -> Result<Option<Facility>, DatabaseError> {
        let facility = sqlx::query_as::<_, Facility>("SELECT * FROM facilities WHERE facility_idx = $1")
            .bind(facility_idx)
            .fetch_optional(&self.pool)
            .await?;
        Ok(facility)
    }

    async fn list_facilities(&self, active_only: bool) -> Result<Vec<Facility>, DatabaseError> {
        let facilities = sqlx::query_as::<_, Facility>(
            "SELECT * FROM facilities WHERE ($1 = FALSE OR is_active) ORDER BY facility_idx",
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(facilities)
    }

    async fn create_reservation(&self, reservation: NewReservation) -> Result<Reservation, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        // Serialize bookings per facility so the overlap check below cannot race.
        sqlx::query("SELECT facility_idx FROM facilities WHERE facility_idx = $1 FOR UPDATE")
            .bind(reservation.facility_idx)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("facility {}", reservation.facility_idx)))?;

        let (clashes,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM reservations \
             WHERE facility_idx = $1 AND status IN ('PENDING', 'APPROVED') \
             AND start_time < $3 AND $2 < end_time",
        )
        .bind(reservation.facility_idx)
        .bind(reservation.start_time)
        .bind(reservation.end_time)
        .fetch_one(&mut *tx)
        .await?;
        if clashes > 0 {
            return Err(DatabaseError::Conflict(
                "the facility is already reserved for that time".to_string(),
            ));
        }

        let sql = format!(
            "INSERT INTO reservations (facility_idx, user_idx, start_time, end_time, party_size, purpose, status) \
             VALUES ($1, $2, $3, $4, $5, $6, 'PENDING') RETURNING {}",
            RESERVATION_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(reservation.facility_idx)
            .bind(reservation.user_idx)
            .bind(reservation.start_time)
            .bind(reservation.end_time)
            .bind(reservation.party_size)
            .bind(&reservation.purpose)
            .fetch_one(&mut *tx)
            .await?;
        let created = reservation_from_row(&row)?;

        tx.commit().await?;
        Ok(created)
    }

    async fn find_reservation(&self, reservation_idx: i64) -> Result<Option<Reservation>, DatabaseError> {
        let sql = format!("SELECT {} FROM reservations WHERE reservation_idx = $1", RESERVATION_COLUMNS);
        let row = sqlx::query(&sql).bind(reservation_idx).fetch_optional(&self.pool).await?;
        row.as_ref().map(reservation_from_row).transpose()
    }

    async fn list_user_reservations(&self, user_idx: i64) -> Result<Vec<Reservation>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM reservations WHERE user_idx = $1 ORDER BY created_at DESC, reservation_idx DESC",
            RESERVATION_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(user_idx).fetch_all(&self.pool).await?;
        collect(rows, reservation_from_row)
    }

    async fn update_reservation_status(
        &self,
        reservation_idx: i64,
        status: ReservationStatus,
    ) -> Result<Reservation, DatabaseError> {
        let sql = format!(
            "UPDATE reservations SET status = $2, updated_at = now() WHERE reservation_idx = $1 RETURNING {}",
            RESERVATION_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(reservation_idx)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("reservation {}", reservation_idx)))?;
        reservation_from_row(&row)
    }
}
