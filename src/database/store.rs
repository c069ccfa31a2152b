use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::*;
use crate::grading::{FinalGrade, GradeConfig};

/// Persistence boundary for the whole application.
///
/// Methods that combine a check with a write (`enroll`, `create_reservation`,
/// `record_attendance`, `save_final_grades`) must be atomic in every backend.
#[async_trait]
pub trait Store: Send + Sync {
    async fn health_check(&self) -> Result<(), DatabaseError>;

    // Users
    async fn create_user(&self, user: NewUser) -> Result<User, DatabaseError>;
    async fn find_user(&self, user_idx: i64) -> Result<Option<User>, DatabaseError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, DatabaseError>;

    // Refresh token registry
    async fn save_refresh_token(
        &self,
        jti: Uuid,
        user_idx: i64,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;
    /// Revoke an active refresh token. Returns false if it was unknown, revoked or expired.
    async fn revoke_refresh_token(&self, jti: Uuid, now: DateTime<Utc>) -> Result<bool, DatabaseError>;

    // Lectures and enrollment
    async fn create_lecture(&self, lecture: NewLecture) -> Result<Lecture, DatabaseError>;
    async fn find_lecture(&self, lec_serial: &str) -> Result<Option<Lecture>, DatabaseError>;
    async fn enroll(&self, lec_serial: &str, student_idx: i64) -> Result<Enrollment, DatabaseError>;
    async fn find_enrollment(&self, lec_serial: &str, student_idx: i64) -> Result<Option<Enrollment>, DatabaseError>;
    async fn list_enrollments(&self, lec_serial: &str) -> Result<Vec<Enrollment>, DatabaseError>;

    // Grade configuration
    async fn get_grade_config(&self, lec_serial: &str) -> Result<Option<GradeConfig>, DatabaseError>;
    async fn save_grade_config(&self, lec_serial: &str, config: &GradeConfig) -> Result<(), DatabaseError>;

    // Assignments
    async fn create_assignment(&self, assignment: NewAssignment) -> Result<Assignment, DatabaseError>;
    async fn find_assignment(&self, assignment_idx: i64) -> Result<Option<Assignment>, DatabaseError>;
    async fn list_assignments(&self, lec_serial: &str) -> Result<Vec<Assignment>, DatabaseError>;
    async fn save_assignment_score(
        &self,
        assignment_idx: i64,
        student_idx: i64,
        score: f64,
    ) -> Result<AssignmentGrade, DatabaseError>;
    async fn list_assignment_scores(&self, lec_serial: &str) -> Result<Vec<AssignmentGrade>, DatabaseError>;

    // Attendance
    async fn list_attendance(
        &self,
        lec_serial: &str,
        student_idx: Option<i64>,
    ) -> Result<Vec<AttendanceRecord>, DatabaseError>;
    async fn find_attendance(
        &self,
        lec_serial: &str,
        session_number: u32,
        student_idx: i64,
    ) -> Result<Option<AttendanceRecord>, DatabaseError>;
    /// Upsert a session record and, when given, close the request it answers.
    async fn record_attendance(
        &self,
        record: AttendanceRecord,
        resolution: Option<RequestResolution>,
    ) -> Result<(), DatabaseError>;
    /// Fails with `Conflict` while another request for the same session is pending.
    async fn create_attendance_request(
        &self,
        request: NewAttendanceRequest,
    ) -> Result<AttendanceRequest, DatabaseError>;
    async fn find_pending_request(
        &self,
        lec_serial: &str,
        session_number: u32,
        student_idx: i64,
    ) -> Result<Option<AttendanceRequest>, DatabaseError>;
    async fn list_attendance_requests(
        &self,
        lec_serial: &str,
        student_idx: Option<i64>,
    ) -> Result<Vec<AttendanceRequest>, DatabaseError>;
    async fn list_expired_requests(&self, now: DateTime<Utc>) -> Result<Vec<AttendanceRequest>, DatabaseError>;

    // Finalization
    /// Persist letter grade and rank on every listed enrollment in one write.
    /// Unless `refinalize` is set, fails with `Conflict` when any enrollment of
    /// the lecture is already finalized; the check and the write share one lock.
    async fn save_final_grades(
        &self,
        lec_serial: &str,
        grades: &[FinalGrade],
        finalized_at: DateTime<Utc>,
        refinalize: bool,
    ) -> Result<(), DatabaseError>;

    // Boards
    async fn create_board(&self, board: NewBoard) -> Result<Board, DatabaseError>;
    async fn list_boards(&self, board_code: Option<i32>, offset: i64, limit: i64) -> Result<BoardPage, DatabaseError>;
    async fn find_board(&self, board_idx: i64) -> Result<Option<Board>, DatabaseError>;
    /// Increment the view counter and return the updated post.
    async fn view_board(&self, board_idx: i64) -> Result<Option<Board>, DatabaseError>;
    async fn update_board(
        &self,
        board_idx: i64,
        title: Option<String>,
        content: Option<String>,
    ) -> Result<Board, DatabaseError>;

    // Facilities and reservations
    async fn create_facility(&self, facility: NewFacility) -> Result<Facility, DatabaseError>;
    async fn find_facility(&self, facility_idx: i64) -> Result<Option<Facility>, DatabaseError>;
    async fn list_facilities(&self, active_only: bool) -> Result<Vec<Facility>, DatabaseError>;
    /// Insert a pending reservation unless it overlaps one that holds the slot.
    async fn create_reservation(&self, reservation: NewReservation) -> Result<Reservation, DatabaseError>;
    async fn find_reservation(&self, reservation_idx: i64) -> Result<Option<Reservation>, DatabaseError>;
    async fn list_user_reservations(&self, user_idx: i64) -> Result<Vec<Reservation>, DatabaseError>;
    async fn update_reservation_status(
        &self,
        reservation_idx: i64,
        status: ReservationStatus,
    ) -> Result<Reservation, DatabaseError>;
}
