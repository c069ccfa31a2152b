use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::*;
use crate::database::store::Store;
use crate::grading::{FinalGrade, GradeConfig};

#[derive(Debug)]
struct RefreshToken {
    user_idx: i64,
    expires_at: DateTime<Utc>,
    revoked: bool,
}

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<i64, User>,
    refresh_tokens: HashMap<Uuid, RefreshToken>,
    lectures: BTreeMap<String, Lecture>,
    enrollments: BTreeMap<(String, i64), Enrollment>,
    grade_configs: HashMap<String, GradeConfig>,
    assignments: BTreeMap<i64, Assignment>,
    assignment_scores: BTreeMap<(i64, i64), AssignmentGrade>,
    attendance: BTreeMap<(String, u32, i64), AttendanceRecord>,
    attendance_requests: BTreeMap<i64, AttendanceRequest>,
    boards: BTreeMap<i64, Board>,
    facilities: BTreeMap<i64, Facility>,
    reservations: BTreeMap<i64, Reservation>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local store. All tables sit behind one lock so compound writes are atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, DatabaseError> {
        let mut t = self.tables.write().await;
        if t.users.values().any(|u| u.username == user.username) {
            return Err(DatabaseError::Conflict(format!("username '{}' is taken", user.username)));
        }
        if t.users.values().any(|u| u.user_code == user.user_code) {
            return Err(DatabaseError::Conflict(format!("user code '{}' is taken", user.user_code)));
        }

        let user = User {
            user_idx: t.next_id(),
            username: user.username,
            user_code: user.user_code,
            name: user.name,
            email: user.email,
            role: user.role,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        t.users.insert(user.user_idx, user.clone());
        Ok(user)
    }

    async fn find_user(&self, user_idx: i64) -> Result<Option<User>, DatabaseError> {
        Ok(self.tables.read().await.users.get(&user_idx).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, DatabaseError> {
        let t = self.tables.read().await;
        Ok(t.users.values().find(|u| u.username == username).cloned())
    }

    async fn save_refresh_token(
        &self,
        jti: Uuid,
        user_idx: i64,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let mut t = self.tables.write().await;
        t.refresh_tokens.insert(
            jti,
            RefreshToken {
                user_idx,
                expires_at,
                revoked: false,
            },
        );
        Ok(())
    }

    async fn revoke_refresh_token(&self, jti: Uuid, now: DateTime<Utc>) -> Result<bool, DatabaseError> {
        let mut t = self.tables.write().await;
        match t.refresh_tokens.get_mut(&jti) {
            Some(token) if !token.revoked && token.expires_at > now => {
                token.revoked = true;
                tracing::debug!("Revoked refresh token for user {}", token.user_idx);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn create_lecture(&self, lecture: NewLecture) -> Result<Lecture, DatabaseError> {
        let mut t = self.tables.write().await;
        if t.lectures.contains_key(&lecture.lec_serial) {
            return Err(DatabaseError::Conflict(format!("lecture '{}' already exists", lecture.lec_serial)));
        }
        let lecture = Lecture {
            lec_serial: lecture.lec_serial,
            title: lecture.title,
            professor_idx: lecture.professor_idx,
            created_at: Utc::now(),
        };
        t.lectures.insert(lecture.lec_serial.clone(), lecture.clone());
        Ok(lecture)
    }

    async fn find_lecture(&self, lec_serial: &str) -> Result<Option<Lecture>, DatabaseError> {
        Ok(self.tables.read().await.lectures.get(lec_serial).cloned())
    }

    async fn enroll(&self, lec_serial: &str, student_idx: i64) -> Result<Enrollment, DatabaseError> {
        let mut t = self.tables.write().await;
        let key = (lec_serial.to_string(), student_idx);
        if t.enrollments.contains_key(&key) {
            return Err(DatabaseError::Conflict("already enrolled in this lecture".to_string()));
        }
        let enrollment = Enrollment {
            lec_serial: lec_serial.to_string(),
            student_idx,
            enrolled_at: Utc::now(),
            letter_grade: None,
            rank: None,
            finalized_at: None,
        };
        t.enrollments.insert(key, enrollment.clone());
        Ok(enrollment)
    }

    async fn find_enrollment(&self, lec_serial: &str, student_idx: i64) -> Result<Option<Enrollment>, DatabaseError> {
        let t = self.tables.read().await;
        Ok(t.enrollments.get(&(lec_serial.to_string(), student_idx)).cloned())
    }

    async fn list_enrollments(&self, lec_serial: &str) -> Result<Vec<Enrollment>, DatabaseError> {
        let t = self.tables.read().await;
        Ok(t.enrollments
            .values()
            .filter(|e| e.lec_serial == lec_serial)
            .cloned()
            .collect())
    }

    async fn get_grade_config(&self, lec_serial: &str) -> Result<Option<GradeConfig>, DatabaseError> {
        Ok(self.tables.read().await.grade_configs.get(lec_serial).cloned())
    }

    async fn save_grade_config(&self, lec_serial: &str, config: &GradeConfig) -> Result<(), DatabaseError> {
        let mut t = self.tables.write().await;
        t.grade_configs.insert(lec_serial.to_string(), config.clone());
        Ok(())
    }

    async fn create_assignment(&self, assignment: NewAssignment) -> Result<Assignment, DatabaseError> {
        let mut t = self.tables.write().await;
        let assignment = Assignment {
            assignment_idx: t.next_id(),
            lec_serial: assignment.lec_serial,
            name: assignment.name,
            max_score: assignment.max_score,
            due_at: assignment.due_at,
            created_at: Utc::now(),
        };
        t.assignments.insert(assignment.assignment_idx, assignment.clone());
        Ok(assignment)
    }

    async fn find_assignment(&self, assignment_idx: i64) -> Result<Option<Assignment>, DatabaseError> {
        Ok(self.tables.read().await.assignments.get(&assignment_idx).cloned())
    }

    async fn list_assignments(&self, lec_serial: &str) -> Result<Vec<Assignment>, DatabaseError> {
        let t = self.tables.read().await;
        Ok(t.assignments
            .values()
            .filter(|a| a.lec_serial == lec_serial)
            .cloned()
            .collect())
    }

    async fn save_assignment_score(
        &self,
        assignment_idx: i64,
        student_idx: i64,
        score: f64,
    ) -> Result<AssignmentGrade, DatabaseError> {
        let mut t = self.tables.write().await;
        if !t.assignments.contains_key(&assignment_idx) {
            return Err(DatabaseError::NotFound(format!("assignment {}", assignment_idx)));
        }
        let grade = AssignmentGrade {
            assignment_idx,
            student_idx,
            score,
            graded_at: Utc::now(),
        };
        t.assignment_scores.insert((assignment_idx, student_idx), grade.clone());
        Ok(grade)
    }

    async fn list_assignment_scores(&self, lec_serial: &str) -> Result<Vec<AssignmentGrade>, DatabaseError> {
        let t = self.tables.read().await;
        Ok(t.assignment_scores
            .values()
            .filter(|g| {
                t.assignments
                    .get(&g.assignment_idx)
                    .map(|a| a.lec_serial == lec_serial)
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn list_attendance(
        &self,
        lec_serial: &str,
        student_idx: Option<i64>,
    ) -> Result<Vec<AttendanceRecord>, DatabaseError> {
        let t = self.tables.read().await;
        Ok(t.attendance
            .values()
            .filter(|r| r.lec_serial == lec_serial && student_idx.map_or(true, |s| r.student_idx == s))
            .cloned()
            .collect())
    }

    async fn find_attendance(
        &self,
        lec_serial: &str,
        session_number: u32,
        student_idx: i64,
    ) -> Result<Option<AttendanceRecord>, DatabaseError> {
        let t = self.tables.read().await;
        Ok(t.attendance
            .get(&(lec_serial.to_string(), session_number, student_idx))
            .cloned())
    }

    async fn record_attendance(
        &self,
        record: AttendanceRecord,
        resolution: Option<RequestResolution>,
    ) -> Result<(), DatabaseError> {
        let mut t = self.tables.write().await;

        if let Some(resolution) = resolution {
            let request = t
                .attendance_requests
                .get_mut(&resolution.request_idx)
                .ok_or_else(|| DatabaseError::NotFound(format!("attendance request {}", resolution.request_idx)))?;
            if request.status != RequestStatus::Pending {
                return Err(DatabaseError::Conflict("attendance request is no longer pending".to_string()));
            }
            request.status = resolution.status;
            request.reject_reason = resolution.reject_reason;
            request.resolved_at = Some(record.approved_at);
            request.resolved_by = record.approved_by;
        }

        let key = (record.lec_serial.clone(), record.session_number, record.student_idx);
        t.attendance.insert(key, record);
        Ok(())
    }

    async fn create_attendance_request(
        &self,
        request: NewAttendanceRequest,
    ) -> Result<AttendanceRequest, DatabaseError> {
        let mut t = self.tables.write().await;
        let duplicate = t.attendance_requests.values().any(|r| {
            r.status == RequestStatus::Pending
                && r.lec_serial == request.lec_serial
                && r.session_number == request.session_number
                && r.student_idx == request.student_idx
        });
        if duplicate {
            return Err(DatabaseError::Conflict(
                "an attendance request for this session is already pending".to_string(),
            ));
        }

        let request = AttendanceRequest {
            request_idx: t.next_id(),
            lec_serial: request.lec_serial,
            session_number: request.session_number,
            student_idx: request.student_idx,
            request_reason: request.request_reason,
            status: RequestStatus::Pending,
            requested_at: request.requested_at,
            expires_at: request.expires_at,
            resolved_at: None,
            resolved_by: None,
            reject_reason: None,
        };
        t.attendance_requests.insert(request.request_idx, request.clone());
        Ok(request)
    }

    async fn find_pending_request(
        &self,
        lec_serial: &str,
        session_number: u32,
        student_idx: i64,
    ) -> Result<Option<AttendanceRequest>, DatabaseError> {
        let t = self.tables.read().await;
        Ok(t.attendance_requests
            .values()
            .find(|r| {
                r.status == RequestStatus::Pending
                    && r.lec_serial == lec_serial
                    && r.session_number == session_number
                    && r.student_idx == student_idx
            })
            .cloned())
    }

    async fn list_attendance_requests(
        &self,
        lec_serial: &str,
        student_idx: Option<i64>,
    ) -> Result<Vec<AttendanceRequest>, DatabaseError> {
        let t = self.tables.read().await;
        Ok(t.attendance_requests
            .values()
            .filter(|r| r.lec_serial == lec_serial && student_idx.map_or(true, |s| r.student_idx == s))
            .cloned()
            .collect())
    }

    async fn list_expired_requests(&self, now: DateTime<Utc>) -> Result<Vec<AttendanceRequest>, DatabaseError> {
        let t = self.tables.read().await;
        Ok(t.attendance_requests
            .values()
            .filter(|r| r.status == RequestStatus::Pending && r.expires_at <= now)
            .cloned()
            .collect())
    }

    async fn save_final_grades(
        &self,
        lec_serial: &str,
        grades: &[FinalGrade],
        finalized_at: DateTime<Utc>,
        refinalize: bool,
    ) -> Result<(), DatabaseError> {
        let mut t = self.tables.write().await;

        if !refinalize
            && t.enrollments
                .iter()
                .any(|((serial, _), enrollment)| serial == lec_serial && enrollment.is_finalized())
        {
            return Err(DatabaseError::Conflict(format!("grades for {} are already finalized", lec_serial)));
        }

        // Validate every row before touching any of them.
        for grade in grades {
            let key = (lec_serial.to_string(), grade.student_idx);
            if !t.enrollments.contains_key(&key) {
                return Err(DatabaseError::NotFound(format!(
                    "enrollment of student {} in {}",
                    grade.student_idx, lec_serial
                )));
            }
        }
        for grade in grades {
            if let Some(enrollment) = t.enrollments.get_mut(&(lec_serial.to_string(), grade.student_idx)) {
                enrollment.letter_grade = Some(grade.letter_grade);
                enrollment.rank = Some(grade.rank);
                enrollment.finalized_at = Some(finalized_at);
            }
        }
        Ok(())
    }

    async fn create_board(&self, board: NewBoard) -> Result<Board, DatabaseError> {
        let mut t = self.tables.write().await;
        let now = Utc::now();
        let board = Board {
            board_idx: t.next_id(),
            board_code: board.board_code,
            title: board.title,
            content: board.content,
            writer_idx: board.writer_idx,
            writer_name: board.writer_name,
            view_count: 0,
            created_at: now,
            updated_at: now,
        };
        t.boards.insert(board.board_idx, board.clone());
        Ok(board)
    }

    async fn list_boards(&self, board_code: Option<i32>, offset: i64, limit: i64) -> Result<BoardPage, DatabaseError> {
        let t = self.tables.read().await;
        let mut matching: Vec<&Board> = t
            .boards
            .values()
            .filter(|b| board_code.map_or(true, |code| b.board_code == code))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.board_idx.cmp(&a.board_idx)));

        Ok(BoardPage {
            total_elements: matching.len() as i64,
            boards: matching
                .into_iter()
                .skip(offset.max(0) as usize)
                .take(limit.max(0) as usize)
                .cloned()
                .collect(),
        })
    }

    async fn find_board(&self, board_idx: i64) -> Result<Option<Board>, DatabaseError> {
        Ok(self.tables.read().await.boards.get(&board_idx).cloned())
    }

    async fn view_board(&self, board_idx: i64) -> Result<Option<Board>, DatabaseError> {
        let mut t = self.tables.write().await;
        Ok(t.boards.get_mut(&board_idx).map(|board| {
            board.view_count += 1;
            board.clone()
        }))
    }

    async fn update_board(
        &self,
        board_idx: i64,
        title: Option<String>,
        content: Option<String>,
    ) -> Result<Board, DatabaseError> {
        let mut t = self.tables.write().await;
        let board = t
            .boards
            .get_mut(&board_idx)
            .ok_or_else(|| DatabaseError::NotFound(format!("board {}", board_idx)))?;
        if let Some(title) = title {
            board.title = title;
        }
        if let Some(content) = content {
            board.content = content;
        }
        board.updated_at = Utc::now();
        Ok(board.clone())
    }

    async fn create_facility(&self, facility: NewFacility) -> Result<Facility, DatabaseError> {
        let mut t = self.tables.write().await;
        let facility = Facility {
            facility_idx: t.next_id(),
            name: facility.name,
            facility_type: facility.facility_type,
            description: facility.description,
            capacity: facility.capacity,
            location: facility.location,
            is_active: true,
            created_at: Utc::now(),
        };
        t.facilities.insert(facility.facility_idx, facility.clone());
        Ok(facility)
    }

    async fn find_facility(&self, facility_idx: i64) -> Result<Option<Facility>, DatabaseError> {
        Ok(self.tables.read().await.facilities.get(&facility_idx).cloned())
    }

    async fn list_facilities(&self, active_only: bool) -> Result<Vec<Facility>, DatabaseError> {
        let t = self.tables.read().await;
        Ok(t.facilities
            .values()
            .filter(|f| !active_only || f.is_active)
            .cloned()
            .collect())
    }

    async fn create_reservation(&self, reservation: NewReservation) -> Result<Reservation, DatabaseError> {
        let mut t = self.tables.write().await;
        let clash = t.reservations.values().any(|r| {
            r.facility_idx == reservation.facility_idx
                && r.status.holds_slot()
                && r.overlaps(reservation.start_time, reservation.end_time)
        });
        if clash {
            return Err(DatabaseError::Conflict(
                "the facility is already reserved for that time".to_string(),
            ));
        }

        let now = Utc::now();
        let reservation = Reservation {
            reservation_idx: t.next_id(),
            facility_idx: reservation.facility_idx,
            user_idx: reservation.user_idx,
            start_time: reservation.start_time,
            end_time: reservation.end_time,
            party_size: reservation.party_size,
            purpose: reservation.purpose,
            status: ReservationStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        t.reservations.insert(reservation.reservation_idx, reservation.clone());
        Ok(reservation)
    }

    async fn find_reservation(&self, reservation_idx: i64) -> Result<Option<Reservation>, DatabaseError> {
        Ok(self.tables.read().await.reservations.get(&reservation_idx).cloned())
    }

    async fn list_user_reservations(&self, user_idx: i64) -> Result<Vec<Reservation>, DatabaseError> {
        let t = self.tables.read().await;
        let mut reservations: Vec<Reservation> = t
            .reservations
            .values()
            .filter(|r| r.user_idx == user_idx)
            .cloned()
            .collect();
        reservations.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.reservation_idx.cmp(&a.reservation_idx)));
        Ok(reservations)
    }

    async fn update_reservation_status(
        &self,
        reservation_idx: i64,
        status: ReservationStatus,
    ) -> Result<Reservation, DatabaseError> {
        let mut t = self.tables.write().await;
        let reservation = t
            .reservations
            .get_mut(&reservation_idx)
            .ok_or_else(|| DatabaseError::NotFound(format!("reservation {}", reservation_idx)))?;
        reservation.status = status;
        reservation.updated_at = Utc::now();
        Ok(reservation.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::{AttendanceStatus, LetterGrade};
    use chrono::Duration;

    fn new_user(username: &str, code: &str, role: Role) -> NewUser {
        NewUser {
            username: username.to_string(),
            user_code: code.to_string(),
            name: username.to_string(),
            email: None,
            role,
            password_hash: String::new(),
        }
    }

    #[tokio::test]
    async fn duplicate_username_is_conflict() {
        let store = MemoryStore::new();
        store.create_user(new_user("kim", "S1", Role::Student)).await.unwrap();
        let err = store.create_user(new_user("kim", "S2", Role::Student)).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict(_)));
    }

    #[tokio::test]
    async fn refresh_token_revokes_once() {
        let store = MemoryStore::new();
        let jti = Uuid::new_v4();
        let now = Utc::now();
        store.save_refresh_token(jti, 1, now + Duration::hours(1)).await.unwrap();

        assert!(store.revoke_refresh_token(jti, now).await.unwrap());
        assert!(!store.revoke_refresh_token(jti, now).await.unwrap());
        assert!(!store.revoke_refresh_token(Uuid::new_v4(), now).await.unwrap());
    }

    #[tokio::test]
    async fn expired_refresh_token_cannot_be_revoked() {
        let store = MemoryStore::new();
        let jti = Uuid::new_v4();
        let now = Utc::now();
        store.save_refresh_token(jti, 1, now - Duration::seconds(1)).await.unwrap();
        assert!(!store.revoke_refresh_token(jti, now).await.unwrap());
    }

    #[tokio::test]
    async fn recording_attendance_resolves_the_request() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let request = store
            .create_attendance_request(NewAttendanceRequest {
                lec_serial: "CS101".to_string(),
                session_number: 3,
                student_idx: 9,
                request_reason: None,
                requested_at: now,
                expires_at: now + Duration::days(7),
            })
            .await
            .unwrap();

        let duplicate = store
            .create_attendance_request(NewAttendanceRequest {
                lec_serial: "CS101".to_string(),
                session_number: 3,
                student_idx: 9,
                request_reason: None,
                requested_at: now,
                expires_at: now + Duration::days(7),
            })
            .await;
        assert!(matches!(duplicate, Err(DatabaseError::Conflict(_))));

        let record = AttendanceRecord {
            lec_serial: "CS101".to_string(),
            session_number: 3,
            student_idx: 9,
            status: AttendanceStatus::Present,
            approved_by: Some(1),
            approved_at: now,
            auto_approved: false,
        };
        store
            .record_attendance(
                record,
                Some(RequestResolution {
                    request_idx: request.request_idx,
                    status: RequestStatus::Approved,
                    reject_reason: None,
                }),
            )
            .await
            .unwrap();

        assert!(store.find_pending_request("CS101", 3, 9).await.unwrap().is_none());
        assert_eq!(store.list_attendance("CS101", Some(9)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn final_grades_are_all_or_nothing() {
        let store = MemoryStore::new();
        store.enroll("CS101", 1).await.unwrap();
        let grades = [
            FinalGrade { student_idx: 1, percentage: 90.0, letter_grade: LetterGrade::A, rank: 1 },
            FinalGrade { student_idx: 2, percentage: 80.0, letter_grade: LetterGrade::B, rank: 2 },
        ];
        assert!(store.save_final_grades("CS101", &grades, Utc::now(), false).await.is_err());
        let enrollment = store.find_enrollment("CS101", 1).await.unwrap().unwrap();
        assert!(!enrollment.is_finalized());
    }

    #[tokio::test]
    async fn second_finalize_conflicts_unless_refinalizing() {
        let store = MemoryStore::new();
        store.enroll("CS101", 1).await.unwrap();
        let first = [FinalGrade { student_idx: 1, percentage: 90.0, letter_grade: LetterGrade::A, rank: 1 }];
        let second = [FinalGrade { student_idx: 1, percentage: 50.0, letter_grade: LetterGrade::F, rank: 1 }];
        store.save_final_grades("CS101", &first, Utc::now(), false).await.unwrap();

        let again = store.save_final_grades("CS101", &second, Utc::now(), false).await;
        assert!(matches!(again, Err(DatabaseError::Conflict(_))));
        let kept = store.find_enrollment("CS101", 1).await.unwrap().unwrap();
        assert_eq!(kept.letter_grade, Some(LetterGrade::A));

        store.save_final_grades("CS101", &second, Utc::now(), true).await.unwrap();
        let replaced = store.find_enrollment("CS101", 1).await.unwrap().unwrap();
        assert_eq!(replaced.letter_grade, Some(LetterGrade::F));
    }

    #[tokio::test]
    async fn overlapping_reservation_conflicts_until_cancelled() {
        let store = MemoryStore::new();
        let start = Utc::now() + Duration::days(1);
        let booking = |offset_minutes: i64| NewReservation {
            facility_idx: 5,
            user_idx: 1,
            start_time: start + Duration::minutes(offset_minutes),
            end_time: start + Duration::minutes(offset_minutes + 60),
            party_size: 1,
            purpose: None,
        };

        let first = store.create_reservation(booking(0)).await.unwrap();
        assert!(matches!(store.create_reservation(booking(30)).await, Err(DatabaseError::Conflict(_))));
        // Back-to-back slots do not overlap.
        store.create_reservation(booking(60)).await.unwrap();

        store
            .update_reservation_status(first.reservation_idx, ReservationStatus::Cancelled)
            .await
            .unwrap();
        store.create_reservation(booking(-30)).await.unwrap();
    }
}
