use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::models::{
    AttendanceRecord, AttendanceRequest, NewAttendanceRequest, RequestResolution, RequestStatus,
};
use crate::database::{DatabaseError, Store};
use crate::grading::{score_attendance, AttendanceScore, AttendanceStatus, AttendanceTally, GradeConfig};
use crate::middleware::AuthUser;
use crate::services::{
    load_grade_config, require_course_professor, require_enrolled, ServiceError, ServiceResult,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRequestInput {
    pub lec_serial: String,
    pub session_number: u32,
    pub request_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalEntry {
    pub student_idx: i64,
    /// `출`/`지`/`결` or present/late/absent. Parsed per entry so one bad mark
    /// does not sink the batch.
    pub status: String,
    pub reject_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalInput {
    pub lec_serial: String,
    pub session_number: u32,
    pub attendance_records: Vec<ApprovalEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalFailure {
    pub student_idx: i64,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: Vec<ApprovalFailure>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAttendance {
    pub lec_serial: String,
    pub student_idx: i64,
    pub records: Vec<AttendanceRecord>,
    pub requests: Vec<AttendanceRequest>,
    pub summary: AttendanceScore,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAttendanceRow {
    pub student_idx: i64,
    pub student_name: String,
    pub student_id: String,
    pub records: Vec<AttendanceRecord>,
    pub summary: AttendanceScore,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseAttendance {
    pub lec_serial: String,
    pub total_sessions: u32,
    pub students: Vec<StudentAttendanceRow>,
    pub pending_requests: Vec<AttendanceRequest>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub expired: usize,
    pub approved: usize,
    pub failed: usize,
}

pub struct AttendanceService {
    store: Arc<dyn Store>,
    config: Arc<AppConfig>,
}

impl AttendanceService {
    pub fn new(store: Arc<dyn Store>, config: Arc<AppConfig>) -> Self {
        Self { store, config }
    }

    /// Midnight UTC `expiry_days` after the day the request was made.
    pub fn expiry_for(&self, requested_at: DateTime<Utc>) -> DateTime<Utc> {
        let day = requested_at.date_naive() + Duration::days(self.config.attendance.request_expiry_days);
        day.and_time(NaiveTime::MIN).and_utc()
    }

    pub async fn request(
        &self,
        user: &AuthUser,
        input: AttendanceRequestInput,
        now: DateTime<Utc>,
    ) -> ServiceResult<AttendanceRequest> {
        require_enrolled(self.store.as_ref(), user, &input.lec_serial).await?;
        let config = self.grade_config(&input.lec_serial).await?;
        check_session(input.session_number, &config)?;

        if let Some(existing) = self
            .store
            .find_attendance(&input.lec_serial, input.session_number, user.user_id)
            .await?
        {
            return Err(ServiceError::Conflict(format!(
                "Session {} is already recorded as {}",
                input.session_number, existing.status
            )));
        }

        let request = self
            .store
            .create_attendance_request(NewAttendanceRequest {
                lec_serial: input.lec_serial,
                session_number: input.session_number,
                student_idx: user.user_id,
                request_reason: input.request_reason.filter(|r| !r.trim().is_empty()),
                requested_at: now,
                expires_at: self.expiry_for(now),
            })
            .await?;

        tracing::info!(
            "Attendance request {} by {} for {} session {}",
            request.request_idx,
            user.username,
            request.lec_serial,
            request.session_number
        );
        Ok(request)
    }

    /// Apply each entry on its own; failures are collected rather than aborting the batch.
    pub async fn approve(
        &self,
        user: &AuthUser,
        input: ApprovalInput,
        now: DateTime<Utc>,
    ) -> ServiceResult<ApprovalReport> {
        require_course_professor(self.store.as_ref(), user, &input.lec_serial).await?;
        let config = self.grade_config(&input.lec_serial).await?;
        check_session(input.session_number, &config)?;

        let mut report = ApprovalReport::default();
        for entry in input.attendance_records {
            report.processed += 1;
            let student_idx = entry.student_idx;
            match self
                .apply_entry(user, &input.lec_serial, input.session_number, entry, now)
                .await
            {
                Ok(()) => report.succeeded += 1,
                Err(reason) => {
                    tracing::warn!(
                        "Attendance for student {} in {} session {} not applied: {}",
                        student_idx,
                        input.lec_serial,
                        input.session_number,
                        reason
                    );
                    report.failed.push(ApprovalFailure { student_idx, reason });
                }
            }
        }

        tracing::info!(
            "Attendance for {} session {}: {}/{} applied by {}",
            input.lec_serial,
            input.session_number,
            report.succeeded,
            report.processed,
            user.username
        );
        Ok(report)
    }

    async fn apply_entry(
        &self,
        user: &AuthUser,
        lec_serial: &str,
        session_number: u32,
        entry: ApprovalEntry,
        now: DateTime<Utc>,
    ) -> Result<(), String> {
        let status: AttendanceStatus = entry.status.parse()?;

        let enrolled = self
            .store
            .find_enrollment(lec_serial, entry.student_idx)
            .await
            .map_err(store_failure)?;
        if enrolled.is_none() {
            return Err("student is not enrolled in this lecture".to_string());
        }

        let pending = self
            .store
            .find_pending_request(lec_serial, session_number, entry.student_idx)
            .await
            .map_err(store_failure)?;
        let resolution = pending.map(|request| RequestResolution {
            request_idx: request.request_idx,
            status: if status == AttendanceStatus::Absent {
                RequestStatus::Rejected
            } else {
                RequestStatus::Approved
            },
            reject_reason: entry.reject_reason.clone(),
        });

        let record = AttendanceRecord {
            lec_serial: lec_serial.to_string(),
            session_number,
            student_idx: entry.student_idx,
            status,
            approved_by: Some(user.user_id),
            approved_at: now,
            auto_approved: false,
        };
        self.store
            .record_attendance(record, resolution)
            .await
            .map_err(store_failure)
    }

    pub async fn student_view(&self, user: &AuthUser, lec_serial: &str) -> ServiceResult<StudentAttendance> {
        require_enrolled(self.store.as_ref(), user, lec_serial).await?;
        let config = self.grade_config(lec_serial).await?;

        let records = self.store.list_attendance(lec_serial, Some(user.user_id)).await?;
        let requests = self
            .store
            .list_attendance_requests(lec_serial, Some(user.user_id))
            .await?;
        let summary = summarize(&records, &config);

        Ok(StudentAttendance {
            lec_serial: lec_serial.to_string(),
            student_idx: user.user_id,
            records,
            requests,
            summary,
        })
    }

    pub async fn professor_view(&self, user: &AuthUser, lec_serial: &str) -> ServiceResult<CourseAttendance> {
        require_course_professor(self.store.as_ref(), user, lec_serial).await?;
        let config = self.grade_config(lec_serial).await?;

        let mut by_student: HashMap<i64, Vec<AttendanceRecord>> = HashMap::new();
        for record in self.store.list_attendance(lec_serial, None).await? {
            by_student.entry(record.student_idx).or_default().push(record);
        }

        let mut students = Vec::new();
        for enrollment in self.store.list_enrollments(lec_serial).await? {
            let (student_name, student_id) = self
                .store
                .find_user(enrollment.student_idx)
                .await?
                .map(|u| (u.name, u.user_code))
                .unwrap_or_default();
            let records = by_student.remove(&enrollment.student_idx).unwrap_or_default();
            let summary = summarize(&records, &config);
            students.push(StudentAttendanceRow {
                student_idx: enrollment.student_idx,
                student_name,
                student_id,
                records,
                summary,
            });
        }

        let pending_requests = self
            .store
            .list_attendance_requests(lec_serial, None)
            .await?
            .into_iter()
            .filter(|r| r.status == RequestStatus::Pending)
            .collect();

        Ok(CourseAttendance {
            lec_serial: lec_serial.to_string(),
            total_sessions: config.total_sessions,
            students,
            pending_requests,
        })
    }

    /// Auto-approve every pending request whose expiry has passed.
    /// A session that already has a record keeps its status.
    pub async fn process_expired(&self, now: DateTime<Utc>) -> ServiceResult<SweepReport> {
        let expired = self.store.list_expired_requests(now).await?;
        let mut report = SweepReport {
            expired: expired.len(),
            ..Default::default()
        };

        for request in expired {
            let status = self
                .store
                .find_attendance(&request.lec_serial, request.session_number, request.student_idx)
                .await?
                .map_or(AttendanceStatus::Present, |r| r.status);

            let record = AttendanceRecord {
                lec_serial: request.lec_serial.clone(),
                session_number: request.session_number,
                student_idx: request.student_idx,
                status,
                approved_by: None,
                approved_at: now,
                auto_approved: true,
            };
            let resolution = RequestResolution {
                request_idx: request.request_idx,
                status: RequestStatus::Approved,
                reject_reason: None,
            };

            match self.store.record_attendance(record, Some(resolution)).await {
                Ok(()) => report.approved += 1,
                Err(e) => {
                    tracing::error!("Failed to auto-approve attendance request {}: {}", request.request_idx, e);
                    report.failed += 1;
                }
            }
        }

        if report.expired > 0 {
            tracing::info!(
                "Auto-approved {} of {} expired attendance requests",
                report.approved,
                report.expired
            );
        }
        Ok(report)
    }

    async fn grade_config(&self, lec_serial: &str) -> ServiceResult<GradeConfig> {
        load_grade_config(self.store.as_ref(), &self.config.grading, lec_serial).await
    }
}

fn check_session(session_number: u32, config: &GradeConfig) -> ServiceResult<()> {
    if session_number == 0 || session_number > config.total_sessions {
        let mut errors = HashMap::new();
        errors.insert(
            "sessionNumber".to_string(),
            format!("must be between 1 and {}", config.total_sessions),
        );
        return Err(ServiceError::Validation(errors));
    }
    Ok(())
}

fn summarize(records: &[AttendanceRecord], config: &GradeConfig) -> AttendanceScore {
    let tally = AttendanceTally::from_statuses(records.iter().map(|r| r.status));
    score_attendance(&tally, config)
}

fn store_failure(err: DatabaseError) -> String {
    match err {
        DatabaseError::Conflict(msg) | DatabaseError::NotFound(msg) => msg,
        other => {
            tracing::error!("Attendance write failed: {}", other);
            "failed to save attendance".to_string()
        }
    }
}
