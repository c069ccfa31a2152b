use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::grading::AttendanceStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub lec_serial: String,
    pub session_number: u32,
    pub student_idx: i64,
    pub status: AttendanceStatus,
    pub approved_by: Option<i64>,
    pub approved_at: DateTime<Utc>,
    pub auto_approved: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Approved => "APPROVED",
            RequestStatus::Rejected => "REJECTED",
        }
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(RequestStatus::Pending),
            "APPROVED" => Ok(RequestStatus::Approved),
            "REJECTED" => Ok(RequestStatus::Rejected),
            other => Err(format!("unknown request status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRequest {
    pub request_idx: i64,
    pub lec_serial: String,
    pub session_number: u32,
    pub student_idx: i64,
    pub request_reason: Option<String>,
    pub status: RequestStatus,
    pub requested_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<i64>,
    pub reject_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewAttendanceRequest {
    pub lec_serial: String,
    pub session_number: u32,
    pub student_idx: i64,
    pub request_reason: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Closes a pending request in the same write that stores the attendance record.
#[derive(Debug, Clone)]
pub struct RequestResolution {
    pub request_idx: i64,
    pub status: RequestStatus,
    pub reject_reason: Option<String>,
}
