use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{percent_of, round2, GradeConfig};

/// Attendance mark for one session. Serialized with the Korean marks used on the roll sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttendanceStatus {
    #[serde(rename = "출", alias = "present", alias = "PRESENT")]
    Present,
    #[serde(rename = "지", alias = "late", alias = "LATE")]
    Late,
    #[serde(rename = "결", alias = "absent", alias = "ABSENT")]
    Absent,
}

impl AttendanceStatus {
    pub fn mark(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "출",
            AttendanceStatus::Late => "지",
            AttendanceStatus::Absent => "결",
        }
    }

    /// Late still counts as attended.
    pub fn is_attended(&self) -> bool {
        !matches!(self, AttendanceStatus::Absent)
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mark())
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "출" => Ok(AttendanceStatus::Present),
            "지" => Ok(AttendanceStatus::Late),
            "결" => Ok(AttendanceStatus::Absent),
            other => match other.to_ascii_lowercase().as_str() {
                "present" => Ok(AttendanceStatus::Present),
                "late" => Ok(AttendanceStatus::Late),
                "absent" => Ok(AttendanceStatus::Absent),
                _ => Err(format!("unknown attendance status '{}'", other)),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceTally {
    pub present: u32,
    pub late: u32,
    pub absent: u32,
}

impl AttendanceTally {
    pub fn new(present: u32, late: u32, absent: u32) -> Self {
        Self { present, late, absent }
    }

    pub fn from_statuses<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = AttendanceStatus>,
    {
        let mut tally = Self::default();
        for status in statuses {
            tally.record(status);
        }
        tally
    }

    pub fn record(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Late => self.late += 1,
            AttendanceStatus::Absent => self.absent += 1,
        }
    }

    pub fn attended(&self) -> u32 {
        self.present + self.late
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceScore {
    pub present_count: u32,
    pub late_count: u32,
    pub absent_count: u32,
    pub attended_count: u32,
    pub total_sessions: u32,
    /// Attended share of the course's sessions, in percent, capped at 100.
    pub attendance_rate: f64,
    pub raw_score: f64,
    pub late_penalty: f64,
    pub score: f64,
    pub max_score: f64,
    pub percentage: f64,
}

/// score = max(0, min(attended / totalSessions, 1) * max - late * penalty)
pub fn score_attendance(tally: &AttendanceTally, config: &GradeConfig) -> AttendanceScore {
    let attended = tally.attended();
    let rate = if config.total_sessions > 0 {
        (attended as f64 / config.total_sessions as f64).min(1.0)
    } else {
        0.0
    };

    let raw = rate * config.attendance_max_score;
    let penalty = tally.late as f64 * config.late_penalty_per_session;
    let score = round2((raw - penalty).max(0.0));

    AttendanceScore {
        present_count: tally.present,
        late_count: tally.late,
        absent_count: tally.absent,
        attended_count: attended,
        total_sessions: config.total_sessions,
        attendance_rate: round2(rate * 100.0),
        raw_score: round2(raw),
        late_penalty: round2(penalty),
        score,
        max_score: config.attendance_max_score,
        percentage: percent_of(score, config.attendance_max_score),
    }
}
