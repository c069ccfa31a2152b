use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::grading::LetterGrade;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lecture {
    pub lec_serial: String,
    pub title: String,
    pub professor_idx: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLecture {
    pub lec_serial: String,
    pub title: String,
    pub professor_idx: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub lec_serial: String,
    pub student_idx: i64,
    pub enrolled_at: DateTime<Utc>,
    pub letter_grade: Option<LetterGrade>,
    pub rank: Option<u32>,
    pub finalized_at: Option<DateTime<Utc>>,
}

impl Enrollment {
    pub fn is_finalized(&self) -> bool {
        self.finalized_at.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub assignment_idx: i64,
    pub lec_serial: String,
    pub name: String,
    pub max_score: f64,
    pub due_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub lec_serial: String,
    pub name: String,
    pub max_score: f64,
    pub due_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentGrade {
    pub assignment_idx: i64,
    pub student_idx: i64,
    pub score: f64,
    pub graded_at: DateTime<Utc>,
}
