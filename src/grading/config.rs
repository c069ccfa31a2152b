use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::finalizer::LetterGrade;
use super::GradeError;
use crate::config::GradingConfig;

const DISTRIBUTION_EPSILON: f64 = 1e-6;

/// Target share of the roster, in percent, for each passing letter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GradeDistribution {
    #[serde(rename = "A")]
    pub a: f64,
    #[serde(rename = "B")]
    pub b: f64,
    #[serde(rename = "C")]
    pub c: f64,
    #[serde(rename = "D")]
    pub d: f64,
}

impl Default for GradeDistribution {
    fn default() -> Self {
        Self { a: 30.0, b: 40.0, c: 20.0, d: 10.0 }
    }
}

impl GradeDistribution {
    pub fn sum(&self) -> f64 {
        self.a + self.b + self.c + self.d
    }

    /// Percentage for a passing letter. `F` has no bucket.
    pub fn share(&self, letter: LetterGrade) -> f64 {
        match letter {
            LetterGrade::A => self.a,
            LetterGrade::B => self.b,
            LetterGrade::C => self.c,
            LetterGrade::D => self.d,
            LetterGrade::F => 0.0,
        }
    }

    fn collect_errors(&self, errors: &mut HashMap<String, String>) {
        for (letter, value) in [("A", self.a), ("B", self.b), ("C", self.c), ("D", self.d)] {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                errors.insert(
                    format!("gradeDistribution.{}", letter),
                    "must be between 0 and 100".to_string(),
                );
            }
        }
    }

    /// Non-fatal problems worth surfacing to the professor.
    pub fn warnings(&self) -> Vec<String> {
        let sum = self.sum();
        if (sum - 100.0).abs() > DISTRIBUTION_EPSILON {
            vec![format!("gradeDistribution sums to {}, expected 100", sum)]
        } else {
            Vec::new()
        }
    }
}

/// The part of a course's policy echoed back next to computed grades.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GradePolicy {
    pub attendance_max_score: f64,
    pub late_penalty_per_session: f64,
    pub grade_distribution: GradeDistribution,
}

/// Per-course grading policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GradeConfig {
    pub attendance_max_score: f64,
    pub late_penalty_per_session: f64,
    pub total_sessions: u32,
    pub grade_distribution: GradeDistribution,
    /// Sum of assignment max scores, derived from the course's assignments.
    #[serde(default)]
    pub assignment_total_max_score: f64,
    pub configured_at: Option<DateTime<Utc>>,
}

impl GradeConfig {
    pub fn policy(&self) -> GradePolicy {
        GradePolicy {
            attendance_max_score: self.attendance_max_score,
            late_penalty_per_session: self.late_penalty_per_session,
            grade_distribution: self.grade_distribution,
        }
    }

    pub fn with_defaults(defaults: &GradingConfig) -> Self {
        Self {
            attendance_max_score: defaults.default_attendance_max_score,
            late_penalty_per_session: 0.0,
            total_sessions: defaults.default_total_sessions,
            grade_distribution: GradeDistribution::default(),
            assignment_total_max_score: 0.0,
            configured_at: None,
        }
    }

    /// Merge a partial update into this config. Fields left out keep their current value.
    pub fn apply(&self, update: &GradeConfigUpdate, now: DateTime<Utc>) -> Result<GradeConfig, GradeError> {
        let merged = GradeConfig {
            attendance_max_score: update.attendance_max_score.unwrap_or(self.attendance_max_score),
            late_penalty_per_session: update
                .late_penalty_per_session
                .unwrap_or(self.late_penalty_per_session),
            total_sessions: update.total_sessions.unwrap_or(self.total_sessions),
            grade_distribution: update.grade_distribution.unwrap_or(self.grade_distribution),
            assignment_total_max_score: self.assignment_total_max_score,
            configured_at: Some(now),
        };
        merged.validate()?;
        Ok(merged)
    }

    pub fn validate(&self) -> Result<(), GradeError> {
        let mut errors = HashMap::new();

        if !self.attendance_max_score.is_finite() || self.attendance_max_score < 0.0 {
            errors.insert(
                "attendanceMaxScore".to_string(),
                "must be a non-negative number".to_string(),
            );
        }
        if !self.late_penalty_per_session.is_finite()
            || !(0.0..=1.0).contains(&self.late_penalty_per_session)
        {
            errors.insert(
                "latePenaltyPerSession".to_string(),
                "must be between 0 and 1".to_string(),
            );
        }
        if self.total_sessions == 0 {
            errors.insert("totalSessions".to_string(), "must be at least 1".to_string());
        }
        self.grade_distribution.collect_errors(&mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(GradeError::InvalidConfig(errors))
        }
    }

    pub fn warnings(&self) -> Vec<String> {
        self.grade_distribution.warnings()
    }
}

/// Body of a `set-config` request. Unknown keys, `assignmentTotalScore`
/// included, are dropped by serde.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeConfigUpdate {
    pub attendance_max_score: Option<f64>,
    pub late_penalty_per_session: Option<f64>,
    pub total_sessions: Option<u32>,
    pub grade_distribution: Option<GradeDistribution>,
}
