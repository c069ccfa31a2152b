//! Grade engine: attendance scoring, assignment aggregation and the
//! percentile-based letter grade distribution used at finalization.
//!
//! Everything in here is synchronous and storage-free. Services load the
//! records, hand them to these functions and persist the outcome.

use std::collections::HashMap;

pub mod attendance;
pub mod calculator;
pub mod config;
pub mod finalizer;
pub mod list;

pub use attendance::{score_attendance, AttendanceScore, AttendanceStatus, AttendanceTally};
pub use calculator::{compute_grade, AssignmentInput, AssignmentScore, GradeBreakdown, TotalScore};
pub use config::{GradeConfig, GradeConfigUpdate, GradeDistribution, GradePolicy};
pub use finalizer::{finalize, FinalGrade, FinalizeOutcome, FinalizeStats, LetterGrade, RosterEntry};
pub use list::{class_statistics, paginate, rank_rows, ClassStatistics, GradeRow, ListQuery, Page, SortBy, SortOrder};

#[derive(Debug, thiserror::Error)]
pub enum GradeError {
    #[error("invalid grade configuration: {0:?}")]
    InvalidConfig(HashMap<String, String>),

    #[error("{0}")]
    EmptyRoster(String),
}

/// Round to two decimal places, half away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `part / whole` as a percentage with two decimals; 0 when `whole` is not positive.
pub fn percent_of(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        round2(part / whole * 100.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(round2(71.004), 71.0);
        assert_eq!(round2(2.675_1), 2.68);
        assert_eq!(round2(-0.0), 0.0);
    }

    #[test]
    fn percent_of_zero_whole_is_zero() {
        assert_eq!(percent_of(5.0, 0.0), 0.0);
        assert_eq!(percent_of(1.0, 3.0), 33.33);
    }
}
