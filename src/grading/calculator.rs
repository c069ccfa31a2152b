use serde::{Deserialize, Serialize};

use super::attendance::{score_attendance, AttendanceScore, AttendanceTally};
use super::{percent_of, round2, GradeConfig};

/// One assignment of the course and the student's score on it, if graded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentInput {
    pub assignment_idx: i64,
    pub name: String,
    pub max_score: f64,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentScore {
    pub assignment_idx: i64,
    pub name: String,
    pub score: f64,
    pub max_score: f64,
    pub percentage: f64,
    pub submitted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalScore {
    pub score: f64,
    pub max_score: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeBreakdown {
    pub attendance: AttendanceScore,
    pub assignments: Vec<AssignmentScore>,
    pub assignment_score: f64,
    pub assignment_max_score: f64,
    pub total: TotalScore,
}

/// Combine attendance and assignments into a course total.
///
/// Ungraded assignments contribute 0 points but their max score still
/// counts, so a missing submission lowers the percentage.
pub fn compute_grade(
    tally: &AttendanceTally,
    assignments: &[AssignmentInput],
    config: &GradeConfig,
) -> GradeBreakdown {
    let attendance = score_attendance(tally, config);

    let assignments: Vec<AssignmentScore> = assignments
        .iter()
        .map(|a| {
            let score = a.score.unwrap_or(0.0);
            AssignmentScore {
                assignment_idx: a.assignment_idx,
                name: a.name.clone(),
                score: round2(score),
                max_score: a.max_score,
                percentage: percent_of(score, a.max_score),
                submitted: a.score.is_some(),
            }
        })
        .collect();

    let assignment_score: f64 = assignments.iter().map(|a| a.score).sum();
    let assignment_max_score: f64 = assignments.iter().map(|a| a.max_score).sum();

    let total_score = attendance.score + assignment_score;
    let total_max = attendance.max_score + assignment_max_score;

    GradeBreakdown {
        total: TotalScore {
            score: round2(total_score),
            max_score: round2(total_max),
            percentage: percent_of(total_score, total_max),
        },
        attendance,
        assignments,
        assignment_score: round2(assignment_score),
        assignment_max_score: round2(assignment_max_score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GradingConfig;

    fn assignment(idx: i64, max: f64, score: Option<f64>) -> AssignmentInput {
        AssignmentInput {
            assignment_idx: idx,
            name: format!("HW{}", idx),
            max_score: max,
            score,
        }
    }

    #[test]
    fn totals_attendance_and_assignments() {
        let config = GradeConfig::with_defaults(&GradingConfig::default());
        let tally = AttendanceTally::new(80, 0, 0);
        let grade = compute_grade(
            &tally,
            &[assignment(1, 40.0, Some(30.0)), assignment(2, 40.0, Some(40.0))],
            &config,
        );

        assert_eq!(grade.attendance.score, 20.0);
        assert_eq!(grade.assignment_score, 70.0);
        assert_eq!(grade.total.score, 90.0);
        assert_eq!(grade.total.max_score, 100.0);
        assert_eq!(grade.total.percentage, 90.0);
        assert_eq!(grade.assignments[0].percentage, 75.0);
    }

    #[test]
    fn ungraded_assignment_counts_toward_max() {
        let config = GradeConfig::with_defaults(&GradingConfig::default());
        let tally = AttendanceTally::new(0, 0, 0);
        let grade = compute_grade(
            &tally,
            &[assignment(1, 50.0, Some(50.0)), assignment(2, 30.0, None)],
            &config,
        );

        let missing = &grade.assignments[1];
        assert!(!missing.submitted);
        assert_eq!(missing.score, 0.0);
        assert_eq!(grade.assignment_max_score, 80.0);
        assert_eq!(grade.total.max_score, 100.0);
        assert_eq!(grade.total.percentage, 50.0);
    }

    #[test]
    fn zero_max_yields_zero_percentage() {
        let mut config = GradeConfig::with_defaults(&GradingConfig::default());
        config.attendance_max_score = 0.0;
        let grade = compute_grade(&AttendanceTally::default(), &[], &config);
        assert_eq!(grade.total.max_score, 0.0);
        assert_eq!(grade.total.percentage, 0.0);
    }
}
