use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::{round2, GradeDistribution, GradeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LetterGrade {
    A,
    B,
    C,
    D,
    F,
}

impl LetterGrade {
    /// Passing letters, best first.
    pub const PASSING: [LetterGrade; 4] = [LetterGrade::A, LetterGrade::B, LetterGrade::C, LetterGrade::D];
    pub const ALL: [LetterGrade; 5] = [
        LetterGrade::A,
        LetterGrade::B,
        LetterGrade::C,
        LetterGrade::D,
        LetterGrade::F,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LetterGrade::A => "A",
            LetterGrade::B => "B",
            LetterGrade::C => "C",
            LetterGrade::D => "D",
            LetterGrade::F => "F",
        }
    }

    fn bucket(&self) -> usize {
        match self {
            LetterGrade::A => 0,
            LetterGrade::B => 1,
            LetterGrade::C => 2,
            LetterGrade::D => 3,
            LetterGrade::F => 4,
        }
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LetterGrade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(LetterGrade::A),
            "B" => Ok(LetterGrade::B),
            "C" => Ok(LetterGrade::C),
            "D" => Ok(LetterGrade::D),
            "F" => Ok(LetterGrade::F),
            other => Err(format!("unknown letter grade '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RosterEntry {
    pub student_idx: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalGrade {
    pub student_idx: i64,
    pub percentage: f64,
    pub letter_grade: LetterGrade,
    pub rank: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeStats {
    pub grade_counts: BTreeMap<LetterGrade, u32>,
    pub total_students: u32,
    pub passing_students: u32,
    pub failing_students: u32,
    pub average_percentage: f64,
    pub passing_threshold: f64,
    pub distribution: GradeDistribution,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeOutcome {
    /// Ranked best first.
    pub grades: Vec<FinalGrade>,
    pub stats: FinalizeStats,
}

fn by_percentage_desc(a: &RosterEntry, b: &RosterEntry) -> Ordering {
    b.percentage
        .total_cmp(&a.percentage)
        .then(a.student_idx.cmp(&b.student_idx))
}

/// Assign letter grades to a whole course roster.
///
/// Students below `passing_threshold` receive `F`. Bucket capacities are
/// `ceil(roster * share / 100)` and failing students use them up from the
/// bottom (D first). Passing students then fill A, B, C, D in ranked order;
/// a bucket whose capacity runs out inside a group of equal percentages takes
/// the whole group. Passing students still unplaced after D, which only
/// happens when the shares sum below 100, receive A.
pub fn finalize(
    roster: &[RosterEntry],
    distribution: &GradeDistribution,
    passing_threshold: f64,
) -> Result<FinalizeOutcome, GradeError> {
    if roster.is_empty() {
        return Err(GradeError::EmptyRoster("no enrolled students to finalize".to_string()));
    }

    let total = roster.len();
    let mut ranked: Vec<RosterEntry> = roster.to_vec();
    ranked.sort_by(by_percentage_desc);

    let mut capacity = [0usize; 4];
    for letter in LetterGrade::PASSING {
        let share = distribution.share(letter).max(0.0);
        capacity[letter.bucket()] = (total as f64 * share / 100.0).ceil() as usize;
    }

    let passing_count = ranked
        .iter()
        .take_while(|entry| entry.percentage >= passing_threshold)
        .count();
    let failing_count = total - passing_count;

    let mut unplaced_failures = failing_count;
    for letter in LetterGrade::PASSING.iter().rev() {
        let slot = &mut capacity[letter.bucket()];
        let used = (*slot).min(unplaced_failures);
        *slot -= used;
        unplaced_failures -= used;
    }

    let mut letters = vec![LetterGrade::F; total];
    let mut cursor = 0;
    for letter in LetterGrade::PASSING {
        let cap = capacity[letter.bucket()];
        if cap == 0 || cursor >= passing_count {
            continue;
        }
        let mut end = (cursor + cap).min(passing_count);
        while end < passing_count && ranked[end].percentage == ranked[end - 1].percentage {
            end += 1;
        }
        for slot in &mut letters[cursor..end] {
            *slot = letter;
        }
        cursor = end;
    }
    for slot in &mut letters[cursor..passing_count] {
        *slot = LetterGrade::A;
    }

    let mut grades = Vec::with_capacity(total);
    let mut rank = 0u32;
    for (i, (entry, letter)) in ranked.iter().zip(letters.iter()).enumerate() {
        if i == 0 || entry.percentage != ranked[i - 1].percentage {
            rank = i as u32 + 1;
        }
        grades.push(FinalGrade {
            student_idx: entry.student_idx,
            percentage: entry.percentage,
            letter_grade: *letter,
            rank,
        });
    }

    let mut grade_counts: BTreeMap<LetterGrade, u32> =
        LetterGrade::ALL.iter().map(|letter| (*letter, 0)).collect();
    for grade in &grades {
        *grade_counts.entry(grade.letter_grade).or_insert(0) += 1;
    }

    let average = ranked.iter().map(|e| e.percentage).sum::<f64>() / total as f64;

    Ok(FinalizeOutcome {
        grades,
        stats: FinalizeStats {
            grade_counts,
            total_students: total as u32,
            passing_students: passing_count as u32,
            failing_students: failing_count as u32,
            average_percentage: round2(average),
            passing_threshold,
            distribution: *distribution,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(percentages: &[f64]) -> Vec<RosterEntry> {
        percentages
            .iter()
            .enumerate()
            .map(|(i, p)| RosterEntry {
                student_idx: i as i64 + 1,
                percentage: *p,
            })
            .collect()
    }

    fn letters(outcome: &FinalizeOutcome) -> Vec<&'static str> {
        outcome.grades.iter().map(|g| g.letter_grade.as_str()).collect()
    }

    #[test]
    fn ten_passing_students_follow_default_distribution() {
        let input = roster(&[95.0, 91.0, 88.0, 85.0, 82.0, 79.0, 76.0, 72.0, 68.0, 64.0]);
        let outcome = finalize(&input, &GradeDistribution::default(), 60.0).unwrap();
        assert_eq!(letters(&outcome), ["A", "A", "A", "B", "B", "B", "B", "C", "C", "D"]);
        assert_eq!(outcome.stats.passing_students, 10);
        assert_eq!(outcome.stats.grade_counts[&LetterGrade::B], 4);
    }

    #[test]
    fn failing_students_consume_buckets_from_the_bottom() {
        // caps over 10 students: A3 B4 C2 D1. Three failures use D1 and C2.
        let input = roster(&[95.0, 91.0, 88.0, 85.0, 82.0, 79.0, 76.0, 50.0, 40.0, 30.0]);
        let outcome = finalize(&input, &GradeDistribution::default(), 60.0).unwrap();
        assert_eq!(letters(&outcome), ["A", "A", "A", "B", "B", "B", "B", "F", "F", "F"]);
        assert_eq!(outcome.stats.failing_students, 3);
        assert_eq!(outcome.stats.grade_counts[&LetterGrade::C], 0);
    }

    #[test]
    fn ties_share_a_letter_and_rank() {
        let input = roster(&[90.0, 80.0, 80.0, 80.0, 70.0]);
        let dist = GradeDistribution { a: 20.0, b: 20.0, c: 40.0, d: 20.0 };
        let outcome = finalize(&input, &dist, 60.0).unwrap();

        // B has capacity 1 but takes all three students at 80.
        assert_eq!(letters(&outcome), ["A", "B", "B", "B", "C"]);
        let ranks: Vec<u32> = outcome.grades.iter().map(|g| g.rank).collect();
        assert_eq!(ranks, [1, 2, 2, 2, 5]);
    }

    #[test]
    fn leftover_passing_students_get_a() {
        let input = roster(&[90.0, 85.0, 80.0, 75.0]);
        let dist = GradeDistribution { a: 25.0, b: 25.0, c: 0.0, d: 0.0 };
        let outcome = finalize(&input, &dist, 60.0).unwrap();
        assert_eq!(letters(&outcome), ["A", "B", "A", "A"]);
    }

    #[test]
    fn short_distribution_with_failure_leaves_remaining_passers_at_a() {
        // caps over 5 students: A1 B1 C0 D0; the single failure eats B.
        let input = roster(&[90.0, 85.0, 80.0, 75.0, 50.0]);
        let dist = GradeDistribution { a: 20.0, b: 20.0, c: 0.0, d: 0.0 };
        let outcome = finalize(&input, &dist, 60.0).unwrap();
        assert_eq!(letters(&outcome), ["A", "A", "A", "A", "F"]);
        assert_eq!(outcome.stats.grade_counts[&LetterGrade::A], 4);
    }

    #[test]
    fn empty_roster_is_an_error() {
        assert!(finalize(&[], &GradeDistribution::default(), 60.0).is_err());
    }

    #[test]
    fn stats_report_average_and_threshold() {
        let input = roster(&[100.0, 50.0, 75.5]);
        let outcome = finalize(&input, &GradeDistribution::default(), 70.0).unwrap();
        assert_eq!(outcome.stats.average_percentage, 75.17);
        assert_eq!(outcome.stats.passing_threshold, 70.0);
        assert_eq!(outcome.stats.total_students, 3);
    }

    #[test]
    fn letters_form_contiguous_ranges_over_the_ranking() {
        let distributions = [
            GradeDistribution::default(),
            GradeDistribution { a: 10.0, b: 10.0, c: 10.0, d: 10.0 },
            GradeDistribution { a: 50.0, b: 50.0, c: 50.0, d: 50.0 },
            GradeDistribution { a: 0.0, b: 100.0, c: 0.0, d: 0.0 },
        ];
        for size in 1..=40usize {
            // deterministic pseudo-random percentages with plenty of ties
            let percentages: Vec<f64> = (0..size)
                .map(|i| ((i * 37 + size * 11) % 23) as f64 * 4.5)
                .collect();
            let input = roster(&percentages);
            for dist in &distributions {
                for threshold in [0.0, 40.0, 60.0] {
                    let outcome = finalize(&input, dist, threshold).unwrap();
                    assert_eq!(outcome.grades.len(), size);

                    // Letters never improve further down the ranking once
                    // the buckets cover the roster.
                    for pair in outcome.grades.windows(2) {
                        assert!(pair[0].percentage >= pair[1].percentage);
                        if dist.sum() >= 100.0 {
                            assert!(pair[0].letter_grade <= pair[1].letter_grade);
                        }
                        if pair[0].percentage == pair[1].percentage {
                            assert_eq!(pair[0].letter_grade, pair[1].letter_grade);
                            assert_eq!(pair[0].rank, pair[1].rank);
                        }
                    }
                    // F exactly for the students under the threshold.
                    for grade in &outcome.grades {
                        assert_eq!(grade.letter_grade == LetterGrade::F, grade.percentage < threshold);
                    }
                    let counted: u32 = outcome.stats.grade_counts.values().sum();
                    assert_eq!(counted as usize, size);
                }
            }
        }
    }

    #[test]
    fn bucket_sizes_stay_within_ceiling_when_no_ties() {
        let percentages: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        let outcome = finalize(&roster(&percentages), &GradeDistribution::default(), 0.0).unwrap();
        let counts = &outcome.stats.grade_counts;
        assert_eq!(counts[&LetterGrade::A], 6);
        assert_eq!(counts[&LetterGrade::B], 8);
        assert_eq!(counts[&LetterGrade::C], 4);
        assert_eq!(counts[&LetterGrade::D], 2);
    }
}
