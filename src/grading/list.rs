use serde::{Deserialize, Serialize};

use super::calculator::GradeBreakdown;
use super::finalizer::LetterGrade;
use super::round2;

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    #[default]
    Percentage,
    Name,
    StudentId,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default)]
    pub sort_order: SortOrder,
    #[serde(default)]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub size: usize,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            sort_by: SortBy::default(),
            sort_order: SortOrder::default(),
            page: 0,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRow {
    pub student_idx: i64,
    pub student_name: String,
    pub student_id: String,
    #[serde(flatten)]
    pub grade: GradeBreakdown,
    pub percentage: f64,
    pub letter_grade: Option<LetterGrade>,
    pub rank: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub total_elements: usize,
    pub total_pages: usize,
    pub current_page: usize,
    pub page_size: usize,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
}

/// Sort rows in place and number them 1..n in the resulting order.
pub fn rank_rows(rows: &mut [GradeRow], sort_by: SortBy, order: SortOrder) {
    rows.sort_by(|a, b| {
        let primary = match sort_by {
            SortBy::Percentage => a.percentage.total_cmp(&b.percentage),
            SortBy::Name => a.student_name.to_lowercase().cmp(&b.student_name.to_lowercase()),
            SortBy::StudentId => a.student_id.cmp(&b.student_id),
        };
        let primary = match order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        primary.then(a.student_idx.cmp(&b.student_idx))
    });
    for (i, row) in rows.iter_mut().enumerate() {
        row.rank = i as u32 + 1;
    }
}

/// Slice a sorted collection into a zero-based page. `size` is clamped to 1..=100.
pub fn paginate<T>(items: Vec<T>, query: &ListQuery) -> Page<T> {
    let page_size = query.size.clamp(1, MAX_PAGE_SIZE);
    let total_elements = items.len();
    let total_pages = total_elements.div_ceil(page_size);
    let content = items
        .into_iter()
        .skip(query.page.saturating_mul(page_size))
        .take(page_size)
        .collect();

    Page {
        content,
        total_elements,
        total_pages,
        current_page: query.page,
        page_size,
        sort_by: query.sort_by,
        sort_order: query.sort_order,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassStatistics {
    pub rank: u32,
    pub total_students: u32,
    pub class_average: f64,
}

/// Competition rank of `student_idx` within the roster plus the class average.
pub fn class_statistics(percentages: &[(i64, f64)], student_idx: i64) -> Option<ClassStatistics> {
    let own = percentages.iter().find(|(idx, _)| *idx == student_idx)?.1;
    let better = percentages.iter().filter(|(_, p)| *p > own).count();
    let average = percentages.iter().map(|(_, p)| p).sum::<f64>() / percentages.len() as f64;

    Some(ClassStatistics {
        rank: better as u32 + 1,
        total_students: percentages.len() as u32,
        class_average: round2(average),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GradingConfig;
    use crate::grading::{compute_grade, AttendanceTally, GradeConfig};

    fn row(idx: i64, name: &str, code: &str, percentage: f64) -> GradeRow {
        let config = GradeConfig::with_defaults(&GradingConfig::default());
        GradeRow {
            student_idx: idx,
            student_name: name.to_string(),
            student_id: code.to_string(),
            grade: compute_grade(&AttendanceTally::default(), &[], &config),
            percentage,
            letter_grade: None,
            rank: 0,
        }
    }

    fn sample() -> Vec<GradeRow> {
        vec![
            row(1, "Kim", "2024003", 70.0),
            row(2, "Lee", "2024001", 95.0),
            row(3, "park", "2024002", 82.5),
        ]
    }

    #[test]
    fn default_sort_is_percentage_descending() {
        let mut rows = sample();
        let query = ListQuery::default();
        rank_rows(&mut rows, query.sort_by, query.sort_order);
        let order: Vec<i64> = rows.iter().map(|r| r.student_idx).collect();
        assert_eq!(order, [2, 3, 1]);
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[2].rank, 3);
    }

    #[test]
    fn sorts_by_name_case_insensitively() {
        let mut rows = sample();
        rank_rows(&mut rows, SortBy::Name, SortOrder::Asc);
        let names: Vec<&str> = rows.iter().map(|r| r.student_name.as_str()).collect();
        assert_eq!(names, ["Kim", "Lee", "park"]);
    }

    #[test]
    fn sorts_by_student_id() {
        let mut rows = sample();
        rank_rows(&mut rows, SortBy::StudentId, SortOrder::Asc);
        assert_eq!(rows[0].student_id, "2024001");
    }

    #[test]
    fn paginates_with_totals() {
        let items: Vec<u32> = (0..45).collect();
        let query = ListQuery { page: 2, size: 20, ..Default::default() };
        let page = paginate(items, &query);
        assert_eq!(page.total_elements, 45);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.content, (40..45).collect::<Vec<u32>>());
    }

    #[test]
    fn page_past_the_end_is_empty() {
        let query = ListQuery { page: 9, size: 0, ..Default::default() };
        let page = paginate(vec![1, 2, 3], &query);
        assert_eq!(page.page_size, 1);
        assert!(page.content.is_empty());
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn query_defaults_from_empty_json() {
        let query: ListQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.sort_by, SortBy::Percentage);
        assert_eq!(query.sort_order, SortOrder::Desc);
        assert_eq!(query.size, DEFAULT_PAGE_SIZE);

        let query: ListQuery =
            serde_json::from_str(r#"{"sortBy":"studentId","sortOrder":"asc","page":1}"#).unwrap();
        assert_eq!(query.sort_by, SortBy::StudentId);
        assert_eq!(query.page, 1);
    }

    #[test]
    fn statistics_use_competition_rank() {
        let roster = [(1, 90.0), (2, 80.0), (3, 80.0), (4, 50.0)];
        let stats = class_statistics(&roster, 3).unwrap();
        assert_eq!(stats.rank, 2);
        assert_eq!(stats.total_students, 4);
        assert_eq!(stats.class_average, 75.0);
        assert!(class_statistics(&roster, 99).is_none());
    }
}
