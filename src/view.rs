use std::cmp::Ordering;

use derive_setters::Setters;
use rayon::prelude::*;

use crate::rows::{Row, Value};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

// Transient query state feeding compute_view. Not persisted.
#[derive(Debug, Clone, Setters)]
pub struct ViewQuery {
    pub search_text: String,
    pub sort_key: Option<String>,
    pub sort_direction: SortDirection,
    pub page_index: usize,
    pub page_size: usize,
}

impl Default for ViewQuery {
    fn default() -> Self {
        ViewQuery {
            search_text: String::new(),
            sort_key: None,
            sort_direction: SortDirection::Ascending,
            page_index: 0,
            page_size: 10,
        }
    }
}

pub struct View {
    pub items: Vec<Row>,
    pub total_count: usize,
}

// Pure filter -> sort -> paginate pipeline over a row snapshot.
// total_count is the filtered, pre-pagination length.
pub fn compute_view(rows: &[Row], query: &ViewQuery) -> View {
    let needle = query.search_text.trim().to_lowercase();
    let mut filtered: Vec<&Row> = if needle.is_empty() {
        rows.iter().collect()
    } else {
        rows.par_iter()
            .filter(|row| row_matches(row, &needle))
            .collect()
    };

    if let Some(key) = &query.sort_key {
        filtered.sort_by(|a, b| {
            let ord = compare_values(a.get(key), b.get(key));
            match query.sort_direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            }
        });
    }

    let total_count = filtered.len();
    let begin = query.page_index.saturating_mul(query.page_size);
    let end = std::cmp::min(begin.saturating_add(query.page_size), total_count);
    let items = if begin >= total_count {
        Vec::new()
    } else {
        filtered[begin..end].iter().map(|r| (*r).clone()).collect()
    };

    View { items, total_count }
}

// A row matches if any field value, rendered as a string, contains the
// lowercased needle.
fn row_matches(row: &Row, needle: &str) -> bool {
    row.values()
        .any(|v| v.to_string().to_lowercase().contains(needle))
}

// Absent values sort before present ones (so first in ascending order,
// last in descending once the caller reverses). Numbers compare
// numerically, strings lexicographically, mixed types via string
// coercion.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a.as_num(), b.as_num()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => {
                if let (Value::Str(x), Value::Str(y)) = (a, b) {
                    x.cmp(y)
                } else {
                    a.to_string().cmp(&b.to_string())
                }
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, name: &str, email: &str) -> Row {
        Row::new(id, name, email)
    }

    fn aged(id: &str, age: Option<i64>) -> Row {
        let mut r = row(id, "X", "x@example.com");
        if let Some(age) = age {
            r.set("age", Value::Int(age));
        }
        r
    }

    fn ids(view: &View) -> Vec<String> {
        view.items.iter().map(|r| r.id().to_string()).collect()
    }

    #[test]
    fn empty_search_keeps_all_rows() {
        let rows = vec![row("1", "A", "a@x.com"), row("2", "B", "b@x.com")];
        let view = compute_view(&rows, &ViewQuery::default());
        assert_eq!(view.total_count, 2);
        assert_eq!(view.items.len(), 2);
    }

    #[test]
    fn search_matches_any_field_case_insensitive() {
        let rows = vec![
            row("1", "Zed", "alice@example.com"),
            row("2", "Bob", "bob@example.com"),
        ];
        let query = ViewQuery::default().search_text("  ALICE ".to_string());
        let view = compute_view(&rows, &query);
        assert_eq!(view.total_count, 1);
        assert_eq!(ids(&view), vec!["1"]);
    }

    #[test]
    fn search_sees_numeric_fields_as_strings() {
        let rows = vec![aged("1", Some(34)), aged("2", Some(29))];
        let query = ViewQuery::default().search_text("34".to_string());
        let view = compute_view(&rows, &query);
        assert_eq!(ids(&view), vec!["1"]);
    }

    #[test]
    fn sort_ascending_puts_absent_first() {
        let rows = vec![aged("a", Some(30)), aged("b", None), aged("c", Some(20))];
        let query = ViewQuery::default().sort_key(Some("age".to_string()));
        let view = compute_view(&rows, &query);
        assert_eq!(ids(&view), vec!["b", "c", "a"]);
    }

    #[test]
    fn sort_descending_puts_absent_last() {
        let rows = vec![aged("a", Some(30)), aged("b", None), aged("c", Some(20))];
        let query = ViewQuery::default()
            .sort_key(Some("age".to_string()))
            .sort_direction(SortDirection::Descending);
        let view = compute_view(&rows, &query);
        assert_eq!(ids(&view), vec!["a", "c", "b"]);
    }

    #[test]
    fn sort_mixed_types_falls_back_to_string_coercion() {
        let mut a = aged("a", None);
        a.set("age", Value::from("29"));
        let rows = vec![a, aged("b", Some(3))];
        let query = ViewQuery::default().sort_key(Some("age".to_string()));
        let view = compute_view(&rows, &query);
        // "29" < "3" as strings
        assert_eq!(ids(&view), vec!["a", "b"]);
    }

    #[test]
    fn sort_strings_is_lexicographic() {
        let rows = vec![
            row("1", "carol", "c@x.com"),
            row("2", "Alice", "a@x.com"),
            row("3", "bob", "b@x.com"),
        ];
        let query = ViewQuery::default().sort_key(Some("name".to_string()));
        let view = compute_view(&rows, &query);
        // Uppercase sorts before lowercase by code unit
        assert_eq!(ids(&view), vec!["2", "3", "1"]);
    }

    #[test]
    fn pagination_slices_and_reports_total() {
        let rows: Vec<Row> = (0..12).map(|i| row(&format!("{}", i), "N", "n@x.com")).collect();
        let query = ViewQuery::default().page_index(1).page_size(5);
        let view = compute_view(&rows, &query);
        assert_eq!(view.total_count, 12);
        assert_eq!(ids(&view), vec!["5", "6", "7", "8", "9"]);
    }

    #[test]
    fn page_past_the_end_is_empty() {
        let rows = vec![row("1", "A", "a@x.com")];
        let query = ViewQuery::default().page_index(7).page_size(5);
        let view = compute_view(&rows, &query);
        assert_eq!(view.total_count, 1);
        assert!(view.items.is_empty());
    }

    #[test]
    fn filter_applies_before_pagination() {
        let rows: Vec<Row> = (0..8)
            .map(|i| {
                if i % 2 == 0 {
                    row(&format!("{}", i), "even", "e@x.com")
                } else {
                    row(&format!("{}", i), "odd", "o@x.com")
                }
            })
            .collect();
        let query = ViewQuery::default()
            .search_text("even".to_string())
            .page_index(1)
            .page_size(2);
        let view = compute_view(&rows, &query);
        assert_eq!(view.total_count, 4);
        assert_eq!(ids(&view), vec!["4", "6"]);
    }
}
