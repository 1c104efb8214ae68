//! Plain-text rendering of result sets
//!
//! Resources and the `execute_sql` tool share one layout:
//!
//! ```text
//! id | name  | tags
//! ---+-------+---------
//! 1  | alice | ["a"]
//! 1 row returned
//! ```

use crate::normalize::NormalizedValue;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::fmt::Write as _;

const SEPARATOR: &str = " | ";

/// Ordered columns and rows of normalized cells
#[derive(Debug, Clone, PartialEq)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<NormalizedValue>>,
}

impl RowSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Render as an aligned text table with a row-count footer
    pub fn render(&self) -> String {
        let header: Vec<String> = self.columns.iter().map(|c| escape(c)).collect();
        let body: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(render_cell).collect())
            .collect();

        let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
        for row in &body {
            for (i, cell) in row.iter().enumerate() {
                if let Some(w) = widths.get_mut(i) {
                    *w = (*w).max(cell.chars().count());
                }
            }
        }

        let mut out = String::new();
        if !header.is_empty() {
            push_line(&mut out, &header, &widths);
            let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
            out.push_str(&rule.join("-+-"));
            out.push('\n');
            for row in &body {
                push_line(&mut out, row, &widths);
            }
        }
        out.push_str(&row_count_footer(self.row_count() as u64, "returned"));
        out
    }
}

fn push_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect();
    out.push_str(padded.join(SEPARATOR).trim_end());
    out.push('\n');
}

/// `N row(s) <verb>`
pub fn row_count_footer(count: u64, verb: &str) -> String {
    if count == 1 {
        format!("1 row {}", verb)
    } else {
        format!("{} rows {}", count, verb)
    }
}

/// Single-line text form of a cell
pub fn render_cell(value: &NormalizedValue) -> String {
    match value {
        NormalizedValue::Null => "NULL".to_string(),
        NormalizedValue::Boolean(b) => b.to_string(),
        NormalizedValue::String(s) => escape(s),
        NormalizedValue::Bytes(b) => format!("base64:{}", BASE64.encode(b)),
        NormalizedValue::Integer(i) => i.to_string(),
        NormalizedValue::Float(_) | NormalizedValue::Json(_) => escape(&value.to_json().to_string()),
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '|' => out.push_str("\\|"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{{{:x}}}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_value() {
        let set = RowSet {
            columns: vec!["1".to_string()],
            rows: vec![vec![NormalizedValue::Integer(1)]],
        };
        assert_eq!(set.render(), "1\n-\n1\n1 row returned");
    }

    #[test]
    fn test_alignment() {
        let set = RowSet {
            columns: vec!["id".to_string(), "name".to_string()],
            rows: vec![
                vec![NormalizedValue::Integer(1), NormalizedValue::String("alice".to_string())],
                vec![NormalizedValue::Integer(20), NormalizedValue::Null],
            ],
        };
        let expected = "id | name\n---+------\n1  | alice\n20 | NULL\n2 rows returned";
        assert_eq!(set.render(), expected);
    }

    #[test]
    fn test_empty_set_keeps_header() {
        let set = RowSet::new(vec!["a".to_string(), "bb".to_string()]);
        assert_eq!(set.render(), "a | bb\n--+---\n0 rows returned");
    }

    #[test]
    fn test_cells_are_single_line() {
        assert_eq!(render_cell(&NormalizedValue::String("a|b\nc".to_string())), "a\\|b\\nc");
        assert_eq!(render_cell(&NormalizedValue::Bytes(vec![1, 2, 3])), "base64:AQID");
        assert_eq!(render_cell(&NormalizedValue::Json(json!({"k": [1, true]}))), r#"{"k":[1,true]}"#);
        assert_eq!(render_cell(&NormalizedValue::Boolean(false)), "false");
        assert_eq!(render_cell(&NormalizedValue::Float(2.5)), "2.5");
        assert_eq!(render_cell(&NormalizedValue::Integer(-7)), "-7");
        assert_eq!(render_cell(&NormalizedValue::Float(1e-7)), "1e-7");
    }

    #[test]
    fn test_footer_plural() {
        assert_eq!(row_count_footer(0, "affected"), "0 rows affected");
        assert_eq!(row_count_footer(1, "affected"), "1 row affected");
    }
}
