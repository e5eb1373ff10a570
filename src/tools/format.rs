//! Output formatting utilities for MCP tools.
//!
//! This module provides the output format type and the renderers used by
//! tools that return record sets. In every text rendering, array cells are
//! flattened to comma-separated text and object cells become compact JSON.

use crate::error::{NlqError, NlqResult};
use crate::models::{JsonMap, QueryResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use unicode_width::UnicodeWidthStr;

/// Output format for query results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON format (default)
    #[default]
    Json,
    /// ASCII table format (like MySQL CLI)
    Table,
    /// Markdown table format
    Markdown,
    /// Comma-separated values with a header row
    Csv,
}

/// Render one cell as display text.
pub fn format_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::Array(items) => items
            .iter()
            .map(format_element)
            .collect::<Vec<_>>()
            .join(", "),
        other => format_element(other),
    }
}

/// Array elements keep nulls empty and nest arrays as JSON.
fn format_element(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Array(_) | JsonValue::Object(_) => {
            serde_json::to_string(value).unwrap_or_default()
        }
    }
}

pub fn format_as_table(
    columns: &[String],
    rows: &[JsonMap],
    execution_time_ms: u64,
) -> String {
    if columns.is_empty() {
        return "Empty set".to_string();
    }

    let mut widths: Vec<usize> = columns.iter().map(|c| c.width()).collect();
    for row in rows {
        for (i, col) in columns.iter().enumerate() {
            if let Some(value) = row.get(col) {
                widths[i] = widths[i].max(format_value(value).width());
            }
        }
    }

    let mut output = String::new();
    let separator: String = widths
        .iter()
        .map(|w| format!("+{}", "-".repeat(w + 2)))
        .collect::<String>()
        + "+\n";

    output.push_str(&separator);
    let header: String = columns
        .iter()
        .zip(&widths)
        .map(|(col, w)| format!("| {} ", pad_center(col, *w)))
        .collect::<String>()
        + "|\n";
    output.push_str(&header);
    output.push_str(&separator);

    for row in rows {
        let row_str: String = columns
            .iter()
            .zip(&widths)
            .map(|(col, w)| {
                let value = row.get(col).unwrap_or(&JsonValue::Null);
                let formatted = format_value(value);
                let fill = " ".repeat(w.saturating_sub(formatted.width()));
                if matches!(value, JsonValue::Number(_)) {
                    format!("| {}{} ", fill, formatted)
                } else {
                    format!("| {}{} ", formatted, fill)
                }
            })
            .collect::<String>()
            + "|\n";
        output.push_str(&row_str);
    }

    output.push_str(&separator);

    let row_text = if rows.len() == 1 { "row" } else { "rows" };
    output.push_str(&format!(
        "{} {} in set ({:.2} sec)\n",
        rows.len(),
        row_text,
        execution_time_ms as f64 / 1000.0
    ));

    output
}

/// Center by display width; `format!` padding counts chars, not columns.
fn pad_center(text: &str, width: usize) -> String {
    let fill = width.saturating_sub(text.width());
    let left = fill / 2;
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(fill - left))
}

pub fn format_as_markdown(columns: &[String], rows: &[JsonMap]) -> String {
    if columns.is_empty() {
        return "*Empty set*".to_string();
    }

    let mut output = String::new();

    let header: String = columns
        .iter()
        .map(|c| format!("| {} ", c))
        .collect::<String>()
        + "|\n";
    output.push_str(&header);

    let sep: String = columns.iter().map(|_| "|---").collect::<String>() + "|\n";
    output.push_str(&sep);

    for row in rows {
        let row_str: String = columns
            .iter()
            .map(|col| {
                let value = row.get(col).unwrap_or(&JsonValue::Null);
                format!("| {} ", format_value(value).replace('|', "\\|"))
            })
            .collect::<String>()
            + "|\n";
        output.push_str(&row_str);
    }

    output.push_str(&format!("\n*{} rows*", rows.len()));

    output
}

/// Header row plus one record per row; null cells are empty.
pub fn format_as_csv(columns: &[String], rows: &[JsonMap]) -> NlqResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let csv_error = |e: csv::Error| NlqError::internal(format!("Failed to write CSV: {}", e));

    writer.write_record(columns).map_err(csv_error)?;
    for row in rows {
        let record = columns.iter().map(|col| match row.get(col) {
            None | Some(JsonValue::Null) => String::new(),
            Some(value) => format_value(value),
        });
        writer.write_record(record).map_err(csv_error)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| NlqError::internal(format!("Failed to flush CSV: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| NlqError::internal(format!("CSV is not UTF-8: {}", e)))
}

/// Text rendering of a record set, or `None` for JSON output and
/// non-record results.
pub fn render(
    result: &QueryResult,
    format: OutputFormat,
    execution_time_ms: u64,
) -> NlqResult<Option<String>> {
    let QueryResult::Records { columns, rows } = result else {
        return Ok(None);
    };

    Ok(match format {
        OutputFormat::Json => None,
        OutputFormat::Table => Some(format_as_table(columns, rows, execution_time_ms)),
        OutputFormat::Markdown => Some(format_as_markdown(columns, rows)),
        OutputFormat::Csv => Some(format_as_csv(columns, rows)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> (Vec<String>, Vec<JsonMap>) {
        let columns = vec!["id".to_string(), "name".to_string(), "tags".to_string()];
        let rows = vec![
            json!({"id": 1, "name": "Alice", "tags": ["red", "blue"]}),
            json!({"id": 22, "name": "Bob, Jr.", "tags": null}),
        ]
        .into_iter()
        .map(|v| v.as_object().unwrap().clone())
        .collect();
        (columns, rows)
    }

    #[test]
    fn test_format_value_flattens_arrays() {
        assert_eq!(format_value(&json!(["a", "b"])), "a, b");
        assert_eq!(format_value(&json!([1, [2, 3]])), "1, [2,3]");
        assert_eq!(format_value(&json!({"k": 1})), r#"{"k":1}"#);
        assert_eq!(format_value(&JsonValue::Null), "NULL");
        assert_eq!(format_value(&json!([])), "");
    }

    #[test]
    fn test_table_alignment() {
        let (columns, rows) = sample();
        let table = format_as_table(&columns, &rows, 1500);
        assert!(table.contains("|  1 | Alice    | red, blue |"));
        assert!(table.contains("| 22 | Bob, Jr. | NULL      |"));
        assert!(table.ends_with("2 rows in set (1.50 sec)\n"));
    }

    #[test]
    fn test_table_wide_characters() {
        let columns = vec!["name".to_string()];
        let rows = vec![json!({"name": "数据库"}).as_object().unwrap().clone()];
        let table = format_as_table(&columns, &rows, 0);
        assert!(table.contains("+--------+"));
        assert!(table.contains("| 数据库 |"));
    }

    #[test]
    fn test_markdown() {
        let (columns, rows) = sample();
        let md = format_as_markdown(&columns, &rows);
        assert!(md.starts_with("| id | name | tags |\n|---|---|---|\n"));
        assert!(md.contains("| 1 | Alice | red, blue |"));
        assert!(md.ends_with("*2 rows*"));
    }

    #[test]
    fn test_csv_quotes_and_nulls() {
        let (columns, rows) = sample();
        let csv = format_as_csv(&columns, &rows).unwrap();
        assert_eq!(csv, "id,name,tags\n1,Alice,\"red, blue\"\n22,\"Bob, Jr.\",\n");
    }

    #[test]
    fn test_render_skips_json_and_non_records() {
        let (columns, rows) = sample();
        let records = QueryResult::Records { columns, rows };
        assert_eq!(render(&records, OutputFormat::Json, 0).unwrap(), None);
        assert!(render(&records, OutputFormat::Csv, 0).unwrap().is_some());

        let affected = QueryResult::RowsAffected { rows_affected: 1 };
        assert_eq!(render(&affected, OutputFormat::Table, 0).unwrap(), None);
    }

    #[test]
    fn test_empty_columns() {
        assert_eq!(format_as_table(&[], &[], 0), "Empty set");
        assert_eq!(format_as_markdown(&[], &[]), "*Empty set*");
    }
}
