// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Text rendering of compute results

use serde_json::Value;

/// Maximum rows rendered in a Markdown table
pub const MAX_TABLE_ROWS: usize = 50;

/// Integral values print without a fraction; others with two decimals.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        format!("{}", n as i64)
    } else {
        format!("{:.2}", n)
    }
}

/// Render a value as observation text.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.as_f64().map(format_number).unwrap_or_else(|| n.to_string()),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(_) | Value::Object(_) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
    }
}

/// Render a cell: scalars inline, nested values as compact JSON.
fn render_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => value
            .map(|v| v.to_string())
            .unwrap_or_default(),
        Some(other) => render_value(other).replace('|', "\\|"),
    }
}

/// Render rows as a Markdown table.
///
/// `columns` selects and orders the columns; when empty the columns are the
/// keys of the rows in first-seen order. Scalar lists render as one `value`
/// column, objects as `key | value` pairs.
pub fn markdown_table(value: &Value, columns: &[String]) -> String {
    let rows: Vec<Value> = match value {
        Value::Array(items) => items.clone(),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| serde_json::json!({"key": k, "value": v}))
            .collect(),
        other => return render_value(other),
    };

    if rows.is_empty() {
        return "No data to display.".to_string();
    }

    let tabular = rows.iter().all(Value::is_object);
    let headers: Vec<String> = if !tabular {
        vec!["value".to_string()]
    } else if !columns.is_empty() {
        columns.to_vec()
    } else {
        let mut seen = Vec::new();
        for row in &rows {
            if let Value::Object(map) = row {
                for key in map.keys() {
                    if !seen.contains(key) {
                        seen.push(key.clone());
                    }
                }
            }
        }
        seen
    };

    let mut table = format!("| {} |\n", headers.join(" | "));
    table.push_str(&format!("| {} |\n", vec!["---"; headers.len()].join(" | ")));

    for row in rows.iter().take(MAX_TABLE_ROWS) {
        let cells: Vec<String> = if tabular {
            headers
                .iter()
                .map(|h| render_cell(super::eval::lookup(row, h)))
                .collect()
        } else {
            vec![render_cell(Some(row))]
        };
        table.push_str(&format!("| {} |\n", cells.join(" | ")));
    }

    if rows.len() > MAX_TABLE_ROWS {
        table.push_str(&format!("\n... ({} more rows)\n", rows.len() - MAX_TABLE_ROWS));
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(116.666_666), "116.67");
        assert_eq!(format_number(-2.5), "-2.50");
    }

    #[test]
    fn test_table_from_rows() {
        let rows = json!([
            {"key": "New York", "value": 300.0},
            {"key": "Chicago", "value": 50.0}
        ]);
        let table = markdown_table(&rows, &[]);
        assert_eq!(
            table,
            "| key | value |\n| --- | --- |\n| New York | 300 |\n| Chicago | 50 |\n"
        );
    }

    #[test]
    fn test_table_column_selection_and_nested_path() {
        let rows = json!([{"name": "#1001", "customer": {"first_name": "Ada"}}]);
        let table = markdown_table(
            &rows,
            &["customer.first_name".to_string(), "name".to_string()],
        );
        assert!(table.starts_with("| customer.first_name | name |"));
        assert!(table.contains("| Ada | #1001 |"));
    }

    #[test]
    fn test_table_empty() {
        assert_eq!(markdown_table(&json!([]), &[]), "No data to display.");
    }

    #[test]
    fn test_table_scalars() {
        let table = markdown_table(&json!(["a", "b"]), &[]);
        assert_eq!(table, "| value |\n| --- |\n| a |\n| b |\n");
    }

    #[test]
    fn test_table_truncates_rows() {
        let rows: Vec<Value> = (0..60).map(|i| json!({"n": i})).collect();
        let table = markdown_table(&Value::Array(rows), &[]);
        assert!(table.contains("... (10 more rows)"));
    }
}
