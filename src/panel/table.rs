//! Table normalization for tool results
//!
//! Tool payloads describe tables in several shapes. All of them are folded
//! into a column list plus positional rows; missing cells become `null`.

use serde::Serialize;
use serde_json::{Map, Value};

/// Column name used when the payload is a bare list of scalars
const VALUE_COLUMN: &str = "value";

/// Normalized table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Normalize a table-shaped payload.
    ///
    /// Accepted shapes, first match wins:
    /// - `{columns, rows}` with rows as arrays or objects
    /// - `{columns, data}` with the same row forms
    /// - a bare array of objects (columns from the first row's keys)
    /// - a bare array of scalars (single `value` column)
    /// - any other object (one row, columns from its keys)
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(obj) => Some(Self::from_object(obj)),
            Value::Array(items) => Some(Self::from_array(items)),
            _ => None,
        }
    }

    fn from_object(obj: &Map<String, Value>) -> Self {
        if let Some(columns) = obj.get("columns").and_then(Value::as_array) {
            let rows = obj
                .get("rows")
                .and_then(Value::as_array)
                .or_else(|| obj.get("data").and_then(Value::as_array));
            if let Some(rows) = rows {
                let columns = column_names(columns);
                let rows = rows.iter().map(|row| row_cells(row, &columns)).collect();
                return Self { columns, rows };
            }
        }

        let columns: Vec<String> = obj.keys().cloned().collect();
        let row = columns
            .iter()
            .map(|c| obj.get(c).cloned().unwrap_or(Value::Null))
            .collect();
        Self {
            columns,
            rows: vec![row],
        }
    }

    fn from_array(items: &[Value]) -> Self {
        match items.first() {
            None => Self {
                columns: Vec::new(),
                rows: Vec::new(),
            },
            Some(Value::Object(first)) => {
                let columns: Vec<String> = first.keys().cloned().collect();
                let rows = items.iter().map(|row| row_cells(row, &columns)).collect();
                Self { columns, rows }
            }
            Some(_) => Self {
                columns: vec![VALUE_COLUMN.to_string()],
                rows: items.iter().map(|v| vec![v.clone()]).collect(),
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() || self.rows.is_empty()
    }

    /// Render as CSV with a header line
    pub fn to_csv(&self) -> String {
        let mut out = self
            .columns
            .iter()
            .map(|c| csv_field(c))
            .collect::<Vec<_>>()
            .join(",");
        for row in &self.rows {
            out.push('\n');
            let line = row.iter().map(|cell| csv_field(&cell_text(cell))).collect::<Vec<_>>();
            out.push_str(&line.join(","));
        }
        out
    }
}

fn column_names(columns: &[Value]) -> Vec<String> {
    columns
        .iter()
        .map(|c| match c {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect()
}

/// Cells of one row: arrays by position, objects by column name
fn row_cells(row: &Value, columns: &[String]) -> Vec<Value> {
    match row {
        Value::Array(cells) => (0..columns.len())
            .map(|i| cells.get(i).cloned().unwrap_or(Value::Null))
            .collect(),
        Value::Object(obj) => columns
            .iter()
            .map(|c| obj.get(c).cloned().unwrap_or(Value::Null))
            .collect(),
        scalar => vec![scalar.clone()],
    }
}

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn csv_field(text: &str) -> String {
    if text.contains([',', '"', '\n']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}
