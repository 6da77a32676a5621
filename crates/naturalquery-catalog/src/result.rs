//! Tabular query results

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Rows returned by a statement
///
/// Cells are JSON values so every engine can report its own types without a
/// shared type system.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column labels in select order
    pub columns: Vec<String>,

    /// Row-major cell values
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Add a row and return self
    pub fn with_row(mut self, row: Vec<Value>) -> Self {
        self.rows.push(row);
        self
    }

    /// Single-cell result, handy for aggregates
    pub fn scalar(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(vec![column.into()]).with_row(vec![value.into()])
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First cell of the first row
    pub fn first_value(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.first())
    }
}

fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Plain-text table: a header line, then one ` | `-separated line per row
impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.columns.join(" | "))?;
        if self.rows.is_empty() {
            return write!(f, "\n(0 rows)");
        }
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(render_cell).collect();
            write!(f, "\n{}", cells.join(" | "))?;
        }
        Ok(())
    }
}
