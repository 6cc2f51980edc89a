//! Table formatting for CLI output.

use comfy_table::{ContentArrangement, Table as ComfyTable};
use serde_json::Value;

/// A rendered table, built either field-by-field or from a JSON array of
/// flat objects (one row per element, columns from the first element's keys).
#[derive(Debug, Clone)]
pub struct Table {
    inner: ComfyTable,
}

impl Table {
    pub fn builder() -> TableBuilder {
        TableBuilder::new()
    }

    /// Build a table from a JSON array of flat objects.
    pub fn from_json_array(arr: &[Value]) -> Self {
        let mut table = ComfyTable::new();
        if arr.is_empty() {
            return Self { inner: table };
        }
        if let Some(obj) = arr.first().and_then(Value::as_object) {
            let headers: Vec<String> = obj.keys().cloned().collect();
            table.set_header(&headers);
        }
        for item in arr {
            if let Some(obj) = item.as_object() {
                let row: Vec<String> = obj
                    .values()
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        Value::Null => String::new(),
                        _ => v.to_string(),
                    })
                    .collect();
                table.add_row(row);
            }
        }
        table
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_width(120);
        Self { inner: table }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

/// Field-by-field table construction for commands that don't start from a
/// JSON array (e.g. `list`'s per-category tables).
#[derive(Debug, Clone, Default)]
pub struct TableBuilder {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn headers(mut self, headers: &[&str]) -> Self {
        self.headers = headers.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn add_row(mut self, row: Vec<String>) -> Self {
        self.rows.push(row);
        self
    }

    #[must_use]
    pub fn build(self) -> Table {
        let mut table = ComfyTable::new();
        table.set_header(&self.headers);
        for row in self.rows {
            table.add_row(row);
        }
        table.set_content_arrangement(ContentArrangement::Dynamic);
        Table { inner: table }
    }
}
