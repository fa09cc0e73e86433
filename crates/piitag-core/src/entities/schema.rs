use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entities::FieldPath;
use crate::enums::PrimitiveType;

/// One inspectable column: a top-level field or a record sub-field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnSchema {
    pub path: FieldPath,
    pub field_type: PrimitiveType,
    /// Whether the column holds repeated values (BigQuery `REPEATED` mode).
    #[serde(default)]
    pub repeated: bool,
}

/// Ordered, depth-limited column list of a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TableSchema {
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    #[must_use]
    pub const fn new(columns: Vec<ColumnSchema>) -> Self {
        Self { columns }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column header names as sent to the inspection service (`customer.phone`).
    #[must_use]
    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.path.to_string()).collect()
    }

    /// Find a column by its dotted header name.
    #[must_use]
    pub fn column_by_header(&self, header: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.path.to_string() == header)
    }
}

/// One sampled row, as a JSON object keyed by top-level column name.
///
/// Record columns hold nested objects (or arrays of objects when repeated).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampledRow(pub Map<String, Value>);

impl SampledRow {
    #[must_use]
    pub const fn new(values: Map<String, Value>) -> Self {
        Self(values)
    }

    /// Render the cell at `path` as text. Nulls and missing fields become
    /// `None`; repeated values are joined with `", "`.
    #[must_use]
    pub fn cell(&self, path: &FieldPath) -> Option<String> {
        let top = self.0.get(path.root())?;
        match path.segments().get(1) {
            None => render(top),
            Some(child) => match top {
                Value::Object(record) => record.get(child).and_then(render),
                Value::Array(items) => {
                    let parts: Vec<String> = items
                        .iter()
                        .filter_map(|item| item.get(child))
                        .filter_map(render)
                        .collect();
                    (!parts.is_empty()).then(|| parts.join(", "))
                }
                _ => None,
            },
        }
    }

    /// Render every column of `schema` in order, substituting `""` for nulls.
    #[must_use]
    pub fn cells(&self, schema: &TableSchema) -> Vec<String> {
        schema
            .columns
            .iter()
            .map(|c| self.cell(&c.path).unwrap_or_default())
            .collect()
    }
}

fn render(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(render).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        Value::Object(_) => Some(value.to_string()),
    }
}
