//! Flatten a source's nested column tree into a depth-limited [`TableSchema`].
//!
//! Record columns at the top level expand into one column per sub-field.
//! Anything that would need a third path segment is dropped with a warning.

use piitag_core::entities::{ColumnSchema, FieldPath, MAX_FIELD_DEPTH, TableSchema};
use piitag_core::enums::PrimitiveType;

/// A column as the source describes it, before flattening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceField {
    pub name: String,
    pub type_name: String,
    pub repeated: bool,
    pub fields: Vec<SourceField>,
}

impl SourceField {
    #[must_use]
    pub fn scalar(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            repeated: false,
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn record(name: impl Into<String>, fields: Vec<Self>) -> Self {
        Self {
            name: name.into(),
            type_name: "RECORD".into(),
            repeated: false,
            fields,
        }
    }

    fn primitive(&self) -> PrimitiveType {
        PrimitiveType::from_type_name(&self.type_name)
    }
}

/// Flatten `fields` for `table` (used only in log messages).
#[must_use]
pub fn flatten_schema(table: &str, fields: &[SourceField]) -> TableSchema {
    let mut columns = Vec::new();
    for field in fields {
        walk(table, &mut Vec::new(), field, &mut columns);
    }
    TableSchema::new(columns)
}

fn walk(table: &str, parents: &mut Vec<String>, field: &SourceField, out: &mut Vec<ColumnSchema>) {
    parents.push(field.name.clone());
    let is_record = field.primitive() == PrimitiveType::Record && !field.fields.is_empty();

    if parents.len() > MAX_FIELD_DEPTH || (is_record && parents.len() == MAX_FIELD_DEPTH) {
        tracing::warn!(
            table,
            field = %parents.join("."),
            max_depth = MAX_FIELD_DEPTH,
            "dropping field nested deeper than supported"
        );
    } else if is_record {
        for child in &field.fields {
            walk(table, parents, child, out);
        }
    } else {
        match FieldPath::new(parents.iter().cloned()) {
            Ok(path) => out.push(ColumnSchema {
                path,
                field_type: field.primitive(),
                repeated: field.repeated,
            }),
            Err(e) => tracing::warn!(table, error = %e, "skipping column with unusable name"),
        }
    }
    parents.pop();
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn headers(schema: &TableSchema) -> Vec<String> {
        schema.headers()
    }

    #[test]
    fn keeps_depth_one_and_two() {
        let fields = vec![
            SourceField::scalar("email", "STRING"),
            SourceField::record(
                "customer",
                vec![
                    SourceField::scalar("phone", "STRING"),
                    SourceField::scalar("age", "INT64"),
                ],
            ),
        ];
        let schema = flatten_schema("orders", &fields);
        assert_eq!(headers(&schema), vec!["email", "customer.phone", "customer.age"]);
        assert_eq!(schema.columns[2].field_type, PrimitiveType::Integer);
    }

    #[test]
    fn drops_fields_deeper_than_two() {
        let fields = vec![SourceField::record(
            "customer",
            vec![
                SourceField::scalar("name", "STRING"),
                SourceField::record(
                    "address",
                    vec![SourceField::scalar("zip", "STRING")],
                ),
            ],
        )];
        let schema = flatten_schema("orders", &fields);
        assert_eq!(headers(&schema), vec!["customer.name"]);
    }

    #[test]
    fn empty_record_is_kept_as_a_column() {
        let fields = vec![SourceField::record("blob", Vec::new())];
        let schema = flatten_schema("t", &fields);
        assert_eq!(headers(&schema), vec!["blob"]);
        assert_eq!(schema.columns[0].field_type, PrimitiveType::Record);
    }

    #[test]
    fn repeated_mode_is_carried() {
        let mut tags = SourceField::scalar("tags", "STRING");
        tags.repeated = true;
        let schema = flatten_schema("t", &[tags]);
        assert!(schema.columns[0].repeated);
    }
}
