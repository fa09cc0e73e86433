//! Versioned tag template schemas and their additive migrations.
//!
//! A [`TagTemplateSchema`] is a plain value. Migrations are pure functions
//! from one schema to the next, so the catalog service only ever sees the
//! resulting field additions.

use std::collections::BTreeMap;
use std::fmt;

use piitag_core::enums::Likelihood;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// Table-level summary fields every template version carries.
pub const HAS_PII: &str = "has_pii";
pub const TOP_INFO_TYPE: &str = "top_info_type";
pub const ROWS_INSPECTED: &str = "rows_inspected";
pub const INSPECTED_AT: &str = "inspected_at";

/// Primitive type of a template field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldType {
    String,
    Bool,
    Double,
    Enum { values: Vec<String> },
}

impl FieldType {
    /// Enum over the likelihood names, lowest first.
    #[must_use]
    pub fn likelihood() -> Self {
        Self::Enum {
            values: Likelihood::ALL
                .iter()
                .map(|l| l.as_str().to_string())
                .collect(),
        }
    }

    /// Whether a field of type `self` can hold values written as `requested`.
    ///
    /// Enum fields accept a request whose values they already allow.
    #[must_use]
    pub fn accepts(&self, requested: &Self) -> bool {
        match (self, requested) {
            (Self::Enum { values: have }, Self::Enum { values: want }) => {
                want.iter().all(|v| have.contains(v))
            }
            (have, want) => have == want,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Bool => f.write_str("bool"),
            Self::Double => f.write_str("double"),
            Self::Enum { values } => write!(f, "enum({})", values.join("|")),
        }
    }
}

/// The shape of the tag template, tagged with a monotonically increasing
/// version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagTemplateSchema {
    pub template_id: String,
    pub display_name: String,
    pub version: u32,
    pub fields: BTreeMap<String, FieldType>,
}

impl TagTemplateSchema {
    /// Version 1: the table-level summary fields only.
    #[must_use]
    pub fn base(template_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        let fields = BTreeMap::from([
            (HAS_PII.to_string(), FieldType::Bool),
            (TOP_INFO_TYPE.to_string(), FieldType::String),
            (ROWS_INSPECTED.to_string(), FieldType::Double),
            (INSPECTED_AT.to_string(), FieldType::String),
        ]);
        Self {
            template_id: template_id.into(),
            display_name: display_name.into(),
            version: 1,
            fields,
        }
    }

    /// Fields of `required` this schema lacks.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::FieldTypeMismatch`] if a required field
    /// exists here with an incompatible type.
    pub fn missing(
        &self,
        required: &BTreeMap<String, FieldType>,
    ) -> Result<BTreeMap<String, FieldType>, CatalogError> {
        let mut missing = BTreeMap::new();
        for (name, want) in required {
            match self.fields.get(name) {
                Some(have) if have.accepts(want) => {}
                Some(have) => {
                    return Err(CatalogError::FieldTypeMismatch {
                        field: name.clone(),
                        existing: have.to_string(),
                        requested: want.to_string(),
                    });
                }
                None => {
                    missing.insert(name.clone(), want.clone());
                }
            }
        }
        Ok(missing)
    }

    /// The next schema version with `additions` added.
    ///
    /// Fields are never removed or retyped. Additions already present with a
    /// compatible type are ignored; if nothing is left to add, the schema is
    /// returned unchanged at the same version.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::FieldTypeMismatch`] if an addition would
    /// change the type of an existing field.
    pub fn migrate(&self, additions: &BTreeMap<String, FieldType>) -> Result<Self, CatalogError> {
        let missing = self.missing(additions)?;
        if missing.is_empty() {
            return Ok(self.clone());
        }
        let mut next = self.clone();
        next.version += 1;
        next.fields.extend(missing);
        Ok(next)
    }

    /// Whether `other` keeps every field of this schema with the same type.
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.fields
            .iter()
            .all(|(name, ty)| other.fields.get(name).is_some_and(|t| t.accepts(ty)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn additions(names: &[&str]) -> BTreeMap<String, FieldType> {
        names
            .iter()
            .map(|n| ((*n).to_string(), FieldType::Double))
            .collect()
    }

    #[test]
    fn base_schema_carries_summary_fields() {
        let schema = TagTemplateSchema::base("pii_findings", "PII findings");
        assert_eq!(schema.version, 1);
        assert_eq!(
            schema.fields.keys().map(String::as_str).collect::<Vec<_>>(),
            vec![HAS_PII, INSPECTED_AT, ROWS_INSPECTED, TOP_INFO_TYPE]
        );
    }

    #[test]
    fn migration_adds_fields_and_bumps_version() {
        let v1 = TagTemplateSchema::base("t", "T");
        let v2 = v1.migrate(&additions(&["email__email_address_count"])).unwrap();

        assert_eq!(v2.version, 2);
        assert!(v1.is_subset_of(&v2));
        assert_eq!(v2.fields.len(), v1.fields.len() + 1);
    }

    #[test]
    fn migration_without_new_fields_keeps_version() {
        let v1 = TagTemplateSchema::base("t", "T");
        let same = v1
            .migrate(&BTreeMap::from([(HAS_PII.to_string(), FieldType::Bool)]))
            .unwrap();
        assert_eq!(same, v1);
    }

    #[test]
    fn migration_never_retypes_a_field() {
        let v1 = TagTemplateSchema::base("t", "T");
        let err = v1
            .migrate(&BTreeMap::from([(HAS_PII.to_string(), FieldType::String)]))
            .unwrap_err();
        assert!(matches!(err, CatalogError::FieldTypeMismatch { ref field, .. } if field == HAS_PII));
    }

    #[test]
    fn enum_field_accepts_subset_of_values() {
        let full = FieldType::likelihood();
        let partial = FieldType::Enum {
            values: vec!["LIKELY".into()],
        };
        assert!(full.accepts(&partial));
        assert!(!partial.accepts(&full));
        assert!(!full.accepts(&FieldType::String));
    }

    #[test]
    fn migrations_compose_monotonically() {
        let v1 = TagTemplateSchema::base("t", "T");
        let v2 = v1.migrate(&additions(&["a_count"])).unwrap();
        let v3 = v2.migrate(&additions(&["b_count", "a_count"])).unwrap();
        assert_eq!(v3.version, 3);
        assert!(v2.is_subset_of(&v3));
        assert!(v3.fields.contains_key("a_count"));
        assert!(v3.fields.contains_key("b_count"));
    }
}
