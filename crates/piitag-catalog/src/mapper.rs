//! Maps a table's aggregated findings onto tag template fields.
//!
//! Every `(field_path, info_type)` pair yields two fields named after the
//! pair: `<path>__<info_type>_likelihood` (enum) and `..._count` (double).
//! Names the current template lacks are added through a migration, never
//! dropped.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use piitag_core::entities::{AggregatedFinding, TableHandle};
use piitag_core::ids::{MAX_CATALOG_ID_LEN, catalog_id, entry_id};
use serde::Serialize;

use crate::error::CatalogError;
use crate::schema::{
    FieldType, HAS_PII, INSPECTED_AT, ROWS_INSPECTED, TOP_INFO_TYPE, TagTemplateSchema,
};

const LIKELIHOOD_SUFFIX: &str = "_likelihood";
const COUNT_SUFFIX: &str = "_count";

/// A single tag field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TagValue {
    String(String),
    Bool(bool),
    Double(f64),
    Enum(String),
}

/// The tag to attach to a table's catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogTag {
    pub entry_id: String,
    pub template_id: String,
    pub fields: BTreeMap<String, TagValue>,
}

/// Table-level values that accompany the findings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSummary {
    pub rows_inspected: u64,
    pub top_info_type: Option<String>,
    pub inspected_at: DateTime<Utc>,
}

/// Output of [`map`]: the tag, plus the template schema able to hold it.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedTag {
    pub tag: CatalogTag,
    /// `schema` itself when no field was missing, otherwise its next version.
    pub schema: TagTemplateSchema,
}

impl MappedTag {
    #[must_use]
    pub fn migrated(&self, from: &TagTemplateSchema) -> bool {
        self.schema.version != from.version
    }
}

/// Base name (without suffix) of the fields for one finding key.
#[must_use]
pub fn field_base(finding: &AggregatedFinding) -> String {
    let raw = format!("{}__{}", finding.field_path.join("__"), finding.info_type);
    catalog_id(&raw, MAX_CATALOG_ID_LEN - LIKELIHOOD_SUFFIX.len())
}

/// Build the tag for `handle` from its aggregated findings.
///
/// # Errors
///
/// - [`CatalogError::MappingConflict`] when two distinct findings normalize
///   to the same field name.
/// - [`CatalogError::FieldTypeMismatch`] when `schema` already has a field
///   of that name with another type.
pub fn map(
    handle: &TableHandle,
    findings: &[AggregatedFinding],
    schema: &TagTemplateSchema,
    summary: &TableSummary,
) -> Result<MappedTag, CatalogError> {
    let mut claimed: BTreeMap<String, &AggregatedFinding> = BTreeMap::new();
    let mut fields = BTreeMap::new();
    let mut required = BTreeMap::new();

    for finding in findings {
        let base = field_base(finding);
        if let Some(first) = claimed.get(&base) {
            return Err(CatalogError::MappingConflict {
                field: base,
                first: describe(first),
                second: describe(finding),
            });
        }
        claimed.insert(base.clone(), finding);

        let likelihood = format!("{base}{LIKELIHOOD_SUFFIX}");
        let count = format!("{base}{COUNT_SUFFIX}");
        required.insert(likelihood.clone(), FieldType::likelihood());
        required.insert(count.clone(), FieldType::Double);
        fields.insert(
            likelihood,
            TagValue::Enum(finding.max_likelihood.as_str().to_string()),
        );
        fields.insert(count, TagValue::Double(as_double(finding.total_count)));
    }

    fields.insert(HAS_PII.to_string(), TagValue::Bool(!findings.is_empty()));
    fields.insert(
        ROWS_INSPECTED.to_string(),
        TagValue::Double(as_double(summary.rows_inspected)),
    );
    fields.insert(
        INSPECTED_AT.to_string(),
        TagValue::String(summary.inspected_at.to_rfc3339()),
    );
    if let Some(top) = &summary.top_info_type {
        fields.insert(TOP_INFO_TYPE.to_string(), TagValue::String(top.clone()));
    }

    let next = schema.migrate(&required)?;
    if next.version != schema.version {
        tracing::debug!(
            table = %handle,
            from = schema.version,
            to = next.version,
            added = next.fields.len() - schema.fields.len(),
            "tag needs new template fields"
        );
    }

    Ok(MappedTag {
        tag: CatalogTag {
            entry_id: entry_id(handle),
            template_id: next.template_id.clone(),
            fields,
        },
        schema: next,
    })
}

fn describe(finding: &AggregatedFinding) -> String {
    format!("{} ({})", finding.field_path, finding.info_type)
}

#[allow(clippy::cast_precision_loss)]
const fn as_double(value: u64) -> f64 {
    value as f64
}
