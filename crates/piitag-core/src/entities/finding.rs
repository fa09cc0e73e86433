use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::FieldPath;
use crate::enums::Likelihood;

/// One detection reported by the inspection service for a column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Finding {
    pub field_path: FieldPath,
    pub info_type: String,
    pub likelihood: Likelihood,
    /// Occurrences represented by this finding, always at least 1.
    pub count: u64,
}

impl Finding {
    /// Build a finding, clamping `count` to at least 1.
    #[must_use]
    pub fn new(
        field_path: FieldPath,
        info_type: impl Into<String>,
        likelihood: Likelihood,
        count: u64,
    ) -> Self {
        Self {
            field_path,
            info_type: info_type.into(),
            likelihood,
            count: count.max(1),
        }
    }
}

/// All findings for one `(field_path, info_type)` pair in a table, folded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct AggregatedFinding {
    pub field_path: FieldPath,
    pub info_type: String,
    pub max_likelihood: Likelihood,
    pub total_count: u64,
}
