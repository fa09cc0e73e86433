//! The run report: one entry per table, in the order tables were scheduled.

use chrono::{DateTime, Utc};
use piitag_core::entities::{AggregatedFinding, TableHandle};
use piitag_core::enums::TableStage;
use piitag_core::errors::ErrorKind;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How one table's pipeline ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableOutcome {
    Published {
        /// Resource name of the tag that now holds the findings.
        tag: String,
        template_version: u32,
    },
    Failed {
        /// Stage that was being attempted.
        stage: TableStage,
        kind: ErrorKind,
        message: String,
    },
    /// The run was cancelled before this table started.
    Cancelled,
}

impl TableOutcome {
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    #[must_use]
    pub const fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Published { .. } => "published",
            Self::Failed { .. } => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TableReport {
    pub table: TableHandle,
    pub outcome: TableOutcome,
    #[serde(default)]
    pub rows_inspected: u64,
    /// Aggregated findings, present once the table got past aggregation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<AggregatedFinding>,
}

impl TableReport {
    #[must_use]
    pub const fn cancelled(table: TableHandle) -> Self {
        Self {
            table,
            outcome: TableOutcome::Cancelled,
            rows_inspected: 0,
            findings: Vec::new(),
        }
    }

    /// A table whose task ended without handing back a report. Whether its
    /// tag was written is unknown, so it counts as a failed publish.
    #[must_use]
    pub fn aborted(table: TableHandle) -> Self {
        Self {
            table,
            outcome: TableOutcome::Failed {
                stage: TableStage::Pending,
                kind: ErrorKind::PublishFailed,
                message: "table task aborted before reporting".into(),
            },
            rows_inspected: 0,
            findings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RunReport {
    pub run_id: String,
    pub project: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub tables: Vec<TableReport>,
}

impl RunReport {
    #[must_use]
    pub fn published(&self) -> usize {
        self.count(|o| matches!(o, TableOutcome::Published { .. }))
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(TableOutcome::is_failure)
    }

    #[must_use]
    pub fn cancelled(&self) -> usize {
        self.count(|o| matches!(o, TableOutcome::Cancelled))
    }

    /// Whether any table failed. Cancelled tables do not count.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    /// Process exit status for this report.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(self.has_failures())
    }

    fn count(&self, pred: impl Fn(&TableOutcome) -> bool) -> usize {
        self.tables.iter().filter(|t| pred(&t.outcome)).count()
    }
}

/// JSON Schema of [`RunReport`].
#[must_use]
pub fn report_schema() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(RunReport)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use piitag_core::entities::FieldPath;
    use piitag_core::enums::Likelihood;
    use pretty_assertions::assert_eq;

    fn sample() -> RunReport {
        let now = Utc::now();
        RunReport {
            run_id: "run-1".into(),
            project: "acme".into(),
            started_at: now,
            finished_at: now,
            tables: vec![
                TableReport {
                    table: TableHandle::bigquery("acme", "sales", "orders"),
                    outcome: TableOutcome::Published {
                        tag: "entries/x/tags/1".into(),
                        template_version: 2,
                    },
                    rows_inspected: 3,
                    findings: vec![AggregatedFinding {
                        field_path: FieldPath::top("email").unwrap(),
                        info_type: "EMAIL_ADDRESS".into(),
                        max_likelihood: Likelihood::Likely,
                        total_count: 3,
                    }],
                },
                TableReport {
                    table: TableHandle::bigquery("acme", "sales", "refunds"),
                    outcome: TableOutcome::Failed {
                        stage: TableStage::SchemaRead,
                        kind: ErrorKind::SourceUnavailable,
                        message: "table not found".into(),
                    },
                    rows_inspected: 0,
                    findings: Vec::new(),
                },
                TableReport::cancelled(TableHandle::bigquery("acme", "sales", "returns")),
            ],
        }
    }

    #[test]
    fn counts_and_exit_code() {
        let report = sample();
        assert_eq!(report.published(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.cancelled(), 1);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn cancelled_tables_do_not_fail_the_run() {
        let mut report = sample();
        report.tables.retain(|t| !t.outcome.is_failure());
        assert!(!report.has_failures());
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let report = sample();
        let json = serde_json::to_value(&report.tables[1].outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["stage"], "SCHEMA_READ");
        assert_eq!(json["kind"], "SourceUnavailable");
    }

    #[test]
    fn report_validates_against_its_schema() {
        let schema = report_schema();
        let validator = jsonschema::validator_for(&schema).unwrap();
        let instance = serde_json::to_value(sample()).unwrap();
        assert!(validator.is_valid(&instance));

        let broken = serde_json::json!({ "run_id": "x", "tables": [] });
        assert!(!validator.is_valid(&broken));
    }
}
