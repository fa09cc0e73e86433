//! Likelihoods, source kinds, column types, and the per-table stage machine.
//!
//! Enums that travel over the wire serialize with the exact names the Google
//! Cloud APIs use (`VERY_LIKELY`, `bigquery`, ...). [`TableStage`] provides
//! `allowed_next_states()` so the orchestrator can enforce stage ordering.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::CoreError;

// ---------------------------------------------------------------------------
// Likelihood
// ---------------------------------------------------------------------------

/// Ordinal confidence the inspection service assigns to a finding.
///
/// Variant order is the ordering used for aggregation:
/// `VERY_UNLIKELY < UNLIKELY < POSSIBLE < LIKELY < VERY_LIKELY`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Likelihood {
    VeryUnlikely,
    Unlikely,
    Possible,
    Likely,
    VeryLikely,
}

impl Likelihood {
    pub const ALL: [Self; 5] = [
        Self::VeryUnlikely,
        Self::Unlikely,
        Self::Possible,
        Self::Likely,
        Self::VeryLikely,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VeryUnlikely => "VERY_UNLIKELY",
            Self::Unlikely => "UNLIKELY",
            Self::Possible => "POSSIBLE",
            Self::Likely => "LIKELY",
            Self::VeryLikely => "VERY_LIKELY",
        }
    }
}

impl fmt::Display for Likelihood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Likelihood {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::Validation(format!("unknown likelihood '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// SourceKind / DbType
// ---------------------------------------------------------------------------

/// Where a table lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Bigquery,
    Cloudsql,
}

impl SourceKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bigquery => "bigquery",
            Self::Cloudsql => "cloudsql",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database engine behind a Cloud SQL instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    Mysql,
    Postgres,
}

impl DbType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Postgres => "postgres",
        }
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DbType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(Self::Mysql),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(CoreError::Validation(format!(
                "unsupported database engine '{other}' (expected mysql or postgres)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// PrimitiveType
// ---------------------------------------------------------------------------

/// Column type as reported by a source, reduced to what inspection cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveType {
    String,
    Integer,
    Float,
    Numeric,
    Boolean,
    Temporal,
    Bytes,
    Json,
    Record,
    Other,
}

impl PrimitiveType {
    /// Map a BigQuery or SQL type name onto a primitive type.
    #[must_use]
    pub fn from_type_name(name: &str) -> Self {
        let upper = name.trim().to_ascii_uppercase();
        let base = upper.split(['(', ' ']).next().unwrap_or_default();
        match base {
            "STRING" | "VARCHAR" | "CHAR" | "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT"
            | "CHARACTER" | "ENUM" | "SET" | "UUID" | "CITEXT" => Self::String,
            "INTEGER" | "INT64" | "INT" | "BIGINT" | "SMALLINT" | "TINYINT" | "MEDIUMINT"
            | "SERIAL" | "BIGSERIAL" => Self::Integer,
            "FLOAT" | "FLOAT64" | "DOUBLE" | "REAL" => Self::Float,
            "NUMERIC" | "BIGNUMERIC" | "DECIMAL" => Self::Numeric,
            "BOOLEAN" | "BOOL" | "BIT" => Self::Boolean,
            "TIMESTAMP" | "DATE" | "TIME" | "DATETIME" | "INTERVAL" | "YEAR" => Self::Temporal,
            "BYTES" | "BLOB" | "BINARY" | "VARBINARY" | "BYTEA" | "LONGBLOB" | "MEDIUMBLOB"
            | "TINYBLOB" => Self::Bytes,
            "JSON" | "JSONB" => Self::Json,
            "RECORD" | "STRUCT" => Self::Record,
            _ => Self::Other,
        }
    }
}

// ---------------------------------------------------------------------------
// TableStage
// ---------------------------------------------------------------------------

/// Stage of a single table's pipeline.
///
/// ```text
/// pending → schema_read → sampled → inspected → aggregated → mapped → published
///    └──────────┴────────────┴──────────┴────────────┴──────────┴──→ failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableStage {
    Pending,
    SchemaRead,
    Sampled,
    Inspected,
    Aggregated,
    Mapped,
    Published,
    Failed,
}

impl TableStage {
    /// Valid next states from the current state.
    #[must_use]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::SchemaRead, Self::Failed],
            Self::SchemaRead => &[Self::Sampled, Self::Failed],
            Self::Sampled => &[Self::Inspected, Self::Failed],
            Self::Inspected => &[Self::Aggregated, Self::Failed],
            Self::Aggregated => &[Self::Mapped, Self::Failed],
            Self::Mapped => &[Self::Published, Self::Failed],
            Self::Published | Self::Failed => &[],
        }
    }

    /// Check whether transitioning to `next` is allowed.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    /// The stage that follows on success, if any.
    #[must_use]
    pub const fn next_on_success(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::SchemaRead),
            Self::SchemaRead => Some(Self::Sampled),
            Self::Sampled => Some(Self::Inspected),
            Self::Inspected => Some(Self::Aggregated),
            Self::Aggregated => Some(Self::Mapped),
            Self::Mapped => Some(Self::Published),
            Self::Published | Self::Failed => None,
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Published | Self::Failed)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::SchemaRead => "SCHEMA_READ",
            Self::Sampled => "SAMPLED",
            Self::Inspected => "INSPECTED",
            Self::Aggregated => "AGGREGATED",
            Self::Mapped => "MAPPED",
            Self::Published => "PUBLISHED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TableStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
