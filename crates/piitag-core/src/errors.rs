//! Cross-cutting error types for piitag.
//!
//! Each crate defines its own error enum (`SourceError`, `InspectionError`,
//! `CatalogError`, `ConfigError`) and maps it onto an [`ErrorKind`], which is
//! what the orchestrator records for a failed table.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification of a failure as it appears in the run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ErrorKind {
    /// Table missing or unreadable with the supplied identity.
    SourceUnavailable,
    /// Bad location category, database engine, or other run-level setting.
    InvalidConfiguration,
    /// The inspection service kept failing after all retries.
    InspectionFailed,
    /// Two findings normalized to the same tag template field.
    SchemaMappingConflict,
    /// A concurrent writer kept winning the race for the same tag.
    PublishConflict,
    /// The catalog service rejected a write or kept failing.
    PublishFailed,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SourceUnavailable => "SourceUnavailable",
            Self::InvalidConfiguration => "InvalidConfiguration",
            Self::InspectionFailed => "InspectionFailed",
            Self::SchemaMappingConflict => "SchemaMappingConflict",
            Self::PublishConflict => "PublishConflict",
            Self::PublishFailed => "PublishFailed",
        }
    }

    /// Whether this kind stops the whole run rather than a single table.
    #[must_use]
    pub const fn is_run_fatal(self) -> bool {
        matches!(self, Self::InvalidConfiguration)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the core types themselves.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A state machine transition was attempted that is not allowed.
    #[error("Invalid state transition: {entity_type} {id} from {from} to {to}")]
    InvalidTransition {
        entity_type: String,
        id: String,
        from: String,
        to: String,
    },

    /// Data failed validation (field path depth, unknown enum value, ...).
    #[error("Validation error: {0}")]
    Validation(String),
}
