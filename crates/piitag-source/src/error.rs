//! Source error types.

use piitag_core::enums::SourceKind;
use piitag_core::http::ApiError;
use piitag_core::{ErrorKind, RetryableError};
use std::fmt::Display;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while reading a table's schema, rows, or a dataset listing.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("table {table} not found")]
    NotFound { table: String },

    #[error("permission denied reading {table}: {message}")]
    PermissionDenied { table: String, message: String },

    /// Transport or API failure talking to the source service.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A database query failed.
    #[error("query failed: {message}")]
    Query { message: String, transient: bool },

    /// The source answered with something that could not be decoded.
    #[error("unexpected response from source: {0}")]
    Decode(String),

    /// A connector was handed a table or dataset of another source kind.
    #[error("{connector} connector cannot read {requested} tables")]
    WrongSource {
        connector: SourceKind,
        requested: SourceKind,
    },
}

impl SourceError {
    /// Source failures are fatal for the table, not for the run, except for
    /// a connector/source mismatch.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::WrongSource { .. } => ErrorKind::InvalidConfiguration,
            _ => ErrorKind::SourceUnavailable,
        }
    }

    /// Attach table context to an API failure (404 → not found, 401/403 → denied).
    #[must_use]
    pub fn from_api(table: &impl Display, error: ApiError) -> Self {
        if error.is_not_found() {
            Self::NotFound {
                table: table.to_string(),
            }
        } else if error.is_permission_denied() {
            Self::PermissionDenied {
                table: table.to_string(),
                message: error.to_string(),
            }
        } else {
            Self::Api(error)
        }
    }
}

impl RetryableError for SourceError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Api(e) => e.is_transient(),
            Self::Query { transient, .. } => *transient,
            Self::NotFound { .. }
            | Self::PermissionDenied { .. }
            | Self::Decode(_)
            | Self::WrongSource { .. } => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Api(e) => e.retry_after(),
            _ => None,
        }
    }

    fn timed_out(operation: &'static str, after: Duration) -> Self {
        Self::Api(ApiError::timed_out(operation, after))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_status_maps_to_table_errors() {
        let not_found = ApiError::Api {
            status: 404,
            message: "gone".into(),
        };
        let err = SourceError::from_api(&"acme.sales.orders", not_found);
        assert!(matches!(err, SourceError::NotFound { .. }));
        assert_eq!(err.kind(), ErrorKind::SourceUnavailable);

        let denied = ApiError::Api {
            status: 403,
            message: "no".into(),
        };
        assert!(matches!(
            SourceError::from_api(&"t", denied),
            SourceError::PermissionDenied { .. }
        ));
    }

    #[test]
    fn server_errors_stay_transient() {
        let err = SourceError::from_api(
            &"t",
            ApiError::Api {
                status: 503,
                message: "busy".into(),
            },
        );
        assert!(err.is_transient());
    }

    #[test]
    fn wrong_source_is_a_configuration_error() {
        let err = SourceError::WrongSource {
            connector: SourceKind::Bigquery,
            requested: SourceKind::Cloudsql,
        };
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
        assert_eq!(err.to_string(), "bigquery connector cannot read cloudsql tables");
    }
}
