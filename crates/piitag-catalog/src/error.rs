//! Catalog error types.

use std::time::Duration;

use piitag_core::http::ApiError;
use piitag_core::{ErrorKind, RetryError, RetryableError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// Two distinct field paths produced the same template field name.
    #[error("template field '{field}' is claimed by both {first} and {second}")]
    MappingConflict {
        field: String,
        first: String,
        second: String,
    },

    /// A field exists in the template with a different type.
    #[error("template field '{field}' is {existing}, cannot use it as {requested}")]
    FieldTypeMismatch {
        field: String,
        existing: String,
        requested: String,
    },

    /// Concurrent writers kept invalidating our tag update.
    #[error("gave up publishing tag on {entry} after {attempts} conflicting attempts")]
    PublishConflict { entry: String, attempts: u32 },

    /// The resource already exists (create raced with another writer).
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// A conditional write lost against a concurrent writer.
    #[error("{0} was modified concurrently")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("catalog call failed after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<CatalogError>,
    },
}

impl CatalogError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MappingConflict { .. } | Self::FieldTypeMismatch { .. } => {
                ErrorKind::SchemaMappingConflict
            }
            Self::PublishConflict { .. } | Self::Conflict(_) => ErrorKind::PublishConflict,
            Self::Exhausted { last, .. } => last.kind(),
            Self::AlreadyExists(_) | Self::NotFound(_) | Self::Api(_) => ErrorKind::PublishFailed,
        }
    }

    /// Classify an API failure on `resource` by status.
    #[must_use]
    pub fn from_api(resource: &str, error: ApiError) -> Self {
        if error.is_precondition_failed() {
            Self::Conflict(resource.to_string())
        } else if error.is_already_exists() {
            Self::AlreadyExists(resource.to_string())
        } else if error.is_not_found() {
            Self::NotFound(resource.to_string())
        } else {
            Self::Api(error)
        }
    }
}

impl From<RetryError<Self>> for CatalogError {
    fn from(error: RetryError<Self>) -> Self {
        match error {
            RetryError::Permanent(e) => e,
            RetryError::Exhausted { attempts, last } => Self::Exhausted {
                attempts,
                last: Box::new(last),
            },
        }
    }
}

impl RetryableError for CatalogError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Api(e) => e.is_transient(),
            _ => false,
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
