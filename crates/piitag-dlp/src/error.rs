//! Inspection error types.

use std::time::Duration;

use piitag_core::http::ApiError;
use piitag_core::{ErrorKind, RetryError, RetryableError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InspectionError {
    /// The location category is not one the service knows.
    #[error("unknown location category '{0}'")]
    UnknownLocationCategory(String),

    /// Neither an explicit list nor the location category yielded info types.
    #[error("no info types available for location category {0}")]
    NoInfoTypes(String),

    /// One row alone is larger than the request budget.
    #[error("row {row} serializes to {bytes} bytes, above the {limit}-byte request limit")]
    RowTooLarge { row: usize, bytes: usize, limit: usize },

    #[error(transparent)]
    Api(#[from] ApiError),

    /// Transient failures continued past the retry budget.
    #[error("inspection failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: ApiError },
}

impl InspectionError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownLocationCategory(_) | Self::NoInfoTypes(_) => {
                ErrorKind::InvalidConfiguration
            }
            Self::RowTooLarge { .. } | Self::Api(_) | Self::Exhausted { .. } => {
                ErrorKind::InspectionFailed
            }
        }
    }
}

impl From<RetryError<ApiError>> for InspectionError {
    fn from(error: RetryError<ApiError>) -> Self {
        match error {
            RetryError::Permanent(e) => Self::Api(e),
            RetryError::Exhausted { attempts, last } => Self::Exhausted { attempts, last },
        }
    }
}

impl RetryableError for InspectionError {
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
