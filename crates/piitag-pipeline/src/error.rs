use std::any::Any;

use piitag_core::ErrorKind;
use piitag_core::enums::TableStage;
use piitag_dlp::InspectionError;
use piitag_source::SourceError;
use thiserror::Error;

/// Failures that stop a run before any table is processed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("listing tables failed: {0}")]
    Listing(#[source] SourceError),

    #[error("resolving info types failed: {0}")]
    InfoTypes(#[source] InspectionError),
}

impl PipelineError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Listing(e) => e.kind(),
            Self::InfoTypes(e) => e.kind(),
        }
    }
}

/// Why a table failed, as recorded in the report.
#[derive(Debug)]
pub(crate) struct StageFailure {
    pub(crate) kind: ErrorKind,
    pub(crate) message: String,
}

impl StageFailure {
    /// A panic while `stage` was being attempted, attributed to the
    /// component that owns that stage.
    pub(crate) fn panicked(stage: TableStage, payload: &(dyn Any + Send)) -> Self {
        let kind = match stage {
            TableStage::Pending | TableStage::SchemaRead | TableStage::Sampled => {
                ErrorKind::SourceUnavailable
            }
            TableStage::Inspected | TableStage::Aggregated => ErrorKind::InspectionFailed,
            TableStage::Mapped | TableStage::Published | TableStage::Failed => {
                ErrorKind::PublishFailed
            }
        };
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        Self {
            kind,
            message: format!("table task panicked: {detail}"),
        }
    }
}

macro_rules! stage_failure_from {
    ($($error:ty),+) => {
        $(impl From<$error> for StageFailure {
            fn from(error: $error) -> Self {
                Self {
                    kind: error.kind(),
                    message: error.to_string(),
                }
            }
        })+
    };
}

stage_failure_from!(SourceError, InspectionError, piitag_catalog::CatalogError);
