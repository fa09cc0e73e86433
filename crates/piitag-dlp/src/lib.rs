//! # piitag-dlp
//!
//! Inspection of sampled table content and aggregation of the findings.
//!
//! - [`InspectionDriver`] batches rows under the service's payload limits,
//!   retries transient failures, and bisects batches whose findings were
//!   truncated.
//! - [`aggregate`] folds raw findings into one [`AggregatedFinding`] per
//!   `(field_path, info_type)`.
//!
//! [`AggregatedFinding`]: piitag_core::entities::AggregatedFinding

mod aggregate;
pub mod batch;
mod driver;
mod error;
mod location;
mod options;
pub mod rest;
mod service;

pub use aggregate::{aggregate, top_info_type};
pub use driver::{Inspection, InspectionDriver, select_info_types};
pub use error::InspectionError;
pub use location::LocationCategory;
pub use options::InspectionOptions;
pub use rest::{CLOUD_PLATFORM_SCOPE, DlpClient};
pub use service::{InfoTypeDescriptor, InspectRequest, InspectResponse, InspectionService, RawFinding};
