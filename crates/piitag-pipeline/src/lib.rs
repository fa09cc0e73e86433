//! # piitag-pipeline
//!
//! The orchestrator that takes each table from schema to published tag.
//!
//! [`Orchestrator::run_dataset`] lists a dataset's tables and runs them on a
//! bounded worker pool; every table ends up in the [`RunReport`] as
//! published, failed (with the stage and [`ErrorKind`]) or cancelled.
//!
//! [`ErrorKind`]: piitag_core::ErrorKind

mod error;
mod orchestrator;
mod report;

pub use error::PipelineError;
pub use orchestrator::{Orchestrator, RunObserver, RunSettings};
pub use report::{RunReport, TableOutcome, TableReport, report_schema};
