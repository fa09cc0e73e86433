//! # piitag-core
//!
//! Core types, error kinds, and shared plumbing for piitag.
//!
//! This crate provides the foundational types shared across all piitag crates:
//! - Table handles, field paths, findings, and sampled rows
//! - The per-table stage enum with its state machine transitions
//! - Error kinds reported in the run report
//! - Deterministic catalog identifiers derived from table handles
//! - A retry policy and the generic retry wrapper used around every external call
//! - The run context threaded through external-facing calls
//! - Shared HTTP response checks for Google Cloud REST APIs

pub mod cancel;
pub mod context;
pub mod entities;
pub mod enums;
pub mod errors;
pub mod http;
pub mod ids;
pub mod retry;

pub use cancel::CancellationToken;
pub use context::{RunContext, StaticToken, TokenSource};
pub use errors::{CoreError, ErrorKind};
pub use http::ApiError;
pub use retry::{RetryError, RetryPolicy, RetryableError, with_retry};
