//! # piitag-source
//!
//! Schema readers, row samplers, and dataset listers.
//!
//! [`SourceConnector`] wraps the BigQuery REST connector or the Cloud SQL
//! connector behind the [`TableSource`] and [`DatasetLister`] capabilities.
//! Schemas are flattened to at most two levels (`column` or
//! `record.field`); deeper fields are dropped with a warning.

pub mod bigquery;
pub mod cloudsql;
mod connector;
mod error;
mod flatten;
mod source;
pub mod sql;

pub use bigquery::{BIGQUERY_SCOPE, BigQueryConnector};
pub use cloudsql::{CloudSqlConnector, SqlExecutor};
pub use connector::SourceConnector;
pub use error::SourceError;
pub use flatten::{SourceField, flatten_schema};
pub use source::{DatasetLister, RowStream, TableSource};
pub use sql::{ProxyTarget, SqlxExecutor, connection_url};
