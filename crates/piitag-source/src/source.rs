//! Capabilities the orchestrator depends on.

use async_trait::async_trait;
use futures::stream::BoxStream;
use piitag_core::RunContext;
use piitag_core::entities::{DatasetScope, SampledRow, TableHandle, TableSchema};

use crate::error::SourceError;

/// Lazily fetched sample rows. Finite, and not restartable: each
/// [`TableSource::sample_rows`] call queries the source again.
pub type RowStream = BoxStream<'static, Result<SampledRow, SourceError>>;

/// Schema reader and row sampler for one kind of source.
#[async_trait]
pub trait TableSource: Send + Sync {
    /// Ordered columns of `table`, limited to two levels of nesting.
    async fn get_schema(
        &self,
        ctx: &RunContext,
        table: &TableHandle,
    ) -> Result<TableSchema, SourceError>;

    /// At most `max_rows` rows of `table`.
    async fn sample_rows(
        &self,
        ctx: &RunContext,
        table: &TableHandle,
        max_rows: u32,
    ) -> Result<RowStream, SourceError>;
}

/// Enumerates the tables of a dataset (or Cloud SQL database).
#[async_trait]
pub trait DatasetLister: Send + Sync {
    async fn list_tables(
        &self,
        ctx: &RunContext,
        scope: &DatasetScope,
    ) -> Result<Vec<TableHandle>, SourceError>;
}
