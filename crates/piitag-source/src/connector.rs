use async_trait::async_trait;
use piitag_core::RunContext;
use piitag_core::entities::{DatasetScope, TableHandle, TableSchema};
use piitag_core::enums::SourceKind;

use crate::bigquery::BigQueryConnector;
use crate::cloudsql::CloudSqlConnector;
use crate::error::SourceError;
use crate::source::{DatasetLister, RowStream, TableSource};

/// The source a run reads from.
///
/// Callers depend on [`TableSource`] and [`DatasetLister`]; the variant only
/// decides which backend serves them.
#[derive(Debug, Clone)]
pub enum SourceConnector {
    BigQuery(BigQueryConnector),
    CloudSql(CloudSqlConnector),
}

impl SourceConnector {
    #[must_use]
    pub const fn source_kind(&self) -> SourceKind {
        match self {
            Self::BigQuery(_) => SourceKind::Bigquery,
            Self::CloudSql(_) => SourceKind::Cloudsql,
        }
    }

    fn check(&self, requested: SourceKind) -> Result<(), SourceError> {
        if requested == self.source_kind() {
            Ok(())
        } else {
            Err(SourceError::WrongSource {
                connector: self.source_kind(),
                requested,
            })
        }
    }
}

#[async_trait]
impl TableSource for SourceConnector {
    async fn get_schema(
        &self,
        ctx: &RunContext,
        table: &TableHandle,
    ) -> Result<TableSchema, SourceError> {
        self.check(table.source_kind())?;
        match self {
            Self::BigQuery(c) => c.get_schema(ctx, table).await,
            Self::CloudSql(c) => c.get_schema(ctx, table).await,
        }
    }

    async fn sample_rows(
        &self,
        ctx: &RunContext,
        table: &TableHandle,
        max_rows: u32,
    ) -> Result<RowStream, SourceError> {
        self.check(table.source_kind())?;
        match self {
            Self::BigQuery(c) => c.sample_rows(ctx, table, max_rows).await,
            Self::CloudSql(c) => c.sample_rows(ctx, table, max_rows).await,
        }
    }
}

#[async_trait]
impl DatasetLister for SourceConnector {
    async fn list_tables(
        &self,
        ctx: &RunContext,
        scope: &DatasetScope,
    ) -> Result<Vec<TableHandle>, SourceError> {
        self.check(scope.source_kind())?;
        match self {
            Self::BigQuery(c) => c.list_tables(ctx, scope).await,
            Self::CloudSql(c) => c.list_tables(ctx, scope).await,
        }
    }
}
