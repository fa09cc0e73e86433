//! Cloud SQL connector (MySQL and PostgreSQL).
//!
//! The connector only builds SQL and decodes results; running the SQL is the
//! job of a [`SqlExecutor`]. Rows are fetched as one JSON document per row so
//! both engines produce the same [`SampledRow`] shape.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use piitag_core::entities::{DatasetScope, SampledRow, TableHandle, TableSchema};
use piitag_core::enums::{DbType, SourceKind};
use piitag_core::{RetryError, RunContext, with_retry};
use serde_json::Value;

use crate::error::SourceError;
use crate::flatten::{SourceField, flatten_schema};
use crate::source::{DatasetLister, RowStream, TableSource};

/// Runs SQL against one Cloud SQL database.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Run `sql` and return every row with each column rendered as text.
    async fn fetch_text(&self, sql: &str) -> Result<Vec<Vec<Option<String>>>, SourceError>;
}

/// Reads tables of one Cloud SQL database through a [`SqlExecutor`].
#[derive(Clone)]
pub struct CloudSqlConnector {
    executor: Arc<dyn SqlExecutor>,
    db_type: DbType,
}

impl std::fmt::Debug for CloudSqlConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudSqlConnector")
            .field("db_type", &self.db_type)
            .finish_non_exhaustive()
    }
}

impl CloudSqlConnector {
    #[must_use]
    pub fn new(executor: Arc<dyn SqlExecutor>, db_type: DbType) -> Self {
        Self { executor, db_type }
    }

    fn db_type_for(&self, table: &TableHandle) -> DbType {
        table.db_type().unwrap_or(self.db_type)
    }

    async fn query(
        &self,
        ctx: &RunContext,
        sql: &str,
    ) -> Result<Vec<Vec<Option<String>>>, SourceError> {
        let executor = &self.executor;
        with_retry(ctx.retry(), "cloudsql.query", move || async move {
            executor.fetch_text(sql).await
        })
        .await
        .map_err(RetryError::into_inner)
    }

    async fn columns(
        &self,
        ctx: &RunContext,
        table: &TableHandle,
    ) -> Result<Vec<SourceField>, SourceError> {
        let db_type = self.db_type_for(table);
        let rows = self
            .query(ctx, &queries::columns(db_type, table.table_name()))
            .await?;
        if rows.is_empty() {
            return Err(SourceError::NotFound {
                table: table.to_string(),
            });
        }
        rows.into_iter()
            .map(|row| match row.as_slice() {
                [Some(name), Some(data_type)] => Ok(SourceField::scalar(name, data_type)),
                _ => Err(SourceError::Decode(format!(
                    "column metadata row for {table} has unexpected shape"
                ))),
            })
            .collect()
    }
}

#[async_trait]
impl TableSource for CloudSqlConnector {
    async fn get_schema(
        &self,
        ctx: &RunContext,
        table: &TableHandle,
    ) -> Result<TableSchema, SourceError> {
        let fields = self.columns(ctx, table).await?;
        Ok(flatten_schema(&table.to_string(), &fields))
    }

    async fn sample_rows(
        &self,
        ctx: &RunContext,
        table: &TableHandle,
        max_rows: u32,
    ) -> Result<RowStream, SourceError> {
        let db_type = self.db_type_for(table);
        let columns: Vec<String> = self
            .columns(ctx, table)
            .await?
            .into_iter()
            .map(|f| f.name)
            .collect();
        let sql = queries::rows_as_json(db_type, table.table_name(), &columns, max_rows);
        let rows = self.query(ctx, &sql).await?;
        let sampled: Vec<Result<SampledRow, SourceError>> = rows
            .into_iter()
            .filter_map(|row| row.into_iter().next().flatten())
            .map(|json| parse_row(&json))
            .collect();
        Ok(stream::iter(sampled).boxed())
    }
}

#[async_trait]
impl DatasetLister for CloudSqlConnector {
    async fn list_tables(
        &self,
        ctx: &RunContext,
        scope: &DatasetScope,
    ) -> Result<Vec<TableHandle>, SourceError> {
        let DatasetScope::Cloudsql { db_type, .. } = scope else {
            return Err(SourceError::WrongSource {
                connector: SourceKind::Cloudsql,
                requested: scope.source_kind(),
            });
        };
        let rows = self.query(ctx, &queries::tables(*db_type)).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_iter().next().flatten())
            .map(|name| scope.table(name))
            .collect())
    }
}

fn parse_row(json: &str) -> Result<SampledRow, SourceError> {
    match serde_json::from_str::<Value>(json) {
        Ok(Value::Object(map)) => Ok(SampledRow::new(map)),
        Ok(other) => Err(SourceError::Decode(format!(
            "expected a JSON object per row, got {other}"
        ))),
        Err(e) => Err(SourceError::Decode(e.to_string())),
    }
}

/// SQL text for both engines. Identifiers and literals are quoted here; the
/// executor runs the text as-is.
pub mod queries {
    use super::DbType;

    #[must_use]
    pub fn quote_ident(db_type: DbType, name: &str) -> String {
        match db_type {
            DbType::Postgres => format!("\"{}\"", name.replace('"', "\"\"")),
            DbType::Mysql => format!("`{}`", name.replace('`', "``")),
        }
    }

    #[must_use]
    pub fn quote_literal(db_type: DbType, value: &str) -> String {
        let escaped = match db_type {
            DbType::Postgres => value.replace('\'', "''"),
            DbType::Mysql => value.replace('\\', "\\\\").replace('\'', "''"),
        };
        format!("'{escaped}'")
    }

    /// `(column_name, data_type)` for `table`, in ordinal order.
    #[must_use]
    pub fn columns(db_type: DbType, table: &str) -> String {
        let table = quote_literal(db_type, table);
        match db_type {
            DbType::Postgres => format!(
                "SELECT column_name::text, data_type::text FROM information_schema.columns \
                 WHERE table_schema = current_schema() AND table_name = {table} \
                 ORDER BY ordinal_position"
            ),
            DbType::Mysql => format!(
                "SELECT CAST(COLUMN_NAME AS CHAR), CAST(DATA_TYPE AS CHAR) \
                 FROM information_schema.COLUMNS \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = {table} \
                 ORDER BY ORDINAL_POSITION"
            ),
        }
    }

    /// Base tables of the connected database.
    #[must_use]
    pub fn tables(db_type: DbType) -> String {
        match db_type {
            DbType::Postgres => "SELECT table_name::text FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_type = 'BASE TABLE' \
                 ORDER BY table_name"
                .to_string(),
            DbType::Mysql => "SELECT CAST(TABLE_NAME AS CHAR) FROM information_schema.TABLES \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' \
                 ORDER BY TABLE_NAME"
                .to_string(),
        }
    }

    /// Up to `limit` rows of `table`, one JSON object per row.
    #[must_use]
    pub fn rows_as_json(db_type: DbType, table: &str, columns: &[String], limit: u32) -> String {
        let from = quote_ident(db_type, table);
        match db_type {
            DbType::Postgres => format!(
                "SELECT row_to_json(t)::text FROM (SELECT * FROM {from} LIMIT {limit}) t"
            ),
            DbType::Mysql => {
                let pairs: Vec<String> = columns
                    .iter()
                    .map(|c| {
                        format!(
                            "{}, {}",
                            quote_literal(db_type, c),
                            quote_ident(db_type, c)
                        )
                    })
                    .collect();
                format!(
                    "SELECT CAST(JSON_OBJECT({}) AS CHAR) FROM {from} LIMIT {limit}",
                    pairs.join(", ")
                )
            }
        }
    }
}
