#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use piitag_catalog::{CatalogPublisher, InMemoryCatalog};
use piitag_core::entities::{
    ColumnSchema, DatasetScope, FieldPath, SampledRow, TableHandle, TableSchema,
};
use piitag_core::enums::{Likelihood, PrimitiveType};
use piitag_core::http::ApiError;
use piitag_core::{RetryPolicy, RunContext, StaticToken};
use piitag_dlp::{
    InfoTypeDescriptor, InspectRequest, InspectResponse, InspectionDriver, InspectionOptions,
    InspectionService, RawFinding,
};
use piitag_pipeline::{Orchestrator, RunSettings};
use piitag_source::{DatasetLister, RowStream, SourceError, TableSource};
use serde_json::{Value, json};

pub const PROJECT: &str = "acme";

pub fn scope() -> DatasetScope {
    DatasetScope::Bigquery {
        project: PROJECT.into(),
        dataset: "sales".into(),
    }
}

pub fn ctx() -> Arc<RunContext> {
    Arc::new(RunContext::new(
        PROJECT,
        Arc::new(StaticToken::new("test-token")),
        RetryPolicy::immediate(3),
    ))
}

pub struct FakeTable {
    pub schema: TableSchema,
    pub rows: Vec<SampledRow>,
}

/// Tables in listing order; names without a table behave as missing.
#[derive(Default)]
pub struct FakeSource {
    pub listed: Vec<String>,
    pub tables: BTreeMap<String, FakeTable>,
    pub panicking: BTreeSet<String>,
}

impl FakeSource {
    pub fn with_table(mut self, name: &str, table: FakeTable) -> Self {
        self.listed.push(name.to_string());
        self.tables.insert(name.to_string(), table);
        self
    }

    pub fn with_missing(mut self, name: &str) -> Self {
        self.listed.push(name.to_string());
        self
    }

    /// A listed table whose schema read panics.
    pub fn with_panicking(mut self, name: &str) -> Self {
        self.listed.push(name.to_string());
        self.panicking.insert(name.to_string());
        self
    }

    fn table(&self, handle: &TableHandle) -> Result<&FakeTable, SourceError> {
        self.tables
            .get(handle.table_name())
            .ok_or_else(|| SourceError::NotFound {
                table: handle.to_string(),
            })
    }
}

#[async_trait]
impl TableSource for FakeSource {
    async fn get_schema(
        &self,
        _ctx: &RunContext,
        table: &TableHandle,
    ) -> Result<TableSchema, SourceError> {
        assert!(
            !self.panicking.contains(table.table_name()),
            "schema reader crashed on {table}"
        );
        Ok(self.table(table)?.schema.clone())
    }

    async fn sample_rows(
        &self,
        _ctx: &RunContext,
        table: &TableHandle,
        max_rows: u32,
    ) -> Result<RowStream, SourceError> {
        let rows: Vec<_> = self
            .table(table)?
            .rows
            .iter()
            .take(max_rows as usize)
            .cloned()
            .map(Ok)
            .collect();
        Ok(stream::iter(rows).boxed())
    }
}

#[async_trait]
impl DatasetLister for FakeSource {
    async fn list_tables(
        &self,
        _ctx: &RunContext,
        scope: &DatasetScope,
    ) -> Result<Vec<TableHandle>, SourceError> {
        Ok(self.listed.iter().map(|name| scope.table(name)).collect())
    }
}

/// Flags `@` cells as email addresses (LIKELY) and `+` cells as phone
/// numbers (POSSIBLE), one raw finding per cell.
#[derive(Default)]
pub struct PatternInspector {
    pub calls: AtomicUsize,
}

#[async_trait]
impl InspectionService for PatternInspector {
    async fn list_info_types(&self, _ctx: &RunContext) -> Result<Vec<InfoTypeDescriptor>, ApiError> {
        Ok(vec![
            InfoTypeDescriptor::new("EMAIL_ADDRESS", &["GLOBAL"]),
            InfoTypeDescriptor::new("PHONE_NUMBER", &["GLOBAL"]),
            InfoTypeDescriptor::new("JAPAN_INDIVIDUAL_NUMBER", &["JAPAN"]),
        ])
    }

    async fn inspect_table(
        &self,
        _ctx: &RunContext,
        request: &InspectRequest,
    ) -> Result<InspectResponse, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut findings = Vec::new();
        for row in &request.rows {
            for (header, cell) in request.headers.iter().zip(row) {
                let detected = if cell.contains('@') {
                    Some(("EMAIL_ADDRESS", Likelihood::Likely))
                } else if cell.starts_with('+') {
                    Some(("PHONE_NUMBER", Likelihood::Possible))
                } else {
                    None
                };
                if let Some((info_type, likelihood)) = detected {
                    findings.push(RawFinding {
                        column: header.clone(),
                        info_type: info_type.into(),
                        likelihood: Some(likelihood),
                    });
                }
            }
        }
        Ok(InspectResponse {
            findings,
            findings_truncated: false,
        })
    }
}

pub fn column(path: &str) -> ColumnSchema {
    ColumnSchema {
        path: path.parse::<FieldPath>().unwrap(),
        field_type: PrimitiveType::String,
        repeated: false,
    }
}

pub fn row(value: Value) -> SampledRow {
    match value {
        Value::Object(map) => SampledRow::new(map),
        other => panic!("row must be an object, got {other}"),
    }
}

/// `email` on every row, `customer.phone` on the first one only.
pub fn orders() -> FakeTable {
    FakeTable {
        schema: TableSchema::new(vec![column("email"), column("customer.phone")]),
        rows: vec![
            row(json!({"email": "ann@example.com", "customer": {"phone": "+15551234567"}})),
            row(json!({"email": "bob@example.com", "customer": {"phone": null}})),
            row(json!({"email": "cy@example.com", "customer": {"phone": "n/a"}})),
        ],
    }
}

/// No PII at all.
pub fn inventory() -> FakeTable {
    FakeTable {
        schema: TableSchema::new(vec![column("sku"), column("qty")]),
        rows: vec![row(json!({"sku": "A-1", "qty": "4"}))],
    }
}

pub struct Harness {
    pub catalog: Arc<InMemoryCatalog>,
    pub inspector: Arc<PatternInspector>,
    pub orchestrator: Arc<Orchestrator>,
}

pub fn harness(source: FakeSource, options: InspectionOptions, workers: usize) -> Harness {
    harness_with_catalog(source, options, workers, Arc::new(InMemoryCatalog::new()))
}

pub fn harness_with_catalog(
    source: FakeSource,
    options: InspectionOptions,
    workers: usize,
    catalog: Arc<InMemoryCatalog>,
) -> Harness {
    let source = Arc::new(source);
    let inspector = Arc::new(PatternInspector::default());
    let driver = Arc::new(InspectionDriver::new(inspector.clone(), options));
    let publisher = Arc::new(CatalogPublisher::new(
        catalog.clone(),
        "pii_findings",
        "PII findings",
    ));
    let orchestrator = Arc::new(Orchestrator::new(
        source.clone(),
        source,
        driver,
        publisher,
        RunSettings {
            workers,
            max_rows: 100,
        },
    ));
    Harness {
        catalog,
        inspector,
        orchestrator,
    }
}
