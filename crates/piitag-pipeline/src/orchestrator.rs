//! Per-table state machine and dataset fan-out.
//!
//! Each table walks `PENDING → SCHEMA_READ → SAMPLED → INSPECTED →
//! AGGREGATED → MAPPED → PUBLISHED`, or stops in `FAILED` with the stage it
//! was attempting. Tables are independent: a failure is recorded in the
//! report and the remaining tables carry on.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::{FutureExt, TryStreamExt};
use piitag_catalog::{CatalogPublisher, TableSummary, map};
use piitag_config::PiitagConfig;
use piitag_core::RunContext;
use piitag_core::entities::{AggregatedFinding, DatasetScope, SampledRow, TableHandle};
use piitag_core::enums::TableStage;
use piitag_dlp::{InspectionDriver, aggregate, top_info_type};
use piitag_source::{DatasetLister, TableSource};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::error::{PipelineError, StageFailure};
use crate::report::{RunReport, TableOutcome, TableReport};

/// Scheduling knobs for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    /// Tables processed concurrently.
    pub workers: usize,
    /// Row sample size per table.
    pub max_rows: u32,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            max_rows: 1000,
        }
    }
}

impl From<&PiitagConfig> for RunSettings {
    fn from(config: &PiitagConfig) -> Self {
        Self {
            workers: config.run.workers.max(1),
            max_rows: config.inspection.max_rows,
        }
    }
}

/// Progress callbacks. Called from worker tasks, so keep them cheap.
pub trait RunObserver: Send + Sync {
    fn tables_listed(&self, _count: usize) {}
    fn stage_entered(&self, _table: &TableHandle, _stage: TableStage) {}
    fn table_finished(&self, _report: &TableReport) {}
}

/// Drives tables through inspection and publishing.
pub struct Orchestrator {
    source: Arc<dyn TableSource>,
    lister: Arc<dyn DatasetLister>,
    driver: Arc<InspectionDriver>,
    publisher: Arc<CatalogPublisher>,
    settings: RunSettings,
    observer: Option<Arc<dyn RunObserver>>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        source: Arc<dyn TableSource>,
        lister: Arc<dyn DatasetLister>,
        driver: Arc<InspectionDriver>,
        publisher: Arc<CatalogPublisher>,
        settings: RunSettings,
    ) -> Self {
        Self {
            source,
            lister,
            driver,
            publisher,
            settings,
            observer: None,
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Inspect and tag every table of `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] only when the run cannot start: the table
    /// listing failed, or the info types could not be resolved. Per-table
    /// failures end up in the report.
    pub async fn run_dataset(
        self: &Arc<Self>,
        ctx: Arc<RunContext>,
        scope: &DatasetScope,
    ) -> Result<RunReport, PipelineError> {
        let tables = self
            .lister
            .list_tables(&ctx, scope)
            .await
            .map_err(PipelineError::Listing)?;
        tracing::info!(scope = %scope, tables = tables.len(), "listed tables");
        self.run_tables(ctx, tables).await
    }

    /// Inspect and tag `tables` on a bounded worker pool.
    ///
    /// Cancellation stops tables that have not started yet; tables already
    /// in flight run to completion. The report keeps the input order.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InfoTypes`] if the info types for the run's
    /// location category cannot be resolved.
    pub async fn run_tables(
        self: &Arc<Self>,
        ctx: Arc<RunContext>,
        tables: Vec<TableHandle>,
    ) -> Result<RunReport, PipelineError> {
        let started_at = Utc::now();
        if let Some(observer) = &self.observer {
            observer.tables_listed(tables.len());
        }
        if !tables.is_empty() {
            self.driver
                .resolve_info_types(&ctx)
                .await
                .map_err(PipelineError::InfoTypes)?;
        }

        let semaphore = Arc::new(Semaphore::new(self.settings.workers.max(1)));
        let mut set = JoinSet::new();
        let total = tables.len();
        let handles = tables.clone();
        for (idx, table) in tables.into_iter().enumerate() {
            let this = Arc::clone(self);
            let ctx = Arc::clone(&ctx);
            let sem = Arc::clone(&semaphore);
            let span = tracing::info_span!("table", table = %table);
            let task = async move {
                let Ok(_permit) = sem.acquire().await else {
                    return (idx, TableReport::cancelled(table));
                };
                if ctx.cancel().is_cancelled() {
                    tracing::info!(table = %table, "run cancelled, skipping table");
                    let report = TableReport::cancelled(table);
                    this.notify_finished(&report);
                    return (idx, report);
                }
                let report = this.run_table(&ctx, table).await;
                this.notify_finished(&report);
                (idx, report)
            };
            set.spawn(task.instrument(span));
        }

        let mut slots: Vec<Option<TableReport>> = vec![None; total];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, report)) => slots[idx] = Some(report),
                Err(e) => tracing::error!(error = %e, "table task aborted"),
            }
        }
        let tables = slots
            .into_iter()
            .zip(handles)
            .map(|(slot, table)| slot.unwrap_or_else(|| TableReport::aborted(table)))
            .collect();

        let report = RunReport {
            run_id: ctx.run_id().to_string(),
            project: ctx.project().to_string(),
            started_at,
            finished_at: Utc::now(),
            tables,
        };
        tracing::info!(
            published = report.published(),
            failed = report.failed(),
            cancelled = report.cancelled(),
            "run finished"
        );
        Ok(report)
    }

    /// Run one table through every stage. Never fails: errors, and panics
    /// inside a stage, become a [`TableOutcome::Failed`] entry.
    pub async fn run_table(&self, ctx: &RunContext, table: TableHandle) -> TableReport {
        let mut run = TableRun::new(table);
        let attempt = AssertUnwindSafe(self.drive(ctx, &mut run))
            .catch_unwind()
            .await;
        let outcome = match attempt {
            Ok(outcome) => outcome,
            Err(payload) => Err(StageFailure::panicked(run.attempting(), payload.as_ref())),
        };
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(failure) => {
                let stage = run.attempting();
                tracing::warn!(
                    table = %run.table,
                    stage = %stage,
                    kind = %failure.kind,
                    error = %failure.message,
                    "table failed"
                );
                run.stage = TableStage::Failed;
                TableOutcome::Failed {
                    stage,
                    kind: failure.kind,
                    message: failure.message,
                }
            }
        };
        TableReport {
            table: run.table,
            outcome,
            rows_inspected: run.rows_inspected,
            findings: run.findings,
        }
    }

    async fn drive(&self, ctx: &RunContext, run: &mut TableRun) -> Result<TableOutcome, StageFailure> {
        self.enter(run, TableStage::SchemaRead);
        let schema = self.source.get_schema(ctx, &run.table).await?;
        run.advance();

        self.enter(run, TableStage::Sampled);
        let rows: Vec<SampledRow> = self
            .source
            .sample_rows(ctx, &run.table, self.settings.max_rows)
            .await?
            .try_collect()
            .await?;
        run.advance();

        self.enter(run, TableStage::Inspected);
        let inspection = self.driver.inspect(ctx, &schema, &rows).await?;
        run.rows_inspected = inspection.rows_inspected;
        run.advance();

        self.enter(run, TableStage::Aggregated);
        run.findings = aggregate(inspection.findings);
        run.advance();

        self.enter(run, TableStage::Mapped);
        let template = self.publisher.current_template(ctx).await?;
        let summary = TableSummary {
            rows_inspected: run.rows_inspected,
            top_info_type: top_info_type(&run.findings).map(str::to_string),
            inspected_at: Utc::now(),
        };
        let mapped = map(&run.table, &run.findings, &template, &summary)?;
        run.advance();

        self.enter(run, TableStage::Published);
        let published = self.publisher.publish(ctx, &run.table, &mapped).await?;
        run.advance();
        tracing::info!(
            table = %run.table,
            findings = run.findings.len(),
            tag = %published.tag.name,
            template_version = published.template_version,
            "published tag"
        );

        Ok(TableOutcome::Published {
            tag: published.tag.name,
            template_version: published.template_version,
        })
    }

    fn enter(&self, run: &TableRun, next: TableStage) {
        tracing::debug!(table = %run.table, from = %run.stage, to = %next, "entering stage");
        if let Some(observer) = &self.observer {
            observer.stage_entered(&run.table, next);
        }
    }

    fn notify_finished(&self, report: &TableReport) {
        if let Some(observer) = &self.observer {
            observer.table_finished(report);
        }
    }
}

/// Mutable state of one table's pass through the stages.
struct TableRun {
    table: TableHandle,
    stage: TableStage,
    rows_inspected: u64,
    findings: Vec<AggregatedFinding>,
}

impl TableRun {
    const fn new(table: TableHandle) -> Self {
        Self {
            table,
            stage: TableStage::Pending,
            rows_inspected: 0,
            findings: Vec::new(),
        }
    }

    /// Stage the table is working towards.
    fn attempting(&self) -> TableStage {
        self.stage.next_on_success().unwrap_or(self.stage)
    }

    /// Record that the attempted stage completed.
    fn advance(&mut self) {
        let next = self.attempting();
        debug_assert!(self.stage.can_transition_to(next));
        self.stage = next;
    }
}
