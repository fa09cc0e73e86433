//! Drives the inspection service over one table's sampled rows.

use std::sync::Arc;

use piitag_core::entities::{Finding, SampledRow, TableSchema};
use piitag_core::{RunContext, with_retry};
use tokio::sync::OnceCell;

use crate::batch::{BatchLimits, plan_batches};
use crate::error::InspectionError;
use crate::location::LocationCategory;
use crate::options::InspectionOptions;
use crate::rest::request_overhead;
use crate::service::{InfoTypeDescriptor, InspectRequest, InspectionService};

/// Raw findings for one table. Findings are in no particular order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inspection {
    pub findings: Vec<Finding>,
    pub rows_inspected: u64,
    /// Inspection calls that succeeded, bisected retries included.
    pub requests: usize,
}

/// Submits table content to an [`InspectionService`].
///
/// The info-type list is resolved once per driver (one driver per run) and
/// shared by every table.
pub struct InspectionDriver {
    service: Arc<dyn InspectionService>,
    options: InspectionOptions,
    info_types: OnceCell<Vec<String>>,
}

impl InspectionDriver {
    #[must_use]
    pub fn new(service: Arc<dyn InspectionService>, options: InspectionOptions) -> Self {
        Self {
            service,
            options,
            info_types: OnceCell::new(),
        }
    }

    #[must_use]
    pub const fn options(&self) -> &InspectionOptions {
        &self.options
    }

    /// Info types evaluated by every request of this run.
    ///
    /// # Errors
    ///
    /// Returns [`InspectionError::NoInfoTypes`] if the location category
    /// matches nothing, or the listing call's failure after retries.
    pub async fn resolve_info_types(&self, ctx: &RunContext) -> Result<&[String], InspectionError> {
        let types = self
            .info_types
            .get_or_try_init(|| async {
                if !self.options.info_types.is_empty() {
                    return Ok(self.options.info_types.clone());
                }
                let service = &self.service;
                let all = with_retry(ctx.retry(), "dlp.infoTypes.list", move || {
                    service.list_info_types(ctx)
                })
                .await?;
                let selected = select_info_types(
                    &all,
                    &self.options.location_category,
                    self.options.include_global_info_types,
                );
                if selected.is_empty() {
                    return Err(InspectionError::NoInfoTypes(
                        self.options.location_category.to_string(),
                    ));
                }
                tracing::info!(
                    location_category = %self.options.location_category,
                    count = selected.len(),
                    "resolved info types"
                );
                Ok(selected)
            })
            .await?;
        Ok(types.as_slice())
    }

    /// Inspect `rows` of a table with `schema`.
    ///
    /// Rows are split into batches that respect the request byte and cell
    /// budgets. A batch whose findings come back truncated is bisected and
    /// both halves are inspected again.
    ///
    /// # Errors
    ///
    /// - [`InspectionError::RowTooLarge`] if a single row exceeds the budget.
    /// - [`InspectionError::Exhausted`] / [`InspectionError::Api`] if the
    ///   service keeps failing.
    pub async fn inspect(
        &self,
        ctx: &RunContext,
        schema: &TableSchema,
        rows: &[SampledRow],
    ) -> Result<Inspection, InspectionError> {
        if schema.is_empty() || rows.is_empty() {
            return Ok(Inspection::default());
        }

        let info_types = self.resolve_info_types(ctx).await?;
        let headers = schema.headers();
        let limits = BatchLimits {
            max_bytes: self.options.max_request_bytes,
            max_cells: self.options.max_cells_per_request,
            overhead: request_overhead(
                &headers,
                info_types,
                self.options.max_findings_per_request,
            ),
            width: headers.len(),
        };
        let cells: Vec<Vec<String>> = rows.iter().map(|row| row.cells(schema)).collect();
        let batches = plan_batches(cells, limits)?;
        tracing::debug!(batches = batches.len(), rows = rows.len(), "planned inspection batches");

        let mut inspection = Inspection {
            rows_inspected: rows.len() as u64,
            ..Inspection::default()
        };
        let mut pending: Vec<Vec<Vec<String>>> = batches.into_iter().rev().collect();

        while let Some(batch) = pending.pop() {
            let request = InspectRequest {
                headers: headers.clone(),
                rows: batch,
                info_types: info_types.to_vec(),
                min_likelihood: self.options.min_likelihood,
                max_findings: self.options.max_findings_per_request,
            };
            let service = &self.service;
            let request_ref = &request;
            let response = with_retry(ctx.retry(), "dlp.content.inspect", move || {
                service.inspect_table(ctx, request_ref)
            })
            .await?;
            inspection.requests += 1;

            if response.findings_truncated && request.rows.len() > 1 {
                let mut left = request.rows;
                let right = left.split_off(left.len() / 2);
                tracing::debug!(
                    rows = left.len() + right.len(),
                    "findings truncated, bisecting batch"
                );
                pending.push(right);
                pending.push(left);
                continue;
            }
            if response.findings_truncated {
                tracing::warn!("findings truncated for a single row, keeping partial findings");
            }

            for raw in response.findings {
                let Some(likelihood) = raw.likelihood else {
                    tracing::debug!(info_type = %raw.info_type, "skipping finding without likelihood");
                    continue;
                };
                match schema.column_by_header(&raw.column) {
                    Some(column) => inspection.findings.push(Finding::new(
                        column.path.clone(),
                        raw.info_type,
                        likelihood,
                        1,
                    )),
                    None => tracing::warn!(
                        column = %raw.column,
                        "finding refers to an unknown column, skipping"
                    ),
                }
            }
        }

        Ok(inspection)
    }
}

/// Names of info types tagged with `category` (and `GLOBAL` when
/// `include_global`), sorted and deduplicated.
#[must_use]
pub fn select_info_types(
    all: &[InfoTypeDescriptor],
    category: &LocationCategory,
    include_global: bool,
) -> Vec<String> {
    let mut names: Vec<String> = all
        .iter()
        .filter(|t| {
            t.location_categories.iter().any(|c| {
                c == category.as_str() || (include_global && c == LocationCategory::GLOBAL.as_str())
            })
        })
        .map(|t| t.name.clone())
        .collect();
    names.sort();
    names.dedup();
    names
}
