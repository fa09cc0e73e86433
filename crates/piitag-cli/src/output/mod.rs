use std::io::IsTerminal;
use std::path::Path;

use anyhow::Context;
use piitag_pipeline::{RunReport, TableOutcome, TableReport};
use serde::Serialize;

use crate::cli::OutputFormat;

pub mod table;

pub use table::TableOptions;

const REPORT_HEADERS: [&str; 6] = ["table", "status", "stage", "kind", "findings", "message"];

/// Render a serializable value as pretty or compact JSON.
pub fn render_json<T: Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Raw => serde_json::to_string(value)?,
        OutputFormat::Json | OutputFormat::Table => serde_json::to_string_pretty(value)?,
    })
}

/// Width of the terminal from `COLUMNS`; narrower than 40 columns is ignored.
#[must_use]
pub fn terminal_width() -> Option<usize> {
    parse_width(std::env::var("COLUMNS").ok().as_deref())
}

fn parse_width(columns: Option<&str>) -> Option<usize> {
    columns
        .and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|width| *width >= 40)
}

/// Layout for a report table printed to stdout.
#[must_use]
pub fn stdout_table_options() -> TableOptions {
    table_options(
        std::io::stdout().is_terminal(),
        std::env::var_os("NO_COLOR").is_some(),
        terminal_width(),
    )
}

/// Status colors only on a terminal, and never with `NO_COLOR` set.
const fn table_options(stdout_tty: bool, no_color: bool, width: Option<usize>) -> TableOptions {
    TableOptions {
        max_width: width,
        color: stdout_tty && !no_color,
    }
}

/// Render a run report in the requested format.
pub fn render_report(
    report: &RunReport,
    format: OutputFormat,
    options: TableOptions,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json | OutputFormat::Raw => render_json(report, format),
        OutputFormat::Table => {
            let rows: Vec<Vec<String>> = report.tables.iter().map(report_row).collect();
            let body = table::render_table(&REPORT_HEADERS, &rows, options);
            Ok(format!("{body}\n\n{}", summary_line(report)))
        }
    }
}

/// Print a run report to stdout.
pub fn output_report(report: &RunReport, format: OutputFormat) -> anyhow::Result<()> {
    let rendered = render_report(report, format, stdout_table_options())?;
    println!("{rendered}");
    Ok(())
}

/// Write the report as pretty JSON to `path`.
pub fn write_report(report: &RunReport, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json + "\n")
        .with_context(|| format!("failed to write report to {}", path.display()))
}

fn report_row(report: &TableReport) -> Vec<String> {
    let (stage, kind, message) = match &report.outcome {
        TableOutcome::Failed {
            stage,
            kind,
            message,
        } => (stage.to_string(), kind.to_string(), message.clone()),
        TableOutcome::Published { tag, .. } => ("-".into(), "-".into(), tag.clone()),
        TableOutcome::Cancelled => ("-".into(), "-".into(), "-".into()),
    };
    vec![
        report.table.to_string(),
        report.outcome.label().to_string(),
        stage,
        kind,
        report.findings.len().to_string(),
        message,
    ]
}

fn summary_line(report: &RunReport) -> String {
    format!(
        "{} published, {} failed, {} cancelled ({})",
        report.published(),
        report.failed(),
        report.cancelled(),
        report.run_id
    )
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use piitag_core::entities::TableHandle;
    use piitag_core::enums::TableStage;
    use piitag_core::errors::ErrorKind;
    use pretty_assertions::assert_eq;

    use super::*;

    const PLAIN: TableOptions = TableOptions {
        max_width: None,
        color: false,
    };

    fn report() -> RunReport {
        let now = Utc::now();
        RunReport {
            run_id: "run-1".into(),
            project: "acme".into(),
            started_at: now,
            finished_at: now,
            tables: vec![
                TableReport {
                    table: TableHandle::bigquery("acme", "sales", "orders"),
                    outcome: TableOutcome::Published {
                        tag: "tags/1".into(),
                        template_version: 1,
                    },
                    rows_inspected: 10,
                    findings: Vec::new(),
                },
                TableReport {
                    table: TableHandle::bigquery("acme", "sales", "refunds"),
                    outcome: TableOutcome::Failed {
                        stage: TableStage::SchemaRead,
                        kind: ErrorKind::SourceUnavailable,
                        message: "table not found".into(),
                    },
                    rows_inspected: 0,
                    findings: Vec::new(),
                },
                TableReport::cancelled(TableHandle::bigquery("acme", "sales", "returns")),
            ],
        }
    }

    #[test]
    fn table_rows_carry_failure_details() {
        let report = report();
        let row = report_row(&report.tables[1]);
        assert_eq!(row[1], "failed");
        assert_eq!(row[2], TableStage::SchemaRead.to_string());
        assert_eq!(row[3], ErrorKind::SourceUnavailable.to_string());
        assert_eq!(row[5], "table not found");
    }

    #[test]
    fn table_format_ends_with_summary() {
        let rendered = render_report(&report(), OutputFormat::Table, PLAIN).unwrap();
        assert!(rendered.starts_with("table"));
        assert!(rendered.ends_with("1 published, 1 failed, 1 cancelled (run-1)"));
    }

    #[test]
    fn raw_is_single_line_json() {
        let rendered = render_report(&report(), OutputFormat::Raw, PLAIN).unwrap();
        assert_eq!(rendered.lines().count(), 1);
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["tables"][1]["outcome"]["status"], "failed");
    }

    #[test]
    fn colors_need_a_terminal_without_no_color() {
        assert!(table_options(true, false, None).color);
        assert!(!table_options(true, true, None).color);
        assert!(!table_options(false, false, None).color);
    }

    #[test]
    fn narrow_or_garbled_columns_are_ignored() {
        assert_eq!(parse_width(Some("120")), Some(120));
        assert_eq!(parse_width(Some(" 80 ")), Some(80));
        assert_eq!(parse_width(Some("20")), None);
        assert_eq!(parse_width(Some("wide")), None);
        assert_eq!(parse_width(None), None);
    }

    #[test]
    fn write_report_creates_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let original = report();
        write_report(&original, &path).unwrap();
        let back: RunReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, original);
    }
}
