use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use piitag_core::entities::TableHandle;
use piitag_core::enums::TableStage;
use piitag_pipeline::{RunObserver, TableOutcome, TableReport};

use crate::cli::{GlobalFlags, OutputFormat};
use crate::output;

/// A bar is drawn only for the human-readable table report on a terminal.
/// JSON and raw output are usually piped, so they run silently.
const fn wanted(flags: &GlobalFlags, stdout_tty: bool) -> bool {
    stdout_tty && !flags.quiet && matches!(flags.format, OutputFormat::Table)
}

fn bar_template(term_width: Option<usize>) -> &'static str {
    match term_width {
        Some(cols) if cols >= 110 => "{spinner:.cyan} {bar:40.cyan/blue} {pos}/{len} {msg}",
        Some(cols) if cols >= 80 => "{spinner:.cyan} {wide_bar:.cyan/blue} {pos}/{len} {msg}",
        _ => "{spinner:.cyan} {pos}/{len} {msg}",
    }
}

fn failure_line(report: &TableReport) -> Option<String> {
    match &report.outcome {
        TableOutcome::Failed { stage, message, .. } => {
            Some(format!("failed: {} at {stage}: {message}", report.table))
        }
        TableOutcome::Published { .. } | TableOutcome::Cancelled => None,
    }
}

/// Progress bar over the tables of a run, drawn on stderr.
///
/// Hidden runs keep the observer hooks as no-ops.
pub struct ScanProgress {
    bar: Option<ProgressBar>,
}

impl ScanProgress {
    #[must_use]
    pub fn for_run(message: &str, flags: &GlobalFlags) -> Self {
        if !wanted(flags, std::io::stdout().is_terminal()) {
            return Self::hidden();
        }
        let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
        bar.set_style(
            ProgressStyle::with_template(bar_template(output::terminal_width()))
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        bar.set_message(message.to_string());
        Self { bar: Some(bar) }
    }

    #[must_use]
    pub const fn hidden() -> Self {
        Self { bar: None }
    }

    pub fn finish_clear(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

impl RunObserver for ScanProgress {
    fn tables_listed(&self, count: usize) {
        if let Some(bar) = &self.bar {
            bar.set_length(count as u64);
        }
    }

    fn stage_entered(&self, table: &TableHandle, stage: TableStage) {
        if let Some(bar) = &self.bar {
            bar.set_message(format!("{} {stage}", table.table_name()));
        }
    }

    fn table_finished(&self, report: &TableReport) {
        if let Some(bar) = &self.bar {
            if let Some(line) = failure_line(report) {
                bar.println(line);
            }
            bar.inc(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use piitag_core::errors::ErrorKind;
    use pretty_assertions::assert_eq;

    use super::*;

    fn flags(format: OutputFormat, quiet: bool) -> GlobalFlags {
        GlobalFlags {
            format,
            output: None,
            quiet,
            project: None,
            location_category: None,
        }
    }

    #[test]
    fn bar_only_for_table_reports_on_a_terminal() {
        assert!(wanted(&flags(OutputFormat::Table, false), true));
        assert!(!wanted(&flags(OutputFormat::Table, false), false));
        assert!(!wanted(&flags(OutputFormat::Table, true), true));
        assert!(!wanted(&flags(OutputFormat::Json, false), true));
        assert!(!wanted(&flags(OutputFormat::Raw, false), true));
    }

    #[test]
    fn template_shrinks_with_the_terminal() {
        assert!(bar_template(Some(120)).contains("{bar:40"));
        assert!(bar_template(Some(90)).contains("{wide_bar"));
        assert_eq!(bar_template(None), "{spinner:.cyan} {pos}/{len} {msg}");
    }

    #[test]
    fn failed_tables_are_echoed_with_their_stage() {
        let table = TableHandle::bigquery("acme", "sales", "orders");
        let failed = TableReport {
            table: table.clone(),
            outcome: TableOutcome::Failed {
                stage: TableStage::Sampled,
                kind: ErrorKind::SourceUnavailable,
                message: "timeout".into(),
            },
            rows_inspected: 0,
            findings: Vec::new(),
        };
        assert_eq!(
            failure_line(&failed),
            Some(format!("failed: {table} at {}: timeout", TableStage::Sampled))
        );
        assert_eq!(failure_line(&TableReport::cancelled(table)), None);
    }

    #[test]
    fn hidden_progress_ignores_events() {
        let progress = ScanProgress::hidden();
        progress.tables_listed(3);
        progress.table_finished(&TableReport::cancelled(TableHandle::bigquery(
            "acme", "sales", "orders",
        )));
        progress.finish_clear();
        assert!(progress.bar.is_none());
    }
}
