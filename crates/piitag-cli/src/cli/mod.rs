use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub mod global;

pub use global::{GlobalFlags, OutputFormat};

/// Top-level CLI parser for the `piitag` binary.
#[derive(Debug, Parser)]
#[command(
    name = "piitag",
    version,
    about = "Inspect BigQuery and Cloud SQL tables for PII and tag them in Data Catalog"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Google Cloud project that runs inspection and owns the tag template
    #[arg(short, long, global = true)]
    pub project: Option<String>,

    /// Location category restricting region-specific info types (e.g. GLOBAL, JAPAN)
    #[arg(short = 'l', long, global = true)]
    pub location_category: Option<String>,

    /// Output format: json, table, raw
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Also write the report (always JSON) to this file
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Quiet mode (errors only, no progress bar)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    #[must_use]
    pub fn global_flags(&self) -> GlobalFlags {
        GlobalFlags {
            format: self.format,
            output: self.output.clone(),
            quiet: self.quiet,
            project: self.project.clone(),
            location_category: self.location_category.clone(),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a BigQuery dataset, or one table of it
    Bigquery(BigqueryArgs),
    /// Scan a Cloud SQL database through the Cloud SQL Auth Proxy
    Cloudsql(CloudsqlArgs),
    /// Print the JSON Schema of the run report
    Schema,
}

#[derive(Debug, Args)]
pub struct BigqueryArgs {
    /// Dataset to scan
    #[arg(short, long)]
    pub dataset: String,

    /// Single table (defaults to every table in the dataset)
    #[arg(short, long)]
    pub table: Option<String>,
}

#[derive(Debug, Args)]
pub struct CloudsqlArgs {
    /// Cloud SQL instance name
    #[arg(short, long)]
    pub instance: String,

    /// Zone of the instance (recorded on the catalog entry)
    #[arg(short, long)]
    pub zone: Option<String>,

    /// Service account used for IAM database authentication
    #[arg(long)]
    pub service_account: Option<String>,

    /// Database to scan
    #[arg(short, long)]
    pub database: String,

    /// Database engine: mysql or postgres
    #[arg(long = "db-type")]
    pub db_type: String,

    /// Single table (defaults to every table in the database)
    #[arg(short, long)]
    pub table: Option<String>,
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};
    use pretty_assertions::assert_eq;

    use super::{Cli, Commands, OutputFormat};

    #[test]
    fn clap_command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bigquery_with_global_flags() {
        let cli = Cli::try_parse_from([
            "piitag",
            "--project",
            "acme",
            "--format",
            "table",
            "bigquery",
            "--dataset",
            "sales",
            "--table",
            "orders",
            "-l",
            "JAPAN",
        ])
        .expect("cli should parse");

        assert_eq!(cli.project.as_deref(), Some("acme"));
        assert_eq!(cli.format, OutputFormat::Table);
        assert_eq!(cli.location_category.as_deref(), Some("JAPAN"));
        match cli.command {
            Commands::Bigquery(args) => {
                assert_eq!(args.dataset, "sales");
                assert_eq!(args.table.as_deref(), Some("orders"));
            }
            other => panic!("expected bigquery, got {other:?}"),
        }
    }

    #[test]
    fn cloudsql_requires_engine_and_database() {
        let missing = Cli::try_parse_from(["piitag", "cloudsql", "--instance", "crm"]);
        assert!(missing.is_err());

        let cli = Cli::try_parse_from([
            "piitag",
            "cloudsql",
            "--instance",
            "crm",
            "--zone",
            "us-central1-a",
            "--database",
            "app",
            "--db-type",
            "postgres",
            "--service-account",
            "scanner@acme.iam.gserviceaccount.com",
            "--table",
            "users",
        ])
        .expect("cli should parse");
        match cli.command {
            Commands::Cloudsql(args) => {
                assert_eq!(args.db_type, "postgres");
                assert_eq!(args.zone.as_deref(), Some("us-central1-a"));
                assert_eq!(args.table.as_deref(), Some("users"));
            }
            other => panic!("expected cloudsql, got {other:?}"),
        }
    }

    #[test]
    fn output_and_quiet_are_global() {
        let cli = Cli::try_parse_from(["piitag", "schema", "-q", "--output", "report.json"])
            .expect("cli should parse");
        assert!(cli.quiet);
        assert_eq!(cli.output.as_deref(), Some(std::path::Path::new("report.json")));
        assert!(matches!(cli.command, Commands::Schema));
    }
}
