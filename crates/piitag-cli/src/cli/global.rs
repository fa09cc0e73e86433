use clap::ValueEnum;

/// Report output mode.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Raw,
}

/// Global flags available before or after subcommands.
#[derive(Clone, Debug)]
pub struct GlobalFlags {
    pub format: OutputFormat,
    pub output: Option<std::path::PathBuf>,
    pub quiet: bool,
    pub project: Option<String>,
    pub location_category: Option<String>,
}
