use crate::cli::GlobalFlags;
use crate::output;

/// Print the JSON Schema of the run report.
pub fn handle(flags: &GlobalFlags) -> anyhow::Result<()> {
    let schema = piitag_pipeline::report_schema();
    println!("{}", output::render_json(&schema, flags.format)?);
    Ok(())
}
