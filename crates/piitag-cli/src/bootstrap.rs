use anyhow::Context;
use piitag_config::PiitagConfig;
use piitag_dlp::InspectionOptions;

use crate::cli::GlobalFlags;

/// Everything a scan needs that can be checked without touching a service.
#[derive(Debug)]
pub struct Settings {
    pub config: PiitagConfig,
    pub inspection: InspectionOptions,
}

/// Load `.env`, layered config files, and `PIITAG_*` variables, apply
/// command-line overrides, and validate the result.
pub fn load(flags: &GlobalFlags) -> anyhow::Result<Settings> {
    let config = PiitagConfig::load_with_dotenv().context("failed to load configuration")?;
    prepare(config, flags)
}

/// Apply overrides and check the configuration. An unknown location
/// category fails here, before credentials are discovered or any client is
/// built.
fn prepare(mut config: PiitagConfig, flags: &GlobalFlags) -> anyhow::Result<Settings> {
    apply_overrides(&mut config, flags);
    config.validate().context("invalid configuration")?;
    let inspection = InspectionOptions::try_from(&config.inspection)
        .context("invalid inspection settings")?;
    Ok(Settings { config, inspection })
}

fn apply_overrides(config: &mut PiitagConfig, flags: &GlobalFlags) {
    if let Some(project) = &flags.project {
        config.gcp.project.clone_from(project);
    }
    if let Some(category) = &flags.location_category {
        config.inspection.location_category.clone_from(category);
    }
}
