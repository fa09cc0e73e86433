use piitag_config::InspectionConfig;
use piitag_core::enums::Likelihood;

use crate::error::InspectionError;
use crate::location::LocationCategory;

/// Everything an inspection request needs besides the table content.
#[derive(Debug, Clone)]
pub struct InspectionOptions {
    pub location_category: LocationCategory,
    /// Explicit info types; empty means derive them from `location_category`.
    pub info_types: Vec<String>,
    pub include_global_info_types: bool,
    pub min_likelihood: Likelihood,
    pub max_request_bytes: usize,
    pub max_cells_per_request: usize,
    pub max_findings_per_request: u32,
}

impl Default for InspectionOptions {
    fn default() -> Self {
        Self {
            location_category: LocationCategory::GLOBAL,
            info_types: Vec::new(),
            include_global_info_types: true,
            min_likelihood: Likelihood::Possible,
            max_request_bytes: 500_000,
            max_cells_per_request: 50_000,
            max_findings_per_request: 2000,
        }
    }
}

impl TryFrom<&InspectionConfig> for InspectionOptions {
    type Error = InspectionError;

    /// Fails with [`InspectionError::UnknownLocationCategory`] before any
    /// service call is made.
    fn try_from(config: &InspectionConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            location_category: config.location_category.parse()?,
            info_types: config
                .info_types
                .iter()
                .map(|t| t.trim().to_ascii_uppercase())
                .filter(|t| !t.is_empty())
                .collect(),
            include_global_info_types: config.include_global_info_types,
            min_likelihood: config.min_likelihood,
            max_request_bytes: config.max_request_bytes,
            max_cells_per_request: config.max_cells_per_request,
            max_findings_per_request: config.max_findings_per_request,
        })
    }
}
