//! Inspection request settings.

use piitag_core::enums::Likelihood;
use serde::{Deserialize, Serialize};

fn default_location_category() -> String {
    String::from("GLOBAL")
}

const fn default_min_likelihood() -> Likelihood {
    Likelihood::Possible
}

const fn default_max_rows() -> u32 {
    1000
}

const fn default_max_request_bytes() -> usize {
    500_000
}

const fn default_max_cells_per_request() -> usize {
    50_000
}

const fn default_max_findings_per_request() -> u32 {
    2000
}

fn default_language_code() -> String {
    String::from("en-US")
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InspectionConfig {
    /// Restricts region-specific info types (e.g. `GLOBAL`, `UNITED_STATES`).
    #[serde(default = "default_location_category")]
    pub location_category: String,

    #[serde(default = "default_min_likelihood")]
    pub min_likelihood: Likelihood,

    /// Row sample limit per table.
    #[serde(default = "default_max_rows")]
    pub max_rows: u32,

    /// Payload budget for a single inspection request.
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,

    #[serde(default = "default_max_cells_per_request")]
    pub max_cells_per_request: usize,

    #[serde(default = "default_max_findings_per_request")]
    pub max_findings_per_request: u32,

    /// Explicit info types. Empty means derive them from the location category.
    #[serde(default)]
    pub info_types: Vec<String>,

    /// Also evaluate info types not tied to a region.
    #[serde(default = "default_true")]
    pub include_global_info_types: bool,

    /// BCP-47 language of info type names returned by the service.
    #[serde(default = "default_language_code")]
    pub language_code: String,
}

impl Default for InspectionConfig {
    fn default() -> Self {
        Self {
            location_category: default_location_category(),
            min_likelihood: default_min_likelihood(),
            max_rows: default_max_rows(),
            max_request_bytes: default_max_request_bytes(),
            max_cells_per_request: default_max_cells_per_request(),
            max_findings_per_request: default_max_findings_per_request(),
            info_types: Vec::new(),
            include_global_info_types: true,
            language_code: default_language_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        let config = InspectionConfig::default();
        assert_eq!(config.location_category, "GLOBAL");
        assert_eq!(config.min_likelihood, Likelihood::Possible);
        assert_eq!(config.max_rows, 1000);
        assert_eq!(config.max_request_bytes, 500_000);
        assert_eq!(config.max_cells_per_request, 50_000);
        assert!(config.info_types.is_empty());
        assert!(config.include_global_info_types);
        assert_eq!(config.language_code, "en-US");
    }
}
