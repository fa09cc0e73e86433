//! Google Cloud project and endpoint settings.

use serde::{Deserialize, Serialize};

fn default_catalog_location() -> String {
    String::from("us-central1")
}

fn default_dlp_location() -> String {
    String::from("global")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GcpConfig {
    /// Project that owns inspection jobs and catalog resources.
    #[serde(default)]
    pub project: String,

    /// Region for tag templates and custom entry groups.
    #[serde(default = "default_catalog_location")]
    pub catalog_location: String,

    /// Location used for inspection requests.
    #[serde(default = "default_dlp_location")]
    pub dlp_location: String,

    /// Base URL override for the inspection API (emulators, private endpoints).
    #[serde(default)]
    pub dlp_endpoint: String,

    #[serde(default)]
    pub catalog_endpoint: String,

    #[serde(default)]
    pub bigquery_endpoint: String,
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            project: String::new(),
            catalog_location: default_catalog_location(),
            dlp_location: default_dlp_location(),
            dlp_endpoint: String::new(),
            catalog_endpoint: String::new(),
            bigquery_endpoint: String::new(),
        }
    }
}

impl GcpConfig {
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.project.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        let config = GcpConfig::default();
        assert!(!config.is_configured());
        assert_eq!(config.catalog_location, "us-central1");
        assert_eq!(config.dlp_location, "global");
        assert!(config.dlp_endpoint.is_empty());
    }
}
