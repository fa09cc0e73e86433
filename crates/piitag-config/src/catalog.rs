//! Tag template and entry group settings.

use serde::{Deserialize, Serialize};

fn default_template_id() -> String {
    String::from("pii_findings")
}

fn default_template_display_name() -> String {
    String::from("PII findings")
}

fn default_entry_group_id() -> String {
    String::from("cloudsql_tables")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    #[serde(default = "default_template_id")]
    pub template_id: String,

    #[serde(default = "default_template_display_name")]
    pub template_display_name: String,

    /// Entry group holding custom entries for Cloud SQL tables.
    #[serde(default = "default_entry_group_id")]
    pub entry_group_id: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            template_id: default_template_id(),
            template_display_name: default_template_display_name(),
            entry_group_id: default_entry_group_id(),
        }
    }
}
