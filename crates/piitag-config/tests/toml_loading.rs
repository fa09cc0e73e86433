//! Integration tests for TOML configuration loading.
//!
//! Uses figment::Jail for sandboxed files and env vars.

use figment::{
    Figment, Jail,
    providers::{Format, Serialized, Toml},
};
use piitag_config::PiitagConfig;
use piitag_core::enums::Likelihood;

#[test]
fn loads_all_sections_from_toml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
[gcp]
project = "acme-data"
catalog_location = "europe-west1"

[inspection]
location_category = "UNITED_KINGDOM"
min_likelihood = "LIKELY"
max_rows = 250
info_types = ["EMAIL_ADDRESS", "PHONE_NUMBER"]
language_code = "ja-JP"

[catalog]
template_id = "pii_v2"

[retry]
max_attempts = 3
base_delay_ms = 100

[run]
workers = 8

[cloudsql]
user = "scanner"
port = 6543
"#,
        )?;

        let config: PiitagConfig = Figment::from(Serialized::defaults(PiitagConfig::default()))
            .merge(Toml::file("config.toml"))
            .extract()?;

        assert_eq!(config.gcp.project, "acme-data");
        assert_eq!(config.gcp.catalog_location, "europe-west1");
        assert_eq!(config.gcp.dlp_location, "global");
        assert_eq!(config.inspection.location_category, "UNITED_KINGDOM");
        assert_eq!(config.inspection.min_likelihood, Likelihood::Likely);
        assert_eq!(config.inspection.max_rows, 250);
        assert_eq!(config.inspection.info_types, vec!["EMAIL_ADDRESS", "PHONE_NUMBER"]);
        assert_eq!(config.inspection.language_code, "ja-JP");
        assert_eq!(config.catalog.template_id, "pii_v2");
        assert_eq!(config.catalog.entry_group_id, "cloudsql_tables");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay_ms, 100);
        assert_eq!(config.retry.max_delay_ms, 30_000);
        assert_eq!(config.run.workers, 8);
        assert_eq!(config.cloudsql.user, "scanner");
        assert_eq!(config.cloudsql.port, Some(6543));
        assert!(config.validate().is_ok());
        Ok(())
    });
}

#[test]
fn project_local_file_is_picked_up() {
    Jail::expect_with(|jail| {
        jail.create_dir(".piitag")?;
        jail.create_file(
            ".piitag/config.toml",
            r#"
[gcp]
project = "local-project"
"#,
        )?;

        let config: PiitagConfig = PiitagConfig::figment().extract()?;
        assert_eq!(config.require_project().ok(), Some("local-project"));
        Ok(())
    });
}

#[test]
fn unknown_likelihood_is_a_figment_error() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
[inspection]
min_likelihood = "SOMEWHAT"
"#,
        )?;

        let result: Result<PiitagConfig, _> =
            Figment::from(Serialized::defaults(PiitagConfig::default()))
                .merge(Toml::file("config.toml"))
                .extract();
        assert!(result.is_err());
        Ok(())
    });
}
