//! # piitag-config
//!
//! Layered configuration loading for piitag using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`PIITAG_*` prefix, `__` as separator)
//! 2. Project-level `.piitag/config.toml`
//! 3. User-level `~/.config/piitag/config.toml`
//! 4. Built-in defaults
//!
//! CLI flags are applied by the binary on top of the extracted value.
//!
//! # Environment Variable Mapping
//!
//! Figment maps `PIITAG_RETRY__MAX_ATTEMPTS` -> `retry.max_attempts`,
//! `PIITAG_GCP__PROJECT` -> `gcp.project`, etc.
//!
//! # Usage
//!
//! ```no_run
//! use piitag_config::PiitagConfig;
//!
//! let config = PiitagConfig::load_with_dotenv().expect("config");
//! let policy = config.retry.policy();
//! println!("{} attempts per call", policy.max_attempts);
//! ```

mod catalog;
mod cloudsql;
mod error;
mod gcp;
mod inspection;
mod retry;
mod run;

pub use catalog::CatalogConfig;
pub use cloudsql::CloudSqlConfig;
pub use error::ConfigError;
pub use gcp::GcpConfig;
pub use inspection::InspectionConfig;
pub use retry::RetryConfig;
pub use run::RunConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PiitagConfig {
    #[serde(default)]
    pub gcp: GcpConfig,
    #[serde(default)]
    pub inspection: InspectionConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub cloudsql: CloudSqlConfig,
}

impl PiitagConfig {
    /// Load configuration from all sources (TOML files + environment variables).
    ///
    /// Does NOT call `dotenvy`; use [`Self::load_with_dotenv`] for `.env` support.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Figment`] if a source fails to parse or a value
    /// has the wrong type.
    pub fn load() -> Result<Self, ConfigError> {
        Self::figment().extract().map_err(ConfigError::from)
    }

    /// Load configuration with `.env` file support.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`].
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        Self::load_dotenv();
        Self::load()
    }

    /// Build the figment provider chain.
    ///
    /// Public so tests can inspect the figment directly or add providers on top.
    #[must_use]
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(global_path));
        }

        let local_path = PathBuf::from(".piitag/config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        figment.merge(Env::prefixed("PIITAG_").split("__"))
    }

    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inspection.max_rows == 0 {
            return Err(ConfigError::invalid("inspection.max_rows", "must be at least 1"));
        }
        if self.inspection.max_request_bytes == 0 {
            return Err(ConfigError::invalid(
                "inspection.max_request_bytes",
                "must be at least 1",
            ));
        }
        if self.inspection.max_cells_per_request == 0 {
            return Err(ConfigError::invalid(
                "inspection.max_cells_per_request",
                "must be at least 1",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::invalid("retry.max_attempts", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err(ConfigError::invalid(
                "retry.jitter",
                format!("{} is outside 0.0..=1.0", self.retry.jitter),
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::invalid(
                "retry.base_delay_ms",
                "must not exceed retry.max_delay_ms",
            ));
        }
        if self.run.workers == 0 {
            return Err(ConfigError::invalid("run.workers", "must be at least 1"));
        }
        if self.catalog.template_id.is_empty() {
            return Err(ConfigError::NotConfigured {
                field: "catalog.template_id".into(),
            });
        }
        Ok(())
    }

    /// The configured project.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotConfigured`] when `gcp.project` is empty.
    pub fn require_project(&self) -> Result<&str, ConfigError> {
        if self.gcp.is_configured() {
            Ok(&self.gcp.project)
        } else {
            Err(ConfigError::NotConfigured {
                field: "gcp.project".into(),
            })
        }
    }

    /// Path to the user-global config file.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("piitag").join("config.toml"))
    }

    /// Load `.env` from the current directory or the nearest ancestor that has one.
    fn load_dotenv() {
        let _ = dotenvy::dotenv();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use piitag_core::RetryPolicy;

    #[test]
    fn default_config_is_valid() {
        let config = PiitagConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retry.policy(), RetryPolicy::default());
        assert_eq!(config.run.workers, 4);
        assert_eq!(config.catalog.template_id, "pii_findings");
    }

    #[test]
    fn project_is_required() {
        let err = PiitagConfig::default().require_project().unwrap_err();
        assert!(matches!(err, ConfigError::NotConfigured { .. }));
        assert_eq!(err.kind(), piitag_core::ErrorKind::InvalidConfiguration);
    }

    #[test]
    fn rejects_zero_workers_and_bad_jitter() {
        let mut config = PiitagConfig::default();
        config.run.workers = 0;
        assert!(config.validate().unwrap_err().to_string().contains("run.workers"));

        let mut config = PiitagConfig::default();
        config.retry.jitter = 1.5;
        assert!(config.validate().unwrap_err().to_string().contains("retry.jitter"));
    }
}
