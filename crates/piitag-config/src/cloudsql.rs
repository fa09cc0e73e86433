//! Cloud SQL connection settings.
//!
//! Connections go through a Cloud SQL Auth Proxy listening on `host:port`;
//! the proxy handles instance authentication.

use piitag_core::enums::DbType;
use serde::{Deserialize, Serialize};

fn default_host() -> String {
    String::from("127.0.0.1")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CloudSqlConfig {
    #[serde(default = "default_host")]
    pub host: String,

    /// Proxy port. Unset means the engine default (3306 / 5432).
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,
}

impl Default for CloudSqlConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: None,
            user: String::new(),
            password: String::new(),
        }
    }
}

impl CloudSqlConfig {
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.host.is_empty() && !self.user.is_empty()
    }

    #[must_use]
    pub fn port_for(&self, db_type: DbType) -> u16 {
        self.port.unwrap_or(match db_type {
            DbType::Mysql => 3306,
            DbType::Postgres => 5432,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_defaults_follow_engine() {
        let mut config = CloudSqlConfig::default();
        assert_eq!(config.port_for(DbType::Mysql), 3306);
        assert_eq!(config.port_for(DbType::Postgres), 5432);
        config.port = Some(6000);
        assert_eq!(config.port_for(DbType::Postgres), 6000);
    }

    #[test]
    fn requires_user() {
        let config = CloudSqlConfig::default();
        assert!(!config.is_configured());
    }
}
