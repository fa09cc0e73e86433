use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{DbType, SourceKind};

/// Identifies one source table. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct TableHandle {
    project: String,
    source_kind: SourceKind,
    /// BigQuery dataset or Cloud SQL instance.
    dataset_or_instance: String,
    table_name: String,
    /// Cloud SQL database name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    db_type: Option<DbType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    zone: Option<String>,
}

impl TableHandle {
    #[must_use]
    pub fn bigquery(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            source_kind: SourceKind::Bigquery,
            dataset_or_instance: dataset.into(),
            table_name: table.into(),
            database: None,
            db_type: None,
            zone: None,
        }
    }

    #[must_use]
    pub fn cloudsql(
        project: impl Into<String>,
        instance: impl Into<String>,
        database: impl Into<String>,
        table: impl Into<String>,
        db_type: DbType,
        zone: Option<String>,
    ) -> Self {
        Self {
            project: project.into(),
            source_kind: SourceKind::Cloudsql,
            dataset_or_instance: instance.into(),
            table_name: table.into(),
            database: Some(database.into()),
            db_type: Some(db_type),
            zone,
        }
    }

    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    #[must_use]
    pub const fn source_kind(&self) -> SourceKind {
        self.source_kind
    }

    #[must_use]
    pub fn dataset_or_instance(&self) -> &str {
        &self.dataset_or_instance
    }

    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    #[must_use]
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    #[must_use]
    pub const fn db_type(&self) -> Option<DbType> {
        self.db_type
    }

    #[must_use]
    pub fn zone(&self) -> Option<&str> {
        self.zone.as_deref()
    }

    /// Full resource name the catalog links the entry to.
    #[must_use]
    pub fn linked_resource(&self) -> String {
        match self.source_kind {
            SourceKind::Bigquery => format!(
                "//bigquery.googleapis.com/projects/{}/datasets/{}/tables/{}",
                self.project, self.dataset_or_instance, self.table_name
            ),
            SourceKind::Cloudsql => format!(
                "//sqladmin.googleapis.com/projects/{}/instances/{}/databases/{}/tables/{}",
                self.project,
                self.dataset_or_instance,
                self.database.as_deref().unwrap_or_default(),
                self.table_name
            ),
        }
    }
}

impl fmt::Display for TableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source_kind {
            SourceKind::Bigquery => write!(
                f,
                "{}.{}.{}",
                self.project, self.dataset_or_instance, self.table_name
            ),
            SourceKind::Cloudsql => write!(
                f,
                "{}:{}/{}.{}",
                self.project,
                self.dataset_or_instance,
                self.database.as_deref().unwrap_or_default(),
                self.table_name
            ),
        }
    }
}

/// A set of tables to enumerate: a BigQuery dataset or a Cloud SQL database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum DatasetScope {
    Bigquery {
        project: String,
        dataset: String,
    },
    Cloudsql {
        project: String,
        instance: String,
        database: String,
        db_type: DbType,
        zone: Option<String>,
    },
}

impl DatasetScope {
    /// Handle for a table inside this scope.
    #[must_use]
    pub fn table(&self, table: impl Into<String>) -> TableHandle {
        match self {
            Self::Bigquery { project, dataset } => {
                TableHandle::bigquery(project.clone(), dataset.clone(), table)
            }
            Self::Cloudsql {
                project,
                instance,
                database,
                db_type,
                zone,
            } => TableHandle::cloudsql(
                project.clone(),
                instance.clone(),
                database.clone(),
                table,
                *db_type,
                zone.clone(),
            ),
        }
    }

    #[must_use]
    pub const fn source_kind(&self) -> SourceKind {
        match self {
            Self::Bigquery { .. } => SourceKind::Bigquery,
            Self::Cloudsql { .. } => SourceKind::Cloudsql,
        }
    }
}

impl fmt::Display for DatasetScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bigquery { project, dataset } => write!(f, "{project}.{dataset}"),
            Self::Cloudsql {
                project,
                instance,
                database,
                ..
            } => write!(f, "{project}:{instance}/{database}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bigquery_linked_resource() {
        let handle = TableHandle::bigquery("acme", "sales", "orders");
        assert_eq!(
            handle.linked_resource(),
            "//bigquery.googleapis.com/projects/acme/datasets/sales/tables/orders"
        );
        assert_eq!(handle.to_string(), "acme.sales.orders");
        assert!(handle.database().is_none());
    }

    #[test]
    fn cloudsql_handle_keeps_engine_and_zone() {
        let handle = TableHandle::cloudsql(
            "acme",
            "crm-1",
            "crm",
            "people",
            DbType::Postgres,
            Some("us-central1".into()),
        );
        assert_eq!(handle.db_type(), Some(DbType::Postgres));
        assert_eq!(handle.zone(), Some("us-central1"));
        assert_eq!(handle.to_string(), "acme:crm-1/crm.people");
    }

    #[test]
    fn scope_builds_handles_of_its_kind() {
        let scope = DatasetScope::Bigquery {
            project: "acme".into(),
            dataset: "sales".into(),
        };
        assert_eq!(scope.table("orders"), TableHandle::bigquery("acme", "sales", "orders"));
        assert_eq!(scope.source_kind(), SourceKind::Bigquery);
    }
}
