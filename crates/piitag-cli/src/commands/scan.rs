//! `piitag bigquery` and `piitag cloudsql`: wire the real services together
//! and run the orchestrator over one dataset or table.

use std::sync::Arc;

use anyhow::Context;
use piitag_catalog::{CatalogPublisher, DataCatalogClient};
use piitag_config::PiitagConfig;
use piitag_core::entities::DatasetScope;
use piitag_core::enums::DbType;
use piitag_core::{CancellationToken, RunContext};
use piitag_dlp::{DlpClient, InspectionDriver, InspectionOptions};
use piitag_pipeline::{Orchestrator, RunReport, RunSettings};
use piitag_source::{
    BigQueryConnector, CloudSqlConnector, ProxyTarget, SourceConnector, SqlxExecutor,
    connection_url,
};

use crate::bootstrap::Settings;
use crate::cli::{BigqueryArgs, CloudsqlArgs, GlobalFlags};
use crate::credentials::GcpTokenSource;
use crate::output;
use crate::progress::ScanProgress;

pub async fn bigquery(
    args: &BigqueryArgs,
    flags: &GlobalFlags,
    settings: Settings,
) -> anyhow::Result<()> {
    let Settings { config, inspection } = settings;
    let credentials = GcpTokenSource::discover().await?;
    let project = resolve_project(&config, &credentials).await?;
    let http = http_client()?;

    let connector = if config.gcp.bigquery_endpoint.is_empty() {
        BigQueryConnector::new(http.clone())
    } else {
        BigQueryConnector::with_base_url(http.clone(), &config.gcp.bigquery_endpoint)
    };
    let scope = DatasetScope::Bigquery {
        project: project.clone(),
        dataset: args.dataset.clone(),
    };
    let source = SourceConnector::BigQuery(connector);

    scan(
        ScanPlan {
            project,
            scope,
            table: args.table.clone(),
            source,
            http,
            credentials,
        },
        inspection,
        flags,
        &config,
    )
    .await
}

pub async fn cloudsql(
    args: &CloudsqlArgs,
    flags: &GlobalFlags,
    settings: Settings,
) -> anyhow::Result<()> {
    let Settings { config, inspection } = settings;
    let db_type: DbType = args
        .db_type
        .parse()
        .with_context(|| format!("invalid --db-type '{}'", args.db_type))?;
    let credentials = GcpTokenSource::discover().await?;
    let project = resolve_project(&config, &credentials).await?;
    let http = http_client()?;

    let user = database_user(
        &config.cloudsql.user,
        args.service_account.as_deref(),
        db_type,
    )?;
    let url = connection_url(
        db_type,
        &ProxyTarget {
            host: &config.cloudsql.host,
            port: config.cloudsql.port_for(db_type),
            user: &user,
            password: &config.cloudsql.password,
            database: &args.database,
        },
    );
    let pool_size = u32::try_from(config.run.workers.max(1)).unwrap_or(u32::MAX);
    let executor = SqlxExecutor::connect(db_type, &url, pool_size)
        .await
        .with_context(|| {
            format!(
                "failed to connect to {db_type} database '{}' through the proxy at {}:{}",
                args.database,
                config.cloudsql.host,
                config.cloudsql.port_for(db_type)
            )
        })?;

    let scope = DatasetScope::Cloudsql {
        project: project.clone(),
        instance: args.instance.clone(),
        database: args.database.clone(),
        db_type,
        zone: args.zone.clone(),
    };
    let source = SourceConnector::CloudSql(CloudSqlConnector::new(Arc::new(executor), db_type));

    scan(
        ScanPlan {
            project,
            scope,
            table: args.table.clone(),
            source,
            http,
            credentials,
        },
        inspection,
        flags,
        &config,
    )
    .await
}

struct ScanPlan {
    project: String,
    scope: DatasetScope,
    table: Option<String>,
    source: SourceConnector,
    http: reqwest::Client,
    credentials: GcpTokenSource,
}

async fn scan(
    plan: ScanPlan,
    options: InspectionOptions,
    flags: &GlobalFlags,
    config: &PiitagConfig,
) -> anyhow::Result<()> {
    let dlp = if config.gcp.dlp_endpoint.is_empty() {
        DlpClient::new(plan.http.clone(), &config.gcp.dlp_location)
    } else {
        DlpClient::with_base_url(
            plan.http.clone(),
            &config.gcp.dlp_endpoint,
            &config.gcp.dlp_location,
        )
    };
    let dlp = dlp.with_language_code(&config.inspection.language_code);
    let catalog = if config.gcp.catalog_endpoint.is_empty() {
        DataCatalogClient::new(
            plan.http.clone(),
            &config.gcp.catalog_location,
            &config.catalog.entry_group_id,
        )
    } else {
        DataCatalogClient::with_base_url(
            plan.http.clone(),
            &config.gcp.catalog_endpoint,
            &config.gcp.catalog_location,
            &config.catalog.entry_group_id,
        )
    };

    let driver = Arc::new(InspectionDriver::new(Arc::new(dlp), options));
    let publisher = Arc::new(CatalogPublisher::new(
        Arc::new(catalog),
        &config.catalog.template_id,
        &config.catalog.template_display_name,
    ));
    let source = Arc::new(plan.source);
    let progress = Arc::new(ScanProgress::for_run(&plan.scope.to_string(), flags));
    let orchestrator = Arc::new(
        Orchestrator::new(
            source.clone(),
            source,
            driver,
            publisher,
            RunSettings::from(config),
        )
        .with_observer(progress.clone()),
    );

    let cancel = CancellationToken::new();
    spawn_ctrl_c(cancel.clone());
    let ctx = Arc::new(
        RunContext::new(
            plan.project,
            Arc::new(plan.credentials),
            config.retry.policy(),
        )
        .with_cancel(cancel),
    );
    tracing::info!(run_id = ctx.run_id(), scope = %plan.scope, "starting run");

    let result = match plan.table {
        Some(table) => {
            orchestrator
                .run_tables(ctx, vec![plan.scope.table(table)])
                .await
        }
        None => orchestrator.run_dataset(ctx, &plan.scope).await,
    };
    progress.finish_clear();
    let report = result?;

    finish(&report, flags)
}

fn finish(report: &RunReport, flags: &GlobalFlags) -> anyhow::Result<()> {
    if let Some(path) = &flags.output {
        output::write_report(report, path)?;
    }
    output::output_report(report, flags.format)?;
    if report.has_failures() {
        anyhow::bail!(
            "{} of {} tables failed",
            report.failed(),
            report.tables.len()
        );
    }
    Ok(())
}

fn spawn_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, finishing tables in flight");
            cancel.cancel();
        }
    });
}

fn http_client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("piitag/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")
}

async fn resolve_project(
    config: &PiitagConfig,
    credentials: &GcpTokenSource,
) -> anyhow::Result<String> {
    if let Ok(project) = config.require_project() {
        return Ok(project.to_string());
    }
    credentials
        .project_id()
        .await
        .context("no project configured: pass --project or set PIITAG_GCP__PROJECT")
}

/// Database user for IAM authentication through the proxy.
///
/// An explicit `cloudsql.user` wins. Otherwise the user is derived from the
/// service account: Postgres uses the email without `.gserviceaccount.com`,
/// MySQL the part before `@`.
fn database_user(
    configured: &str,
    service_account: Option<&str>,
    db_type: DbType,
) -> anyhow::Result<String> {
    if !configured.is_empty() {
        return Ok(configured.to_string());
    }
    let Some(account) = service_account.filter(|a| !a.is_empty()) else {
        anyhow::bail!(
            "no database user: pass --service-account or set PIITAG_CLOUDSQL__USER"
        );
    };
    let user = match db_type {
        DbType::Postgres => account
            .strip_suffix(".gserviceaccount.com")
            .unwrap_or(account),
        DbType::Mysql => account.split_once('@').map_or(account, |(name, _)| name),
    };
    Ok(user.to_string())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const ACCOUNT: &str = "scanner@acme.iam.gserviceaccount.com";

    #[test]
    fn postgres_iam_user_drops_domain_suffix() {
        let user = database_user("", Some(ACCOUNT), DbType::Postgres).unwrap();
        assert_eq!(user, "scanner@acme.iam");
    }

    #[test]
    fn mysql_iam_user_is_local_part() {
        let user = database_user("", Some(ACCOUNT), DbType::Mysql).unwrap();
        assert_eq!(user, "scanner");
    }

    #[test]
    fn configured_user_wins() {
        let user = database_user("app_reader", Some(ACCOUNT), DbType::Mysql).unwrap();
        assert_eq!(user, "app_reader");
    }

    #[test]
    fn missing_user_is_an_error() {
        let err = database_user("", None, DbType::Postgres).unwrap_err();
        assert!(err.to_string().contains("--service-account"));
    }
}
