use std::sync::Arc;

use chrono::Utc;
use piitag_catalog::{
    CatalogError, CatalogPublisher, InMemoryCatalog, TableSummary, TagValue, map,
};
use piitag_core::entities::{AggregatedFinding, FieldPath, TableHandle};
use piitag_core::enums::Likelihood;
use piitag_core::ids::entry_id;
use piitag_core::{ErrorKind, RetryPolicy, RunContext, StaticToken};
use pretty_assertions::assert_eq;

fn ctx() -> RunContext {
    RunContext::new("acme", Arc::new(StaticToken::new("t")), RetryPolicy::immediate(2))
}

fn finding(path: &str, info_type: &str, likelihood: Likelihood, count: u64) -> AggregatedFinding {
    AggregatedFinding {
        field_path: path.parse::<FieldPath>().unwrap(),
        info_type: info_type.into(),
        max_likelihood: likelihood,
        total_count: count,
    }
}

fn summary(rows: u64) -> TableSummary {
    TableSummary {
        rows_inspected: rows,
        top_info_type: Some("EMAIL_ADDRESS".into()),
        inspected_at: Utc::now(),
    }
}

#[tokio::test]
async fn orders_tag_carries_exactly_its_findings() {
    let catalog = Arc::new(InMemoryCatalog::new());
    let publisher = CatalogPublisher::new(catalog.clone(), "pii_findings", "PII findings");
    let ctx = ctx();
    let orders = TableHandle::bigquery("acme", "sales", "orders");
    let findings = [
        finding("email", "EMAIL_ADDRESS", Likelihood::Likely, 3),
        finding("customer.phone", "PHONE_NUMBER", Likelihood::Possible, 1),
    ];

    let schema = publisher.current_template(&ctx).await.unwrap();
    let mapped = map(&orders, &findings, &schema, &summary(3)).unwrap();
    publisher.publish(&ctx, &orders, &mapped).await.unwrap();

    let tags = catalog.tags_for(&entry_id(&orders));
    assert_eq!(tags.len(), 1);
    let fields = &tags[0].fields;
    let finding_fields: Vec<(&str, &TagValue)> = fields
        .iter()
        .filter(|(name, _)| name.ends_with("_likelihood") || name.ends_with("_count"))
        .map(|(name, value)| (name.as_str(), value))
        .collect();
    assert_eq!(
        finding_fields,
        vec![
            (
                "customer__phone__phone_number_count",
                &TagValue::Double(1.0)
            ),
            (
                "customer__phone__phone_number_likelihood",
                &TagValue::Enum("POSSIBLE".into())
            ),
            ("email__email_address_count", &TagValue::Double(3.0)),
            (
                "email__email_address_likelihood",
                &TagValue::Enum("LIKELY".into())
            ),
        ]
    );
    assert_eq!(fields["top_info_type"], TagValue::String("EMAIL_ADDRESS".into()));
}

#[tokio::test]
async fn mapping_conflict_publishes_nothing() {
    let catalog = Arc::new(InMemoryCatalog::new());
    let publisher = CatalogPublisher::new(catalog.clone(), "pii_findings", "PII findings");
    let ctx = ctx();
    let orders = TableHandle::bigquery("acme", "sales", "orders");
    let findings = [
        finding("Email", "EMAIL_ADDRESS", Likelihood::Likely, 1),
        finding("email", "EMAIL_ADDRESS", Likelihood::Likely, 1),
    ];

    let schema = publisher.current_template(&ctx).await.unwrap();
    let err = map(&orders, &findings, &schema, &summary(1)).unwrap_err();

    assert!(matches!(err, CatalogError::MappingConflict { .. }));
    assert_eq!(err.kind(), ErrorKind::SchemaMappingConflict);
    assert!(err.to_string().contains("Email (EMAIL_ADDRESS)"));
    assert_eq!(catalog.tag_count(), 0);
    assert!(catalog.template("pii_findings").is_none());
}
