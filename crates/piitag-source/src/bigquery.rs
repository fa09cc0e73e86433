//! BigQuery connector over the REST API (`tables.get`, `tabledata.list`,
//! `tables.list`).
//!
//! Rows come back in BigQuery's `{"f": [{"v": ...}]}` encoding and are decoded
//! against the table schema into nested JSON objects.

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use piitag_core::entities::{DatasetScope, SampledRow, TableHandle, TableSchema};
use piitag_core::enums::SourceKind;
use piitag_core::http::{ApiError, json_body};
use piitag_core::{RetryError, RunContext, with_retry};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::SourceError;
use crate::flatten::{SourceField, flatten_schema};
use crate::source::{DatasetLister, RowStream, TableSource};

pub const BIGQUERY_SCOPE: &str = "https://www.googleapis.com/auth/bigquery.readonly";

const DEFAULT_BASE_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";
const LIST_PAGE_SIZE: u32 = 1000;

/// Reads BigQuery tables through the REST API.
#[derive(Debug, Clone)]
pub struct BigQueryConnector {
    http: reqwest::Client,
    base_url: String,
}

impl BigQueryConnector {
    #[must_use]
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_base_url(http, DEFAULT_BASE_URL)
    }

    /// Point the connector at another endpoint (emulators, private access).
    #[must_use]
    pub fn with_base_url(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn dataset_url(&self, project: &str, dataset: &str) -> String {
        format!(
            "{}/projects/{}/datasets/{}",
            self.base_url,
            urlencoding::encode(project),
            urlencoding::encode(dataset)
        )
    }

    fn table_url(&self, table: &TableHandle) -> String {
        format!(
            "{}/tables/{}",
            self.dataset_url(table.project(), table.dataset_or_instance()),
            urlencoding::encode(table.table_name())
        )
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        ctx: &RunContext,
        operation: &'static str,
        url: &str,
    ) -> Result<T, ApiError> {
        with_retry(ctx.retry(), operation, move || async move {
            let token = ctx.bearer(BIGQUERY_SCOPE).await?;
            let resp = self.http.get(url).bearer_auth(token).send().await?;
            json_body(resp).await
        })
        .await
        .map_err(RetryError::into_inner)
    }

    async fn table_fields(
        &self,
        ctx: &RunContext,
        table: &TableHandle,
    ) -> Result<Vec<TableFieldSchema>, SourceError> {
        let resource: TableResource = self
            .get_json(ctx, "bigquery.tables.get", &self.table_url(table))
            .await
            .map_err(|e| SourceError::from_api(table, e))?;
        Ok(resource.schema.map(|s| s.fields).unwrap_or_default())
    }
}

#[async_trait]
impl TableSource for BigQueryConnector {
    async fn get_schema(
        &self,
        ctx: &RunContext,
        table: &TableHandle,
    ) -> Result<TableSchema, SourceError> {
        let fields = self.table_fields(ctx, table).await?;
        let fields: Vec<SourceField> = fields.iter().map(SourceField::from).collect();
        Ok(flatten_schema(&table.to_string(), &fields))
    }

    async fn sample_rows(
        &self,
        ctx: &RunContext,
        table: &TableHandle,
        max_rows: u32,
    ) -> Result<RowStream, SourceError> {
        let fields = self.table_fields(ctx, table).await?;
        let pager = TableDataPager {
            connector: self.clone(),
            ctx: ctx.clone(),
            url: format!("{}/data", self.table_url(table)),
            table: table.to_string(),
            fields,
            remaining: max_rows,
            page_token: None,
            did_request: false,
        };
        Ok(pager.into_stream())
    }
}

#[async_trait]
impl DatasetLister for BigQueryConnector {
    async fn list_tables(
        &self,
        ctx: &RunContext,
        scope: &DatasetScope,
    ) -> Result<Vec<TableHandle>, SourceError> {
        let DatasetScope::Bigquery { project, dataset } = scope else {
            return Err(SourceError::WrongSource {
                connector: SourceKind::Bigquery,
                requested: scope.source_kind(),
            });
        };

        let base = format!("{}/tables", self.dataset_url(project, dataset));
        let mut tables = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut url = format!("{base}?maxResults={LIST_PAGE_SIZE}");
            if let Some(token) = &page_token {
                url.push_str("&pageToken=");
                url.push_str(&urlencoding::encode(token));
            }
            let page: TableList = self
                .get_json(ctx, "bigquery.tables.list", &url)
                .await
                .map_err(|e| SourceError::from_api(scope, e))?;

            for entry in page.tables {
                if entry.kind == "TABLE" {
                    tables.push(scope.table(entry.table_reference.table_id));
                } else {
                    tracing::debug!(
                        table = %entry.table_reference.table_id,
                        kind = %entry.kind,
                        "skipping non-table dataset member"
                    );
                }
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(tables)
    }
}

/// Pages through `tabledata.list` until `remaining` rows were read or the
/// table is exhausted.
struct TableDataPager {
    connector: BigQueryConnector,
    ctx: RunContext,
    url: String,
    table: String,
    fields: Vec<TableFieldSchema>,
    remaining: u32,
    page_token: Option<String>,
    did_request: bool,
}

impl TableDataPager {
    /// Read the next page. Returns `Ok(None)` once done.
    async fn read_next(&mut self) -> Result<Option<Vec<SampledRow>>, SourceError> {
        if self.remaining == 0 || (self.did_request && self.page_token.is_none()) {
            return Ok(None);
        }

        let mut url = format!("{}?maxResults={}", self.url, self.remaining);
        if let Some(token) = &self.page_token {
            url.push_str("&pageToken=");
            url.push_str(&urlencoding::encode(token));
        }

        let page: TableDataPage = self
            .connector
            .get_json(&self.ctx, "bigquery.tabledata.list", &url)
            .await
            .map_err(|e| SourceError::from_api(&self.table, e))?;

        self.did_request = true;
        self.page_token = page.page_token.filter(|t| !t.is_empty());

        let take = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        let rows: Vec<SampledRow> = page
            .rows
            .iter()
            .take(take)
            .map(|row| SampledRow::new(decode_record(&self.fields, &row.f)))
            .collect();
        if rows.is_empty() {
            self.page_token = None;
        }
        self.remaining = self
            .remaining
            .saturating_sub(u32::try_from(rows.len()).unwrap_or(u32::MAX));
        Ok(Some(rows))
    }

    fn into_stream(self) -> RowStream {
        stream::unfold(Some(self), |state| async move {
            let mut state = state?;
            match state.read_next().await {
                Ok(None) => None,
                Ok(Some(rows)) => Some((Ok(rows), Some(state))),
                Err(e) => Some((Err(e), None)),
            }
        })
        .map_ok(|rows| stream::iter(rows.into_iter().map(Ok::<_, SourceError>)))
        .try_flatten()
        .boxed()
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TableResource {
    #[serde(default)]
    schema: Option<TableFieldList>,
}

#[derive(Debug, Deserialize)]
struct TableFieldList {
    #[serde(default)]
    fields: Vec<TableFieldSchema>,
}

#[derive(Debug, Clone, Deserialize)]
struct TableFieldSchema {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    fields: Vec<TableFieldSchema>,
}

impl TableFieldSchema {
    fn is_repeated(&self) -> bool {
        self.mode.as_deref() == Some("REPEATED")
    }

    fn is_record(&self) -> bool {
        matches!(self.field_type.as_str(), "RECORD" | "STRUCT")
    }
}

impl From<&TableFieldSchema> for SourceField {
    fn from(field: &TableFieldSchema) -> Self {
        Self {
            name: field.name.clone(),
            type_name: field.field_type.clone(),
            repeated: field.is_repeated(),
            fields: field.fields.iter().map(Self::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableDataPage {
    #[serde(default)]
    rows: Vec<TableRow>,
    #[serde(default)]
    page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    #[serde(default)]
    f: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableList {
    #[serde(default)]
    tables: Vec<TableListEntry>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableListEntry {
    table_reference: TableReference,
    #[serde(rename = "type", default)]
    kind: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableReference {
    table_id: String,
}

/// Decode one `f` array against `fields` into a JSON object.
fn decode_record(fields: &[TableFieldSchema], cells: &[Value]) -> Map<String, Value> {
    fields
        .iter()
        .zip(cells)
        .map(|(field, cell)| {
            let raw = cell.get("v").unwrap_or(&Value::Null);
            (field.name.clone(), decode_value(field, raw))
        })
        .collect()
}

fn decode_value(field: &TableFieldSchema, raw: &Value) -> Value {
    if field.is_repeated() {
        let Value::Array(items) = raw else {
            return Value::Null;
        };
        return Value::Array(
            items
                .iter()
                .map(|item| decode_single(field, item.get("v").unwrap_or(&Value::Null)))
                .collect(),
        );
    }
    decode_single(field, raw)
}

fn decode_single(field: &TableFieldSchema, raw: &Value) -> Value {
    if !field.is_record() {
        return raw.clone();
    }
    match raw.get("f").and_then(Value::as_array) {
        Some(cells) => Value::Object(decode_record(&field.fields, cells)),
        None => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use piitag_core::entities::FieldPath;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn orders_fields() -> Vec<TableFieldSchema> {
        serde_json::from_value(json!([
            {"name": "email", "type": "STRING", "mode": "NULLABLE"},
            {"name": "customer", "type": "RECORD", "fields": [
                {"name": "phone", "type": "STRING"},
                {"name": "address", "type": "RECORD", "fields": [
                    {"name": "zip", "type": "STRING"}
                ]}
            ]},
            {"name": "notes", "type": "STRING", "mode": "REPEATED"}
        ]))
        .unwrap()
    }

    #[test]
    fn schema_is_flattened_to_two_levels() {
        let fields: Vec<SourceField> = orders_fields().iter().map(SourceField::from).collect();
        let schema = flatten_schema("acme.sales.orders", &fields);
        assert_eq!(schema.headers(), vec!["email", "customer.phone", "notes"]);
        assert!(schema.columns[2].repeated);
    }

    #[test]
    fn decodes_nested_and_repeated_cells() {
        let row: TableRow = serde_json::from_value(json!({
            "f": [
                {"v": "ana@example.com"},
                {"v": {"f": [{"v": "+1 555 0100"}, {"v": {"f": [{"v": "90210"}]}}]}},
                {"v": [{"v": "first"}, {"v": "second"}]}
            ]
        }))
        .unwrap();
        let sampled = SampledRow::new(decode_record(&orders_fields(), &row.f));

        assert_eq!(
            sampled.cell(&FieldPath::top("email").unwrap()).as_deref(),
            Some("ana@example.com")
        );
        assert_eq!(
            sampled
                .cell(&FieldPath::nested("customer", "phone").unwrap())
                .as_deref(),
            Some("+1 555 0100")
        );
        assert_eq!(
            sampled.cell(&FieldPath::top("notes").unwrap()).as_deref(),
            Some("first, second")
        );
    }

    #[test]
    fn null_record_decodes_to_null() {
        let row: TableRow =
            serde_json::from_value(json!({"f": [{"v": null}, {"v": null}, {"v": []}]})).unwrap();
        let decoded = decode_record(&orders_fields(), &row.f);
        assert_eq!(decoded["customer"], Value::Null);
        assert_eq!(decoded["notes"], json!([]));
    }

    #[test]
    fn table_list_keeps_page_token() {
        let page: TableList = serde_json::from_value(json!({
            "tables": [
                {"tableReference": {"projectId": "p", "datasetId": "d", "tableId": "orders"}, "type": "TABLE"},
                {"tableReference": {"projectId": "p", "datasetId": "d", "tableId": "v_orders"}, "type": "VIEW"}
            ],
            "nextPageToken": "abc"
        }))
        .unwrap();
        assert_eq!(page.tables.len(), 2);
        assert_eq!(page.tables[1].kind, "VIEW");
        assert_eq!(page.next_page_token.as_deref(), Some("abc"));
    }

    #[test]
    fn urls_are_encoded() {
        let connector =
            BigQueryConnector::with_base_url(reqwest::Client::new(), "http://localhost:9050/");
        let handle = TableHandle::bigquery("acme", "sales", "order items");
        assert_eq!(
            connector.table_url(&handle),
            "http://localhost:9050/projects/acme/datasets/sales/tables/order%20items"
        );
    }
}
