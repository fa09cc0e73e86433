//! Data Catalog v1 REST client.
//!
//! BigQuery tables are resolved through `entries:lookup` on their linked
//! resource; the service creates those entries itself. Cloud SQL tables get
//! custom entries in a dedicated entry group, created on first use.
//!
//! Tags carry no etag in this API, so `update_tag` ignores the expected
//! revision; the publisher's per-entry lock and duplicate cleanup cover it.
//! The template version is kept as a `(vN)` suffix of its display name.

use std::collections::BTreeMap;

use async_trait::async_trait;
use piitag_core::RunContext;
use piitag_core::entities::TableHandle;
use piitag_core::enums::SourceKind;
use piitag_core::http::{ApiError, check_response, json_body};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::error::CatalogError;
use crate::mapper::{CatalogTag, TagValue};
use crate::schema::{FieldType, TagTemplateSchema};
use crate::service::{CatalogService, StoredTag};

pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

const DEFAULT_BASE_URL: &str = "https://datacatalog.googleapis.com/v1";

#[derive(Debug)]
pub struct DataCatalogClient {
    http: reqwest::Client,
    base_url: String,
    location: String,
    entry_group: String,
    entry_group_ready: OnceCell<()>,
}

impl DataCatalogClient {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        location: impl Into<String>,
        entry_group: impl Into<String>,
    ) -> Self {
        Self::with_base_url(http, DEFAULT_BASE_URL, location, entry_group)
    }

    #[must_use]
    pub fn with_base_url(
        http: reqwest::Client,
        base_url: impl Into<String>,
        location: impl Into<String>,
        entry_group: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            location: location.into(),
            entry_group: entry_group.into(),
            entry_group_ready: OnceCell::new(),
        }
    }

    fn location_path(&self, project: &str) -> String {
        format!("projects/{project}/locations/{}", self.location)
    }

    fn template_name(&self, project: &str, template_id: &str) -> String {
        format!("{}/tagTemplates/{template_id}", self.location_path(project))
    }

    fn entry_group_name(&self, project: &str) -> String {
        format!("{}/entryGroups/{}", self.location_path(project), self.entry_group)
    }

    fn url(&self, resource: &str) -> String {
        format!("{}/{resource}", self.base_url)
    }

    async fn ensure_entry_group(&self, ctx: &RunContext) -> Result<(), CatalogError> {
        self.entry_group_ready
            .get_or_try_init(|| async {
                let parent = format!("{}/entryGroups", self.location_path(ctx.project()));
                let url = format!(
                    "{}?entryGroupId={}",
                    self.url(&parent),
                    urlencoding::encode(&self.entry_group)
                );
                let body = EntryGroupWire {
                    display_name: self.entry_group.clone(),
                };
                let request = self.http.post(url).json(&body);
                match send_json::<serde_json::Value>(ctx, request, &parent).await {
                    Ok(_) => {
                        tracing::info!(entry_group = %self.entry_group, "created entry group");
                        Ok(())
                    }
                    Err(CatalogError::AlreadyExists(_)) => Ok(()),
                    Err(e) => Err(e),
                }
            })
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl CatalogService for DataCatalogClient {
    async fn lookup_entry(
        &self,
        ctx: &RunContext,
        handle: &TableHandle,
        entry_id: &str,
    ) -> Result<Option<String>, CatalogError> {
        let (url, resource) = match handle.source_kind() {
            SourceKind::Bigquery => {
                let linked = handle.linked_resource();
                (
                    format!(
                        "{}?linkedResource={}",
                        self.url("entries:lookup"),
                        urlencoding::encode(&linked)
                    ),
                    linked,
                )
            }
            SourceKind::Cloudsql => {
                let name = format!("{}/entries/{entry_id}", self.entry_group_name(ctx.project()));
                (self.url(&name), name)
            }
        };
        match send_json::<EntryWire>(ctx, self.http.get(url), &resource)
            .await
        {
            Ok(entry) => Ok(Some(entry.name)),
            Err(CatalogError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_entry(
        &self,
        ctx: &RunContext,
        handle: &TableHandle,
        entry_id: &str,
    ) -> Result<String, CatalogError> {
        if handle.source_kind() == SourceKind::Bigquery {
            return Err(CatalogError::NotFound(format!(
                "catalog entry for BigQuery table {handle}"
            )));
        }
        self.ensure_entry_group(ctx).await?;

        let parent = format!("{}/entries", self.entry_group_name(ctx.project()));
        let url = format!(
            "{}?entryId={}",
            self.url(&parent),
            urlencoding::encode(entry_id)
        );
        let system = format!(
            "cloud_sql_{}",
            handle.db_type().map_or("database", |db| db.as_str())
        );
        let body = NewEntryWire {
            user_specified_system: system,
            user_specified_type: "table".to_string(),
            linked_resource: handle.linked_resource(),
            display_name: handle.table_name().to_string(),
            description: format!("Cloud SQL table {handle}"),
        };
        let entry: EntryWire = send_json(ctx, self.http.post(url).json(&body), &parent)
            .await?;
        Ok(entry.name)
    }

    async fn get_template(
        &self,
        ctx: &RunContext,
        template_id: &str,
    ) -> Result<Option<TagTemplateSchema>, CatalogError> {
        let name = self.template_name(ctx.project(), template_id);
        match send_json::<TemplateWire>(ctx, self.http.get(self.url(&name)), &name)
            .await
        {
            Ok(wire) => Ok(Some(wire.into_schema(template_id))),
            Err(CatalogError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_template(
        &self,
        ctx: &RunContext,
        schema: &TagTemplateSchema,
    ) -> Result<(), CatalogError> {
        let parent = format!("{}/tagTemplates", self.location_path(ctx.project()));
        let url = format!(
            "{}?tagTemplateId={}",
            self.url(&parent),
            urlencoding::encode(&schema.template_id)
        );
        let body = TemplateWire::from(schema);
        send_empty(ctx, self.http.post(url).json(&body), &parent)
            .await
    }

    async fn add_template_field(
        &self,
        ctx: &RunContext,
        template_id: &str,
        field: &str,
        field_type: &FieldType,
    ) -> Result<(), CatalogError> {
        let parent = format!("{}/fields", self.template_name(ctx.project(), template_id));
        let url = format!(
            "{}?tagTemplateFieldId={}",
            self.url(&parent),
            urlencoding::encode(field)
        );
        let body = TemplateFieldWire {
            display_name: Some(field.to_string()),
            field_type: field_type.into(),
        };
        send_empty(ctx, self.http.post(url).json(&body), &parent)
            .await
    }

    async fn set_template_version(
        &self,
        ctx: &RunContext,
        schema: &TagTemplateSchema,
    ) -> Result<(), CatalogError> {
        let name = self.template_name(ctx.project(), &schema.template_id);
        let url = format!("{}?updateMask=displayName", self.url(&name));
        let body = TemplateWire {
            display_name: versioned_display_name(&schema.display_name, schema.version),
            fields: BTreeMap::new(),
        };
        send_empty(ctx, self.http.patch(url).json(&body), &name)
            .await
    }

    async fn list_tags(&self, ctx: &RunContext, entry: &str) -> Result<Vec<StoredTag>, CatalogError> {
        let resource = format!("{entry}/tags");
        let mut tags = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut url = format!("{}?pageSize=100", self.url(&resource));
            if let Some(token) = &page_token {
                url.push_str("&pageToken=");
                url.push_str(&urlencoding::encode(token));
            }
            let page: ListTagsWire = send_json(ctx, self.http.get(url), &resource).await?;
            tags.extend(page.tags.into_iter().map(TagWire::into_stored));
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => return Ok(tags),
            }
        }
    }

    async fn create_tag(
        &self,
        ctx: &RunContext,
        entry: &str,
        tag: &CatalogTag,
    ) -> Result<StoredTag, CatalogError> {
        let resource = format!("{entry}/tags");
        let body = TagWire {
            name: None,
            template: Some(self.template_name(ctx.project(), &tag.template_id)),
            fields: wire_fields(&tag.fields),
        };
        let created: TagWire = send_json(ctx, self.http.post(self.url(&resource)).json(&body), &resource)
            .await?;
        Ok(created.into_stored())
    }

    async fn update_tag(
        &self,
        ctx: &RunContext,
        tag_name: &str,
        _expected_revision: Option<&str>,
        tag: &CatalogTag,
    ) -> Result<StoredTag, CatalogError> {
        let url = format!("{}?updateMask=fields", self.url(tag_name));
        let body = TagWire {
            name: None,
            template: None,
            fields: wire_fields(&tag.fields),
        };
        let updated: TagWire = send_json(ctx, self.http.patch(url).json(&body), tag_name)
            .await?;
        Ok(updated.into_stored())
    }

    async fn delete_tag(&self, ctx: &RunContext, tag_name: &str) -> Result<(), CatalogError> {
        send_empty(ctx, self.http.delete(self.url(tag_name)), tag_name)
            .await
    }
}

async fn send_json<T: DeserializeOwned>(
    ctx: &RunContext,
    request: reqwest::RequestBuilder,
    resource: &str,
) -> Result<T, CatalogError> {
    let result: Result<T, ApiError> = async {
        let token = ctx.bearer(CLOUD_PLATFORM_SCOPE).await?;
        let resp = request.bearer_auth(token).send().await?;
        json_body(resp).await
    }
    .await;
    result.map_err(|e| CatalogError::from_api(resource, e))
}

async fn send_empty(
    ctx: &RunContext,
    request: reqwest::RequestBuilder,
    resource: &str,
) -> Result<(), CatalogError> {
    let result: Result<(), ApiError> = async {
        let token = ctx.bearer(CLOUD_PLATFORM_SCOPE).await?;
        let resp = request.bearer_auth(token).send().await?;
        check_response(resp).await.map(|_| ())
    }
    .await;
    result.map_err(|e| CatalogError::from_api(resource, e))
}

/// `"PII findings (v3)"` for version 3.
fn versioned_display_name(display_name: &str, version: u32) -> String {
    format!("{display_name} (v{version})")
}

/// Split a display name written by [`versioned_display_name`]. Names without
/// a version suffix are version 1.
fn split_version(display_name: &str) -> (String, u32) {
    let parsed = display_name
        .strip_suffix(')')
        .and_then(|rest| rest.rsplit_once(" (v"))
        .and_then(|(base, v)| v.parse::<u32>().ok().map(|v| (base.to_string(), v)));
    parsed.unwrap_or_else(|| (display_name.to_string(), 1))
}

/// Last path segment of a tag template resource name.
fn template_id_of(template: &str) -> String {
    template
        .rsplit_once("/tagTemplates/")
        .map_or(template, |(_, id)| id)
        .to_string()
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EntryGroupWire {
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct EntryWire {
    name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewEntryWire {
    user_specified_system: String,
    user_specified_type: String,
    linked_resource: String,
    display_name: String,
    description: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TemplateWire {
    #[serde(default)]
    display_name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    fields: BTreeMap<String, TemplateFieldWire>,
}

impl TemplateWire {
    fn into_schema(self, template_id: &str) -> TagTemplateSchema {
        let (display_name, version) = split_version(&self.display_name);
        TagTemplateSchema {
            template_id: template_id.to_string(),
            display_name,
            version,
            fields: self
                .fields
                .into_iter()
                .map(|(name, field)| (name, FieldType::from(field.field_type)))
                .collect(),
        }
    }
}

impl From<&TagTemplateSchema> for TemplateWire {
    fn from(schema: &TagTemplateSchema) -> Self {
        Self {
            display_name: versioned_display_name(&schema.display_name, schema.version),
            fields: schema
                .fields
                .iter()
                .map(|(name, ty)| {
                    (
                        name.clone(),
                        TemplateFieldWire {
                            display_name: Some(name.clone()),
                            field_type: ty.into(),
                        },
                    )
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TemplateFieldWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(rename = "type")]
    field_type: FieldTypeWire,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldTypeWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    primitive_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    enum_type: Option<EnumTypeWire>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnumTypeWire {
    #[serde(default)]
    allowed_values: Vec<EnumValueWire>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnumValueWire {
    display_name: String,
}

impl From<&FieldType> for FieldTypeWire {
    fn from(ty: &FieldType) -> Self {
        let primitive = |name: &str| Self {
            primitive_type: Some(name.to_string()),
            enum_type: None,
        };
        match ty {
            FieldType::String => primitive("STRING"),
            FieldType::Bool => primitive("BOOL"),
            FieldType::Double => primitive("DOUBLE"),
            FieldType::Enum { values } => Self {
                primitive_type: None,
                enum_type: Some(EnumTypeWire {
                    allowed_values: values
                        .iter()
                        .map(|v| EnumValueWire {
                            display_name: v.clone(),
                        })
                        .collect(),
                }),
            },
        }
    }
}

/// Types this crate never writes (`TIMESTAMP`, `RICHTEXT`) read as string.
impl From<FieldTypeWire> for FieldType {
    fn from(wire: FieldTypeWire) -> Self {
        if let Some(enum_type) = wire.enum_type {
            return Self::Enum {
                values: enum_type
                    .allowed_values
                    .into_iter()
                    .map(|v| v.display_name)
                    .collect(),
            };
        }
        match wire.primitive_type.as_deref() {
            Some("BOOL") => Self::Bool,
            Some("DOUBLE") => Self::Double,
            _ => Self::String,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListTagsWire {
    #[serde(default)]
    tags: Vec<TagWire>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TagWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    template: Option<String>,
    #[serde(default)]
    fields: BTreeMap<String, TagFieldWire>,
}

impl TagWire {
    fn into_stored(self) -> StoredTag {
        StoredTag {
            name: self.name.unwrap_or_default(),
            template_id: self.template.as_deref().map(template_id_of).unwrap_or_default(),
            fields: self
                .fields
                .into_iter()
                .filter_map(|(name, value)| value.into_value().map(|v| (name, v)))
                .collect(),
            revision: None,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TagFieldWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    string_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bool_value: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    double_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    enum_value: Option<EnumValueWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp_value: Option<String>,
}

impl TagFieldWire {
    fn into_value(self) -> Option<TagValue> {
        if let Some(v) = self.enum_value {
            return Some(TagValue::Enum(v.display_name));
        }
        self.bool_value
            .map(TagValue::Bool)
            .or_else(|| self.double_value.map(TagValue::Double))
            .or_else(|| self.string_value.map(TagValue::String))
            .or_else(|| self.timestamp_value.map(TagValue::String))
    }
}

impl From<&TagValue> for TagFieldWire {
    fn from(value: &TagValue) -> Self {
        match value {
            TagValue::String(s) => Self {
                string_value: Some(s.clone()),
                ..Self::default()
            },
            TagValue::Bool(b) => Self {
                bool_value: Some(*b),
                ..Self::default()
            },
            TagValue::Double(d) => Self {
                double_value: Some(*d),
                ..Self::default()
            },
            TagValue::Enum(e) => Self {
                enum_value: Some(EnumValueWire {
                    display_name: e.clone(),
                }),
                ..Self::default()
            },
        }
    }
}

fn wire_fields(fields: &BTreeMap<String, TagValue>) -> BTreeMap<String, TagFieldWire> {
    fields
        .iter()
        .map(|(name, value)| (name.clone(), TagFieldWire::from(value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn display_name_carries_the_version() {
        assert_eq!(versioned_display_name("PII findings", 3), "PII findings (v3)");
        assert_eq!(split_version("PII findings (v3)"), ("PII findings".to_string(), 3));
        assert_eq!(split_version("PII findings"), ("PII findings".to_string(), 1));
        assert_eq!(split_version("odd (vx)"), ("odd (vx)".to_string(), 1));
    }

    #[test]
    fn template_round_trips_through_wire_format() {
        let schema = TagTemplateSchema::base("pii_findings", "PII findings")
            .migrate(&BTreeMap::from([(
                "email__email_address_likelihood".to_string(),
                FieldType::likelihood(),
            )]))
            .unwrap();
        let wire = serde_json::to_value(TemplateWire::from(&schema)).unwrap();
        assert_eq!(wire["displayName"], "PII findings (v2)");
        assert_eq!(wire["fields"]["has_pii"]["type"]["primitiveType"], "BOOL");
        assert_eq!(
            wire["fields"]["email__email_address_likelihood"]["type"]["enumType"]["allowedValues"][4]
                ["displayName"],
            "VERY_LIKELY"
        );

        let back: TemplateWire = serde_json::from_value(wire).unwrap();
        assert_eq!(back.into_schema("pii_findings"), schema);
    }

    #[test]
    fn tag_fields_encode_by_type() {
        let fields = BTreeMap::from([
            ("has_pii".to_string(), TagValue::Bool(true)),
            ("email__email_address_count".to_string(), TagValue::Double(3.0)),
            (
                "email__email_address_likelihood".to_string(),
                TagValue::Enum("LIKELY".into()),
            ),
        ]);
        let wire = serde_json::to_value(wire_fields(&fields)).unwrap();
        assert_eq!(
            wire,
            json!({
                "email__email_address_count": { "doubleValue": 3.0 },
                "email__email_address_likelihood": { "enumValue": { "displayName": "LIKELY" } },
                "has_pii": { "boolValue": true }
            })
        );
    }

    #[test]
    fn listed_tags_decode_into_stored_tags() {
        let page: ListTagsWire = serde_json::from_value(json!({
            "tags": [{
                "name": "projects/acme/locations/us/entryGroups/@bigquery/entries/abc/tags/t1",
                "template": "projects/acme/locations/us-central1/tagTemplates/pii_findings",
                "templateDisplayName": "PII findings (v2)",
                "fields": {
                    "has_pii": { "displayName": "has_pii", "boolValue": true },
                    "inspected_at": { "stringValue": "2026-10-19T12:00:00+00:00" },
                    "email__email_address_likelihood": { "enumValue": { "displayName": "LIKELY" } }
                }
            }],
            "nextPageToken": ""
        }))
        .unwrap();
        let tag = page.tags.into_iter().next().unwrap().into_stored();
        assert_eq!(tag.template_id, "pii_findings");
        assert_eq!(tag.fields["has_pii"], TagValue::Bool(true));
        assert_eq!(
            tag.fields["email__email_address_likelihood"],
            TagValue::Enum("LIKELY".into())
        );
        assert!(tag.revision.is_none());
    }
}
