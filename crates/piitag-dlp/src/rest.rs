//! Cloud DLP v2 REST client (`infoTypes.list`, `content.inspect`).

use async_trait::async_trait;
use piitag_core::RunContext;
use piitag_core::enums::Likelihood;
use piitag_core::http::{ApiError, json_body};
use serde::{Deserialize, Serialize};

use crate::service::{InfoTypeDescriptor, InspectRequest, InspectResponse, InspectionService, RawFinding};

pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

const DEFAULT_BASE_URL: &str = "https://dlp.googleapis.com/v2";
const DEFAULT_LANGUAGE_CODE: &str = "en-US";

#[derive(Debug, Clone)]
pub struct DlpClient {
    http: reqwest::Client,
    base_url: String,
    location: String,
    language_code: String,
}

impl DlpClient {
    #[must_use]
    pub fn new(http: reqwest::Client, location: impl Into<String>) -> Self {
        Self::with_base_url(http, DEFAULT_BASE_URL, location)
    }

    #[must_use]
    pub fn with_base_url(
        http: reqwest::Client,
        base_url: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            location: location.into(),
            language_code: DEFAULT_LANGUAGE_CODE.to_string(),
        }
    }

    /// Language of the info type listing. Empty keeps the default.
    #[must_use]
    pub fn with_language_code(mut self, language_code: &str) -> Self {
        if !language_code.is_empty() {
            self.language_code = language_code.to_string();
        }
        self
    }

    fn info_types_url(&self) -> String {
        format!(
            "{}/infoTypes?languageCode={}",
            self.base_url,
            urlencoding::encode(&self.language_code)
        )
    }

    fn inspect_url(&self, project: &str) -> String {
        format!(
            "{}/projects/{project}/locations/{}/content:inspect",
            self.base_url, self.location
        )
    }
}

#[async_trait]
impl InspectionService for DlpClient {
    async fn list_info_types(&self, ctx: &RunContext) -> Result<Vec<InfoTypeDescriptor>, ApiError> {
        let token = ctx.bearer(CLOUD_PLATFORM_SCOPE).await?;
        let resp = self
            .http
            .get(self.info_types_url())
            .bearer_auth(token)
            .send()
            .await?;
        let body: ListInfoTypesResponse = json_body(resp).await?;
        Ok(body
            .info_types
            .into_iter()
            .filter(|t| t.supported_by.is_empty() || t.supported_by.iter().any(|s| s == "INSPECT"))
            .map(InfoTypeDescriptor::from)
            .collect())
    }

    async fn inspect_table(
        &self,
        ctx: &RunContext,
        request: &InspectRequest,
    ) -> Result<InspectResponse, ApiError> {
        let token = ctx.bearer(CLOUD_PLATFORM_SCOPE).await?;
        let resp = self
            .http
            .post(self.inspect_url(ctx.project()))
            .bearer_auth(token)
            .json(&InspectContentRequest::from(request))
            .send()
            .await?;
        let body: InspectContentResponse = json_body(resp).await?;
        Ok(body.into())
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListInfoTypesResponse {
    #[serde(default)]
    info_types: Vec<InfoTypeWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InfoTypeWire {
    name: String,
    #[serde(default)]
    supported_by: Vec<String>,
    #[serde(default)]
    categories: Vec<InfoTypeCategoryWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InfoTypeCategoryWire {
    #[serde(default)]
    location_category: Option<String>,
}

impl From<InfoTypeWire> for InfoTypeDescriptor {
    fn from(wire: InfoTypeWire) -> Self {
        Self {
            name: wire.name,
            location_categories: wire
                .categories
                .into_iter()
                .filter_map(|c| c.location_category)
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InspectContentRequest<'a> {
    item: ContentItem<'a>,
    inspect_config: InspectConfig<'a>,
}

#[derive(Debug, Serialize)]
struct ContentItem<'a> {
    table: WireTable<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct WireTable<'a> {
    pub(crate) headers: Vec<FieldId<'a>>,
    pub(crate) rows: Vec<WireRow<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct FieldId<'a> {
    pub(crate) name: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct WireRow<'a> {
    pub(crate) values: Vec<WireValue<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct WireValue<'a> {
    #[serde(rename = "stringValue")]
    pub(crate) string_value: &'a str,
}

impl<'a> WireRow<'a> {
    pub(crate) fn new(cells: &'a [String]) -> Self {
        Self {
            values: cells
                .iter()
                .map(|c| WireValue { string_value: c })
                .collect(),
        }
    }
}

impl<'a> WireTable<'a> {
    pub(crate) fn new(headers: &'a [String], rows: &'a [Vec<String>]) -> Self {
        Self {
            headers: headers.iter().map(|h| FieldId { name: h }).collect(),
            rows: rows.iter().map(|r| WireRow::new(r)).collect(),
        }
    }
}

/// Encoded size of a request carrying `headers` and `info_types` but no rows.
pub(crate) fn request_overhead(headers: &[String], info_types: &[String], max_findings: u32) -> usize {
    let request = InspectRequest {
        headers: headers.to_vec(),
        rows: Vec::new(),
        info_types: info_types.to_vec(),
        min_likelihood: Likelihood::VeryUnlikely,
        max_findings,
    };
    serde_json::to_vec(&InspectContentRequest::from(&request)).map_or(0, |b| b.len())
}

/// Encoded size of one row inside the request, including its separator.
pub(crate) fn row_bytes(cells: &[String]) -> usize {
    serde_json::to_vec(&WireRow::new(cells)).map_or(0, |b| b.len() + 1)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InspectConfig<'a> {
    info_types: Vec<FieldId<'a>>,
    min_likelihood: Likelihood,
    include_quote: bool,
    limits: FindingLimits,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FindingLimits {
    max_findings_per_request: u32,
}

impl<'a> From<&'a InspectRequest> for InspectContentRequest<'a> {
    fn from(request: &'a InspectRequest) -> Self {
        Self {
            item: ContentItem {
                table: WireTable::new(&request.headers, &request.rows),
            },
            inspect_config: InspectConfig {
                info_types: request
                    .info_types
                    .iter()
                    .map(|name| FieldId { name })
                    .collect(),
                min_likelihood: request.min_likelihood,
                include_quote: false,
                limits: FindingLimits {
                    max_findings_per_request: request.max_findings,
                },
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct InspectContentResponse {
    #[serde(default)]
    result: InspectResultWire,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InspectResultWire {
    #[serde(default)]
    findings: Vec<FindingWire>,
    #[serde(default)]
    findings_truncated: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FindingWire {
    info_type: NameWire,
    #[serde(default)]
    likelihood: String,
    #[serde(default)]
    location: Option<LocationWire>,
}

#[derive(Debug, Deserialize)]
struct NameWire {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationWire {
    #[serde(default)]
    content_locations: Vec<ContentLocationWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentLocationWire {
    #[serde(default)]
    record_location: Option<RecordLocationWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordLocationWire {
    #[serde(default)]
    field_id: Option<NameWire>,
}

impl From<InspectContentResponse> for InspectResponse {
    fn from(wire: InspectContentResponse) -> Self {
        let findings = wire
            .result
            .findings
            .into_iter()
            .filter_map(|f| {
                let column = f
                    .location?
                    .content_locations
                    .into_iter()
                    .find_map(|l| l.record_location?.field_id)?
                    .name;
                Some(RawFinding {
                    column,
                    info_type: f.info_type.name,
                    likelihood: f.likelihood.parse().ok(),
                })
            })
            .collect();
        Self {
            findings,
            findings_truncated: wire.result.findings_truncated,
        }
    }
}
