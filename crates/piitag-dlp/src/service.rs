//! The inspection service boundary.

use async_trait::async_trait;
use piitag_core::RunContext;
use piitag_core::enums::Likelihood;
use piitag_core::http::ApiError;

/// An info type the service can detect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoTypeDescriptor {
    pub name: String,
    /// Location categories the info type belongs to (`GLOBAL`, `JAPAN`, ...).
    pub location_categories: Vec<String>,
}

impl InfoTypeDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>, categories: &[&str]) -> Self {
        Self {
            name: name.into(),
            location_categories: categories.iter().map(|c| (*c).to_string()).collect(),
        }
    }
}

/// One inspection call over a block of table content.
#[derive(Debug, Clone, PartialEq)]
pub struct InspectRequest {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub info_types: Vec<String>,
    pub min_likelihood: Likelihood,
    pub max_findings: u32,
}

/// A detection as the service reports it, located by column header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFinding {
    pub column: String,
    pub info_type: String,
    /// `None` for `LIKELIHOOD_UNSPECIFIED`.
    pub likelihood: Option<Likelihood>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InspectResponse {
    pub findings: Vec<RawFinding>,
    /// The service stopped reporting findings for this request early.
    pub findings_truncated: bool,
}

/// Sensitive-data inspection service.
#[async_trait]
pub trait InspectionService: Send + Sync {
    async fn list_info_types(&self, ctx: &RunContext) -> Result<Vec<InfoTypeDescriptor>, ApiError>;

    async fn inspect_table(
        &self,
        ctx: &RunContext,
        request: &InspectRequest,
    ) -> Result<InspectResponse, ApiError>;
}
