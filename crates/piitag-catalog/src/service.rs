//! The catalog service boundary.

use std::collections::BTreeMap;

use async_trait::async_trait;
use piitag_core::RunContext;
use piitag_core::entities::TableHandle;

use crate::error::CatalogError;
use crate::mapper::{CatalogTag, TagValue};
use crate::schema::{FieldType, TagTemplateSchema};

/// A tag as stored by the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTag {
    /// Resource name, used to update or delete the tag.
    pub name: String,
    pub template_id: String,
    pub fields: BTreeMap<String, TagValue>,
    /// Opaque revision for conditional updates, when the service has one.
    pub revision: Option<String>,
}

/// Operations the publisher needs from a metadata catalog.
///
/// Implementations report races through [`CatalogError::AlreadyExists`]
/// (a create lost) and [`CatalogError::Conflict`] (a conditional update
/// lost). Transient failures come back as [`CatalogError::Api`] and are
/// retried by the caller.
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Resource name of the entry representing `handle`, if it exists.
    async fn lookup_entry(
        &self,
        ctx: &RunContext,
        handle: &TableHandle,
        entry_id: &str,
    ) -> Result<Option<String>, CatalogError>;

    /// Create the entry for `handle` and return its resource name.
    async fn create_entry(
        &self,
        ctx: &RunContext,
        handle: &TableHandle,
        entry_id: &str,
    ) -> Result<String, CatalogError>;

    async fn get_template(
        &self,
        ctx: &RunContext,
        template_id: &str,
    ) -> Result<Option<TagTemplateSchema>, CatalogError>;

    async fn create_template(
        &self,
        ctx: &RunContext,
        schema: &TagTemplateSchema,
    ) -> Result<(), CatalogError>;

    async fn add_template_field(
        &self,
        ctx: &RunContext,
        template_id: &str,
        field: &str,
        field_type: &FieldType,
    ) -> Result<(), CatalogError>;

    /// Record that the template now matches `schema.version`.
    async fn set_template_version(
        &self,
        ctx: &RunContext,
        schema: &TagTemplateSchema,
    ) -> Result<(), CatalogError>;

    async fn list_tags(&self, ctx: &RunContext, entry: &str)
    -> Result<Vec<StoredTag>, CatalogError>;

    async fn create_tag(
        &self,
        ctx: &RunContext,
        entry: &str,
        tag: &CatalogTag,
    ) -> Result<StoredTag, CatalogError>;

    /// Overwrite the fields of `tag_name`. With `expected_revision`, the
    /// update only applies if the stored tag is still at that revision.
    async fn update_tag(
        &self,
        ctx: &RunContext,
        tag_name: &str,
        expected_revision: Option<&str>,
        tag: &CatalogTag,
    ) -> Result<StoredTag, CatalogError>;

    async fn delete_tag(&self, ctx: &RunContext, tag_name: &str) -> Result<(), CatalogError>;
}
