//! In-memory catalog used by tests and dry runs.
//!
//! Behaves like Data Catalog where it matters for publishing: one tag per
//! template per entry, conditional updates by revision, and templates whose
//! fields can only be added. Faults can be queued per operation to exercise
//! retry and conflict handling.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use piitag_core::entities::TableHandle;
use piitag_core::enums::SourceKind;
use piitag_core::{ApiError, RunContext};

use crate::error::CatalogError;
use crate::mapper::CatalogTag;
use crate::schema::{FieldType, TagTemplateSchema};
use crate::service::{CatalogService, StoredTag};

/// A failure to return from the next call of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// 503, retried by the caller.
    Unavailable,
    /// 403, not retried.
    PermissionDenied,
    /// Another writer updates the tag first, so this update loses.
    ConcurrentWrite,
}

#[derive(Debug, Default)]
struct State {
    /// entry id -> entry resource name
    entries: BTreeMap<String, String>,
    templates: BTreeMap<String, TagTemplateSchema>,
    /// tag name -> (entry name, tag)
    tags: BTreeMap<String, (String, StoredTag)>,
    next_tag: u64,
    faults: VecDeque<(&'static str, Fault)>,
}

#[derive(Debug)]
pub struct InMemoryCatalog {
    state: Mutex<State>,
    bigquery_synced: bool,
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCatalog {
    /// A catalog that already knows every BigQuery table, as Data Catalog
    /// does through its automatic BigQuery sync.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            bigquery_synced: true,
        }
    }

    /// A catalog with no BigQuery entries.
    #[must_use]
    pub fn without_bigquery_sync() -> Self {
        Self {
            bigquery_synced: false,
            ..Self::new()
        }
    }

    /// Fail the next call of `operation` (e.g. `"update_tag"`) with `fault`.
    pub fn inject(&self, operation: &'static str, fault: Fault) {
        self.lock().faults.push_back((operation, fault));
    }

    /// Tags attached to `entry_id`, any template.
    #[must_use]
    pub fn tags_for(&self, entry_id: &str) -> Vec<StoredTag> {
        let state = self.lock();
        let Some(entry) = state.entries.get(entry_id) else {
            return Vec::new();
        };
        state
            .tags
            .values()
            .filter(|(owner, _)| owner == entry)
            .map(|(_, tag)| tag.clone())
            .collect()
    }

    #[must_use]
    pub fn tag_count(&self) -> usize {
        self.lock().tags.len()
    }

    #[must_use]
    pub fn template(&self, template_id: &str) -> Option<TagTemplateSchema> {
        self.lock().templates.get(template_id).cloned()
    }

    /// Attach `tag` directly, bypassing the one-tag-per-template rule.
    pub fn seed_tag(&self, entry_id: &str, tag: &CatalogTag) -> StoredTag {
        let mut state = self.lock();
        let entry = state
            .entries
            .entry(entry_id.to_string())
            .or_insert_with(|| entry_name(entry_id))
            .clone();
        insert_tag(&mut state, entry, tag)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn take_fault(state: &mut State, operation: &str) -> Option<Fault> {
        let index = state.faults.iter().position(|(op, _)| *op == operation)?;
        state.faults.remove(index).map(|(_, fault)| fault)
    }

    /// Lock the state for `operation`, failing with its queued fault if any.
    ///
    /// Returns whether a concurrent write was scheduled for this call.
    fn begin(&self, operation: &str) -> Result<(MutexGuard<'_, State>, bool), CatalogError> {
        let mut state = self.lock();
        match Self::take_fault(&mut state, operation) {
            None => Ok((state, false)),
            Some(Fault::ConcurrentWrite) => Ok((state, true)),
            Some(Fault::Unavailable) => Err(CatalogError::Api(ApiError::Api {
                status: 503,
                message: format!("UNAVAILABLE: {operation}"),
            })),
            Some(Fault::PermissionDenied) => Err(CatalogError::Api(ApiError::Api {
                status: 403,
                message: format!("PERMISSION_DENIED: {operation}"),
            })),
        }
    }
}

fn entry_name(entry_id: &str) -> String {
    format!("entries/{entry_id}")
}

fn insert_tag(state: &mut State, entry: String, tag: &CatalogTag) -> StoredTag {
    state.next_tag += 1;
    let stored = StoredTag {
        name: format!("{entry}/tags/{}", state.next_tag),
        template_id: tag.template_id.clone(),
        fields: tag.fields.clone(),
        revision: Some("1".to_string()),
    };
    state
        .tags
        .insert(stored.name.clone(), (entry, stored.clone()));
    stored
}

fn bump(revision: Option<&str>) -> String {
    let current: u64 = revision.and_then(|r| r.parse().ok()).unwrap_or(0);
    (current + 1).to_string()
}

#[async_trait]
impl CatalogService for InMemoryCatalog {
    async fn lookup_entry(
        &self,
        _ctx: &RunContext,
        handle: &TableHandle,
        entry_id: &str,
    ) -> Result<Option<String>, CatalogError> {
        let (mut state, _) = self.begin("lookup_entry")?;
        if let Some(name) = state.entries.get(entry_id) {
            return Ok(Some(name.clone()));
        }
        if self.bigquery_synced && handle.source_kind() == SourceKind::Bigquery {
            let name = entry_name(entry_id);
            state.entries.insert(entry_id.to_string(), name.clone());
            return Ok(Some(name));
        }
        Ok(None)
    }

    async fn create_entry(
        &self,
        _ctx: &RunContext,
        handle: &TableHandle,
        entry_id: &str,
    ) -> Result<String, CatalogError> {
        let (mut state, _) = self.begin("create_entry")?;
        if handle.source_kind() == SourceKind::Bigquery {
            return Err(CatalogError::NotFound(format!("catalog entry for {handle}")));
        }
        if state.entries.contains_key(entry_id) {
            return Err(CatalogError::AlreadyExists(format!("entry {entry_id}")));
        }
        let name = entry_name(entry_id);
        state.entries.insert(entry_id.to_string(), name.clone());
        Ok(name)
    }

    async fn get_template(
        &self,
        _ctx: &RunContext,
        template_id: &str,
    ) -> Result<Option<TagTemplateSchema>, CatalogError> {
        let (state, _) = self.begin("get_template")?;
        Ok(state.templates.get(template_id).cloned())
    }

    async fn create_template(
        &self,
        _ctx: &RunContext,
        schema: &TagTemplateSchema,
    ) -> Result<(), CatalogError> {
        let (mut state, _) = self.begin("create_template")?;
        if state.templates.contains_key(&schema.template_id) {
            return Err(CatalogError::AlreadyExists(format!(
                "template {}",
                schema.template_id
            )));
        }
        state
            .templates
            .insert(schema.template_id.clone(), schema.clone());
        Ok(())
    }

    async fn add_template_field(
        &self,
        _ctx: &RunContext,
        template_id: &str,
        field: &str,
        field_type: &FieldType,
    ) -> Result<(), CatalogError> {
        let (mut state, _) = self.begin("add_template_field")?;
        let template = state
            .templates
            .get_mut(template_id)
            .ok_or_else(|| CatalogError::NotFound(format!("template {template_id}")))?;
        if template.fields.contains_key(field) {
            return Err(CatalogError::AlreadyExists(format!("field {field}")));
        }
        template.fields.insert(field.to_string(), field_type.clone());
        Ok(())
    }

    async fn set_template_version(
        &self,
        _ctx: &RunContext,
        schema: &TagTemplateSchema,
    ) -> Result<(), CatalogError> {
        let (mut state, _) = self.begin("set_template_version")?;
        let template = state
            .templates
            .get_mut(&schema.template_id)
            .ok_or_else(|| CatalogError::NotFound(format!("template {}", schema.template_id)))?;
        template.version = template.version.max(schema.version);
        template.display_name.clone_from(&schema.display_name);
        Ok(())
    }

    async fn list_tags(
        &self,
        _ctx: &RunContext,
        entry: &str,
    ) -> Result<Vec<StoredTag>, CatalogError> {
        let (state, _) = self.begin("list_tags")?;
        Ok(state
            .tags
            .values()
            .filter(|(owner, _)| owner == entry)
            .map(|(_, tag)| tag.clone())
            .collect())
    }

    async fn create_tag(
        &self,
        _ctx: &RunContext,
        entry: &str,
        tag: &CatalogTag,
    ) -> Result<StoredTag, CatalogError> {
        let (mut state, _) = self.begin("create_tag")?;
        if !state.entries.values().any(|name| name == entry) {
            return Err(CatalogError::NotFound(format!("entry {entry}")));
        }
        check_fields(&state, tag)?;
        let taken = state
            .tags
            .values()
            .any(|(owner, t)| owner == entry && t.template_id == tag.template_id);
        if taken {
            return Err(CatalogError::AlreadyExists(format!(
                "tag for {} on {entry}",
                tag.template_id
            )));
        }
        Ok(insert_tag(&mut state, entry.to_string(), tag))
    }

    async fn update_tag(
        &self,
        _ctx: &RunContext,
        tag_name: &str,
        expected_revision: Option<&str>,
        tag: &CatalogTag,
    ) -> Result<StoredTag, CatalogError> {
        let (mut state, interfere) = self.begin("update_tag")?;
        check_fields(&state, tag)?;
        let (_, stored) = state
            .tags
            .get_mut(tag_name)
            .ok_or_else(|| CatalogError::NotFound(tag_name.to_string()))?;
        if interfere {
            stored.revision = Some(bump(stored.revision.as_deref()));
        }
        if expected_revision.is_some() && expected_revision != stored.revision.as_deref() {
            return Err(CatalogError::Conflict(tag_name.to_string()));
        }
        stored.fields.clone_from(&tag.fields);
        stored.revision = Some(bump(stored.revision.as_deref()));
        Ok(stored.clone())
    }

    async fn delete_tag(&self, _ctx: &RunContext, tag_name: &str) -> Result<(), CatalogError> {
        let (mut state, _) = self.begin("delete_tag")?;
        state
            .tags
            .remove(tag_name)
            .map(|_| ())
            .ok_or_else(|| CatalogError::NotFound(tag_name.to_string()))
    }
}

/// Reject fields the template does not define, as Data Catalog does.
fn check_fields(state: &State, tag: &CatalogTag) -> Result<(), CatalogError> {
    let template = state
        .templates
        .get(&tag.template_id)
        .ok_or_else(|| CatalogError::NotFound(format!("template {}", tag.template_id)))?;
    match tag.fields.keys().find(|f| !template.fields.contains_key(*f)) {
        Some(unknown) => Err(CatalogError::Api(ApiError::Api {
            status: 400,
            message: format!(
                "INVALID_ARGUMENT: field {unknown} is not in template {}",
                tag.template_id
            ),
        })),
        None => Ok(()),
    }
}
