//! Idempotent publishing of tags to the catalog.
//!
//! The catalog keys tags by `(entry, template)`. Re-running a table locates
//! the existing tag and overwrites it; a create that loses a race comes back
//! as `AlreadyExists` and is turned into an update on the next attempt.
//! Publishes for the same entry within one process are serialized by a
//! per-entry lock, and conditional updates that lose against another run are
//! retried with backoff.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use piitag_core::entities::TableHandle;
use piitag_core::ids::entry_id;
use piitag_core::{RunContext, with_retry};
use tokio::sync::Mutex;

use crate::error::CatalogError;
use crate::mapper::{CatalogTag, MappedTag};
use crate::schema::TagTemplateSchema;
use crate::service::{CatalogService, StoredTag};

/// A tag as written, with the version of the template it was written against.
#[derive(Debug, Clone)]
pub struct PublishedTag {
    pub tag: StoredTag,
    pub template_version: u32,
}

pub struct CatalogPublisher {
    service: Arc<dyn CatalogService>,
    template_id: String,
    display_name: String,
    /// Last template schema known to be live in the catalog.
    template: Mutex<Option<TagTemplateSchema>>,
    entry_locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CatalogPublisher {
    #[must_use]
    pub fn new(
        service: Arc<dyn CatalogService>,
        template_id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            service,
            template_id: template_id.into(),
            display_name: display_name.into(),
            template: Mutex::new(None),
            entry_locks: StdMutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn template_id(&self) -> &str {
        &self.template_id
    }

    /// Resource name of the entry for `handle`, created if missing.
    ///
    /// # Errors
    ///
    /// Returns the service error after retries. BigQuery tables the catalog
    /// has not synced yet fail with [`CatalogError::NotFound`].
    pub async fn ensure_entry(
        &self,
        ctx: &RunContext,
        handle: &TableHandle,
    ) -> Result<String, CatalogError> {
        let id = entry_id(handle);
        let id = id.as_str();
        let service = &self.service;

        let found = retry(ctx, "catalog.entries.lookup", move || {
            service.lookup_entry(ctx, handle, id)
        })
        .await?;
        if let Some(name) = found {
            return Ok(name);
        }

        match retry(ctx, "catalog.entries.create", move || {
            service.create_entry(ctx, handle, id)
        })
        .await
        {
            Ok(name) => {
                tracing::info!(table = %handle, entry = %name, "created catalog entry");
                Ok(name)
            }
            Err(CatalogError::AlreadyExists(_)) => retry(ctx, "catalog.entries.lookup", move || {
                service.lookup_entry(ctx, handle, id)
            })
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("entry {id}"))),
            Err(e) => Err(e),
        }
    }

    /// The template schema tags are currently mapped against.
    ///
    /// Before the template exists this is the base schema; nothing is
    /// created until [`ensure_template`](Self::ensure_template).
    ///
    /// # Errors
    ///
    /// Returns the service error after retries.
    pub async fn current_template(&self, ctx: &RunContext) -> Result<TagTemplateSchema, CatalogError> {
        let cached = self.template.lock().await;
        if let Some(schema) = cached.as_ref() {
            return Ok(schema.clone());
        }
        drop(cached);
        Ok(self
            .fetch_template(ctx)
            .await?
            .unwrap_or_else(|| TagTemplateSchema::base(&self.template_id, &self.display_name)))
    }

    /// Make the live template hold every field of `required`.
    ///
    /// Creates the template on first use and applies the additions as a
    /// migration of whatever version is live, which may be newer than the
    /// one `required` was derived from. Fields are only ever added.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::FieldTypeMismatch`] if the live template has a
    ///   required field with another type.
    /// - The service error after retries.
    pub async fn ensure_template(
        &self,
        ctx: &RunContext,
        required: &TagTemplateSchema,
    ) -> Result<TagTemplateSchema, CatalogError> {
        let mut cached = self.template.lock().await;
        if let Some(schema) = cached.as_ref()
            && schema.missing(&required.fields)?.is_empty()
        {
            return Ok(schema.clone());
        }

        // Another run may have migrated since we cached; migrate from live.
        let current = self.load_or_create_template(ctx).await?;
        let additions = current.missing(&required.fields)?;
        if additions.is_empty() {
            *cached = Some(current.clone());
            return Ok(current);
        }

        let next = current.migrate(&additions)?;
        let service = &self.service;
        let template_id = self.template_id.as_str();
        for (field, field_type) in &additions {
            let added = retry(ctx, "catalog.tagTemplates.fields.create", move || {
                service.add_template_field(ctx, template_id, field, field_type)
            })
            .await;
            match added {
                Ok(()) | Err(CatalogError::AlreadyExists(_)) => {}
                Err(e) => return Err(e),
            }
        }
        let next_ref = &next;
        retry(ctx, "catalog.tagTemplates.patch", move || {
            service.set_template_version(ctx, next_ref)
        })
        .await?;

        tracing::info!(
            template = %self.template_id,
            from = current.version,
            to = next.version,
            added = additions.len(),
            "migrated tag template"
        );
        *cached = Some(next.clone());
        Ok(next)
    }

    /// Create or overwrite the tag for `tag.template_id` on `entry`.
    ///
    /// Extra tags of the same template (left by an earlier race) are deleted
    /// so exactly one remains.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::PublishConflict`] if concurrent writers keep winning.
    /// - The service error after retries.
    pub async fn upsert_tag(
        &self,
        ctx: &RunContext,
        entry: &str,
        tag: &CatalogTag,
    ) -> Result<StoredTag, CatalogError> {
        let lock = self.entry_lock(entry);
        let _guard = lock.lock().await;

        let service = &self.service;
        let attempts = ctx.retry().max_attempts.max(1);
        for attempt in 1..=attempts {
            let listed = retry(ctx, "catalog.tags.list", move || service.list_tags(ctx, entry)).await?;
            let mut existing: Vec<StoredTag> = listed
                .into_iter()
                .filter(|t| t.template_id == tag.template_id)
                .collect();

            if existing.is_empty() {
                let created = retry(ctx, "catalog.tags.create", move || {
                    service.create_tag(ctx, entry, tag)
                })
                .await;
                match created {
                    Ok(stored) => {
                        tracing::debug!(entry, tag = %stored.name, "created tag");
                        return Ok(stored);
                    }
                    Err(CatalogError::AlreadyExists(_)) => {
                        tracing::debug!(entry, attempt, "tag appeared concurrently, updating instead");
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            }

            existing.sort_by(|a, b| a.name.cmp(&b.name));
            let keep = existing.remove(0);
            for duplicate in &existing {
                let name = duplicate.name.as_str();
                match retry(ctx, "catalog.tags.delete", move || service.delete_tag(ctx, name)).await {
                    Ok(()) | Err(CatalogError::NotFound(_)) => {
                        tracing::warn!(entry, tag = name, "removed duplicate tag");
                    }
                    Err(e) => return Err(e),
                }
            }

            let keep_name = keep.name.as_str();
            let revision = keep.revision.as_deref();
            let updated = retry(ctx, "catalog.tags.patch", move || {
                service.update_tag(ctx, keep_name, revision, tag)
            })
            .await;
            match updated {
                Ok(stored) => {
                    tracing::debug!(entry, tag = %stored.name, "updated tag");
                    return Ok(stored);
                }
                Err(CatalogError::Conflict(_) | CatalogError::NotFound(_)) => {
                    let delay = ctx.retry().delay_for(attempt, None);
                    tracing::warn!(
                        entry,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "tag changed concurrently, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(CatalogError::PublishConflict {
            entry: entry.to_string(),
            attempts,
        })
    }

    /// Publish a mapped tag: template first, then entry, then the tag.
    ///
    /// # Errors
    ///
    /// See [`ensure_template`](Self::ensure_template),
    /// [`ensure_entry`](Self::ensure_entry) and
    /// [`upsert_tag`](Self::upsert_tag).
    pub async fn publish(
        &self,
        ctx: &RunContext,
        handle: &TableHandle,
        mapped: &MappedTag,
    ) -> Result<PublishedTag, CatalogError> {
        let template = self.ensure_template(ctx, &mapped.schema).await?;
        let entry = self.ensure_entry(ctx, handle).await?;
        let tag = self.upsert_tag(ctx, &entry, &mapped.tag).await?;
        Ok(PublishedTag {
            tag,
            template_version: template.version,
        })
    }

    async fn fetch_template(&self, ctx: &RunContext) -> Result<Option<TagTemplateSchema>, CatalogError> {
        let service = &self.service;
        let template_id = self.template_id.as_str();
        retry(ctx, "catalog.tagTemplates.get", move || {
            service.get_template(ctx, template_id)
        })
        .await
    }

    async fn load_or_create_template(&self, ctx: &RunContext) -> Result<TagTemplateSchema, CatalogError> {
        if let Some(schema) = self.fetch_template(ctx).await? {
            return Ok(schema);
        }
        let base = TagTemplateSchema::base(&self.template_id, &self.display_name);
        let service = &self.service;
        let base_ref = &base;
        match retry(ctx, "catalog.tagTemplates.create", move || {
            service.create_template(ctx, base_ref)
        })
        .await
        {
            Ok(()) => {
                tracing::info!(template = %self.template_id, "created tag template");
                Ok(base)
            }
            Err(CatalogError::AlreadyExists(_)) => self
                .fetch_template(ctx)
                .await?
                .ok_or_else(|| CatalogError::NotFound(format!("template {}", self.template_id))),
            Err(e) => Err(e),
        }
    }

    fn entry_lock(&self, entry: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .entry_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(entry.to_string()).or_default())
    }
}

async fn retry<T, F, Fut>(ctx: &RunContext, operation: &'static str, call: F) -> Result<T, CatalogError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CatalogError>>,
{
    with_retry(ctx.retry(), operation, call)
        .await
        .map_err(CatalogError::from)
}
