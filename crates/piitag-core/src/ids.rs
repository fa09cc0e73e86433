//! Deterministic catalog identifiers.
//!
//! Data Catalog ids accept `[a-z0-9_]`, must start with a letter or
//! underscore, and are capped at 64 characters. Ids derived here are stable
//! across runs so re-running a scan addresses the same entry and fields.

use sha2::{Digest, Sha256};

use crate::entities::TableHandle;

/// Maximum length of a Data Catalog entry, template, or field id.
pub const MAX_CATALOG_ID_LEN: usize = 64;

const HASH_SUFFIX_LEN: usize = 16;

/// Normalize `raw` into a catalog id no longer than `max_len`.
///
/// Characters outside `[a-z0-9_]` become `_`, upper case is folded, and a
/// leading digit gets a `_` prefix. Ids that would exceed `max_len` keep a
/// prefix and end with a hash of the full normalized name.
#[must_use]
pub fn catalog_id(raw: &str, max_len: usize) -> String {
    let id = normalize(raw);
    if id.len() <= max_len {
        return id;
    }
    let hash = short_hash(id.as_bytes());
    format!("{}_{hash}", truncate(&id, max_len.saturating_sub(HASH_SUFFIX_LEN + 1)))
}

/// Entry id for a table:
/// `<source>_<project>_<dataset|instance>[_<database>]_<table>_<hash>`.
///
/// The readable prefix is normalized and may be shared by distinct tables
/// (`Orders` and `orders`, `crm-1` and `crm_1`). The hash is taken over the
/// raw, length-prefixed handle parts, so it differs whenever any part does.
#[must_use]
pub fn entry_id(handle: &TableHandle) -> String {
    let mut parts = vec![
        handle.source_kind().as_str(),
        handle.project(),
        handle.dataset_or_instance(),
    ];
    if let Some(database) = handle.database() {
        parts.push(database);
    }
    parts.push(handle.table_name());

    let mut key = Vec::new();
    for part in &parts {
        key.extend_from_slice(part.len().to_string().as_bytes());
        key.push(b':');
        key.extend_from_slice(part.as_bytes());
    }

    let readable = normalize(&parts.join("_"));
    let keep = MAX_CATALOG_ID_LEN - HASH_SUFFIX_LEN - 1;
    format!("{}_{}", truncate(&readable, keep), short_hash(&key))
}

fn normalize(raw: &str) -> String {
    let mut id: String = raw
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if id.is_empty() || id.starts_with(|c: char| c.is_ascii_digit()) {
        id.insert(0, '_');
    }
    id
}

/// Normalized ids are ASCII, so byte slicing is safe.
fn truncate(id: &str, max_len: usize) -> &str {
    &id[..id.len().min(max_len)]
}

fn short_hash(input: &[u8]) -> String {
    let digest = Sha256::digest(input);
    digest
        .iter()
        .take(HASH_SUFFIX_LEN / 2)
        .map(|b| format!("{b:02x}"))
        .collect()
}
