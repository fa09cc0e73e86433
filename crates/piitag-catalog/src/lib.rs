//! # piitag-catalog
//!
//! Turns aggregated findings into catalog tags and publishes them.
//!
//! - [`map`] builds the [`CatalogTag`] for a table and, when the template
//!   lacks fields for it, the migrated [`TagTemplateSchema`].
//! - [`CatalogPublisher`] applies template migrations, ensures the table's
//!   entry exists, and upserts exactly one tag per entry and template.
//! - [`CatalogService`] is the service boundary, implemented by
//!   [`DataCatalogClient`] (Data Catalog v1 REST) and [`InMemoryCatalog`].

mod error;
mod mapper;
mod memory;
mod publisher;
pub mod rest;
pub mod schema;
mod service;

pub use error::CatalogError;
pub use mapper::{CatalogTag, MappedTag, TableSummary, TagValue, field_base, map};
pub use memory::{Fault, InMemoryCatalog};
pub use publisher::{CatalogPublisher, PublishedTag};
pub use rest::DataCatalogClient;
pub use schema::{FieldType, TagTemplateSchema};
pub use service::{CatalogService, StoredTag};
