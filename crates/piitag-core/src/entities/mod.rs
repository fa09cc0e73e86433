//! Entity structs for the piitag data model.
//!
//! All structs derive `Serialize`, `Deserialize`, and `JsonSchema` so they can
//! appear in the run report and be validated against its schema.

mod field_path;
mod finding;
mod schema;
mod table;

pub use field_path::{FieldPath, MAX_FIELD_DEPTH};
pub use finding::{AggregatedFinding, Finding};
pub use schema::{ColumnSchema, SampledRow, TableSchema};
pub use table::{DatasetScope, TableHandle};
