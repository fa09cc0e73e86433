pub mod scan;
pub mod schema;
