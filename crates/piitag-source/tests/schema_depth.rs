//! Nested schemas keep depth-1 and depth-2 fields and drop anything deeper.

use piitag_core::entities::MAX_FIELD_DEPTH;
use piitag_source::{SourceField, flatten_schema};

fn nest(depth: usize) -> SourceField {
    let mut field = SourceField::scalar(format!("leaf{depth}"), "STRING");
    for level in (1..depth).rev() {
        field = SourceField::record(format!("level{level}"), vec![field]);
    }
    field
}

#[test]
fn depth_limit_holds_for_every_nesting_level() {
    for depth in 1..=5 {
        let schema = flatten_schema("t", &[nest(depth)]);
        if depth <= MAX_FIELD_DEPTH {
            assert_eq!(schema.columns.len(), 1, "depth {depth} should be kept");
            assert_eq!(schema.columns[0].path.depth(), depth);
        } else {
            assert!(schema.is_empty(), "depth {depth} should be dropped");
        }
    }
}

#[test]
fn siblings_survive_a_dropped_branch() {
    let schema = flatten_schema(
        "orders",
        &[
            SourceField::scalar("email", "STRING"),
            nest(3),
            SourceField::record("customer", vec![SourceField::scalar("phone", "STRING")]),
        ],
    );
    assert_eq!(schema.headers(), vec!["email", "customer.phone"]);
}
