//! Fold raw findings into one record per `(field_path, info_type)`.
//!
//! Grouping uses the full field path, so `customer` and `customer.phone`
//! never merge. Output is sorted by key, which makes it independent of the
//! order findings arrived in.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use piitag_core::entities::{AggregatedFinding, FieldPath, Finding};
use piitag_core::enums::Likelihood;

/// Group `findings` by `(field_path, info_type)`, keeping the highest
/// likelihood and the summed count of each group.
#[must_use]
pub fn aggregate<I>(findings: I) -> Vec<AggregatedFinding>
where
    I: IntoIterator<Item = Finding>,
{
    let mut groups: BTreeMap<(FieldPath, String), (Likelihood, u64)> = BTreeMap::new();
    for finding in findings {
        groups
            .entry((finding.field_path, finding.info_type))
            .and_modify(|(max, total)| {
                *max = (*max).max(finding.likelihood);
                *total = total.saturating_add(finding.count);
            })
            .or_insert((finding.likelihood, finding.count));
    }
    groups
        .into_iter()
        .map(|((field_path, info_type), (max_likelihood, total_count))| AggregatedFinding {
            field_path,
            info_type,
            max_likelihood,
            total_count,
        })
        .collect()
}

/// The info type with the highest likelihood across the table. Ties go to
/// the larger count, then to the alphabetically first name.
#[must_use]
pub fn top_info_type(aggregated: &[AggregatedFinding]) -> Option<&str> {
    aggregated
        .iter()
        .max_by(|a, b| {
            a.max_likelihood
                .cmp(&b.max_likelihood)
                .then(a.total_count.cmp(&b.total_count))
                .then_with(|| match b.info_type.cmp(&a.info_type) {
                    Ordering::Equal => b.field_path.cmp(&a.field_path),
                    other => other,
                })
        })
        .map(|f| f.info_type.as_str())
}
