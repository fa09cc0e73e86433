//! Split sampled rows into inspection requests.
//!
//! Batches are cut by cumulative encoded size and by cell count, in row
//! order, so the same rows always produce the same batches.

use crate::error::InspectionError;
use crate::rest::row_bytes;

#[derive(Debug, Clone, Copy)]
pub struct BatchLimits {
    /// Request budget in encoded bytes, including `overhead`.
    pub max_bytes: usize,
    pub max_cells: usize,
    /// Encoded size of a request with no rows.
    pub overhead: usize,
    /// Cells per row.
    pub width: usize,
}

impl BatchLimits {
    fn max_rows(&self) -> usize {
        (self.max_cells / self.width.max(1)).max(1)
    }
}

/// Group `rows` into batches that each fit `limits`.
///
/// # Errors
///
/// Returns [`InspectionError::RowTooLarge`] when one row alone exceeds the
/// byte budget.
pub fn plan_batches(
    rows: Vec<Vec<String>>,
    limits: BatchLimits,
) -> Result<Vec<Vec<Vec<String>>>, InspectionError> {
    let max_rows = limits.max_rows();
    let mut batches = Vec::new();
    let mut current: Vec<Vec<String>> = Vec::new();
    let mut current_bytes = limits.overhead;

    for (index, row) in rows.into_iter().enumerate() {
        let bytes = row_bytes(&row);
        if limits.overhead + bytes > limits.max_bytes {
            return Err(InspectionError::RowTooLarge {
                row: index,
                bytes: limits.overhead + bytes,
                limit: limits.max_bytes,
            });
        }
        if !current.is_empty()
            && (current_bytes + bytes > limits.max_bytes || current.len() >= max_rows)
        {
            batches.push(std::mem::take(&mut current));
            current_bytes = limits.overhead;
        }
        current_bytes += bytes;
        current.push(row);
    }
    if !current.is_empty() {
        batches.push(current);
    }
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(n: usize, cell: &str, width: usize) -> Vec<Vec<String>> {
        vec![vec![cell.to_string(); width]; n]
    }

    fn limits(max_bytes: usize, max_cells: usize, width: usize) -> BatchLimits {
        BatchLimits {
            max_bytes,
            max_cells,
            overhead: 100,
            width,
        }
    }

    #[test]
    fn everything_fits_in_one_batch() {
        let batches = plan_batches(rows(10, "x", 2), limits(100_000, 1000, 2)).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 10);
    }

    #[test]
    fn byte_budget_splits_rows() {
        let one = row_bytes(&rows(1, "0123456789", 1)[0]);
        let budget = 100 + one * 3;
        let batches = plan_batches(rows(7, "0123456789", 1), limits(budget, 1000, 1)).unwrap();
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        for batch in &batches {
            let bytes: usize = 100 + batch.iter().map(|r| row_bytes(r)).sum::<usize>();
            assert!(bytes <= budget);
        }
    }

    #[test]
    fn cell_budget_splits_rows() {
        let batches = plan_batches(rows(5, "x", 4), limits(100_000, 8, 4)).unwrap();
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn oversized_row_is_an_error() {
        let big = "x".repeat(500);
        let err = plan_batches(rows(2, &big, 1), limits(300, 1000, 1)).unwrap_err();
        assert!(matches!(err, InspectionError::RowTooLarge { row: 0, .. }));
    }

    #[test]
    fn rows_keep_their_order() {
        let input: Vec<Vec<String>> = (0..6).map(|i| vec![i.to_string()]).collect();
        let batches = plan_batches(input.clone(), limits(100_000, 2, 1)).unwrap();
        let flattened: Vec<Vec<String>> = batches.into_iter().flatten().collect();
        assert_eq!(flattened, input);
    }

    #[test]
    fn no_rows_no_batches() {
        assert!(plan_batches(Vec::new(), limits(1000, 10, 1)).unwrap().is_empty());
    }
}
