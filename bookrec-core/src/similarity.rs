//! Cosine similarity between a dense profile vector and sparse document rows.

use ndarray::ArrayView1;
use crate::error::{RecError, RecResult};
use crate::sparse::SparseRow;

/// Calculates the cosine similarity between a dense vector and a sparse row.
///
/// # Arguments
/// * `dense` - A dense vector over the full vocabulary (e.g. a user profile).
/// * `row` - A sparse row whose column indices address `dense`.
///
/// # Returns
/// The similarity in `[-1, 1]` (in `[0, 1]` for the non-negative TF-IDF space).
/// A zero vector on either side yields `0.0`.
/// Returns `RecError::DimensionMismatch` if the row addresses a column outside `dense`.
pub fn cosine_similarity(dense: ArrayView1<f32>, row: SparseRow<'_>) -> RecResult<f32> {
    cosine_with_norm(dense, dense_norm(dense), row)
}

/// Similarity of `dense` against every row, in row order.
///
/// The norm of `dense` is computed once, so the cost is `O(len(dense) + nnz)`.
pub fn cosine_similarities<'a>(
    dense: ArrayView1<f32>,
    rows: impl Iterator<Item = SparseRow<'a>>,
) -> RecResult<Vec<f32>> {
    let norm_dense = dense_norm(dense);
    rows.map(|row| cosine_with_norm(dense, norm_dense, row)).collect()
}

fn dense_norm(dense: ArrayView1<f32>) -> f32 {
    dense.dot(&dense).sqrt()
}

fn cosine_with_norm(dense: ArrayView1<f32>, norm_dense: f32, row: SparseRow<'_>) -> RecResult<f32> {
    if let Some(&max_col) = row.indices.last() {
        if max_col as usize >= dense.len() {
            return Err(RecError::DimensionMismatch {
                expected: dense.len(),
                actual: max_col as usize + 1,
            });
        }
    }

    let dot_product: f32 = row
        .indices
        .iter()
        .zip(row.values)
        .map(|(&col, &v)| dense[col as usize] * v)
        .sum();
    let norm_row = row.norm();

    if norm_dense == 0.0 || norm_row == 0.0 {
        // Cosine is undefined for zero vectors; treat as no similarity
        Ok(0.0)
    } else {
        // Clamp to absorb floating point drift just outside [-1, 1]
        Ok((dot_product / (norm_dense * norm_row)).clamp(-1.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::SparseVector;
    use ndarray::arr1;

    fn sv(indices: Vec<u32>, values: Vec<f32>) -> SparseVector {
        SparseVector { indices, values }
    }

    #[test]
    fn test_cosine_similarity() {
        let dense = arr1(&[1.0, 2.0, 3.0]);
        let same = sv(vec![0, 1, 2], vec![1.0, 2.0, 3.0]);
        let scaled = sv(vec![0, 1, 2], vec![2.0, 4.0, 6.0]);
        let orthogonal = sv(vec![0, 1], vec![2.0, -1.0]);
        let empty = SparseVector::default();

        assert!((cosine_similarity(dense.view(), same.as_row()).unwrap() - 1.0).abs() < 1e-6);
        assert!((cosine_similarity(dense.view(), scaled.as_row()).unwrap() - 1.0).abs() < 1e-6); // Parallel vectors
        assert!(cosine_similarity(dense.view(), orthogonal.as_row()).unwrap().abs() < 1e-6);
        assert_eq!(cosine_similarity(dense.view(), empty.as_row()).unwrap(), 0.0); // Zero row
    }

    #[test]
    fn test_zero_dense_vector() {
        let zero = arr1(&[0.0, 0.0]);
        let row = sv(vec![1], vec![1.0]);
        assert_eq!(cosine_similarity(zero.view(), row.as_row()).unwrap(), 0.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let dense = arr1(&[1.0, 2.0]);
        let row = sv(vec![0, 2], vec![1.0, 1.0]);
        assert!(matches!(
            cosine_similarity(dense.view(), row.as_row()),
            Err(RecError::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_similarities_in_row_order() {
        let dense = arr1(&[1.0, 0.0]);
        let rows = [sv(vec![0], vec![1.0]), sv(vec![1], vec![1.0])];
        let sims = cosine_similarities(dense.view(), rows.iter().map(|r| r.as_row())).unwrap();
        assert_eq!(sims.len(), 2);
        assert!((sims[0] - 1.0).abs() < 1e-6);
        assert_eq!(sims[1], 0.0);
    }

    #[test]
    fn test_batch_matches_single_row_similarity() {
        let dense = arr1(&[0.5, 0.0, 2.0, 1.0]);
        let rows = [
            sv(vec![0, 2], vec![1.0, 1.0]),
            sv(vec![1], vec![3.0]),
            sv(vec![0, 1, 3], vec![0.2, 0.4, 0.8]),
            SparseVector::default(),
        ];
        let batch = cosine_similarities(dense.view(), rows.iter().map(|r| r.as_row())).unwrap();
        for (row, sim) in rows.iter().zip(&batch) {
            assert_eq!(*sim, cosine_similarity(dense.view(), row.as_row()).unwrap());
        }
    }

    #[test]
    fn test_batch_reports_dimension_mismatch() {
        let dense = arr1(&[1.0]);
        let rows = [sv(vec![0], vec![1.0]), sv(vec![4], vec![1.0])];
        assert!(matches!(
            cosine_similarities(dense.view(), rows.iter().map(|r| r.as_row())),
            Err(RecError::DimensionMismatch { expected: 1, actual: 5 })
        ));
    }
}
