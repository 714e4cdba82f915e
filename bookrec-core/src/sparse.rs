//! Compressed sparse row storage for the document-term matrix.

use ndarray::Array1;
use serde::{Serialize, Deserialize};

/// A sparse vector over the vocabulary: sorted column indices with their weights.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

/// Borrowed view of one matrix row.
#[derive(Debug, Clone, Copy)]
pub struct SparseRow<'a> {
    pub indices: &'a [u32],
    pub values: &'a [f32],
}

impl SparseRow<'_> {
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn norm(&self) -> f32 {
        self.values.iter().map(|v| v * v).sum::<f32>().sqrt()
    }
}

impl SparseVector {
    pub fn as_row(&self) -> SparseRow<'_> {
        SparseRow { indices: &self.indices, values: &self.values }
    }
}

/// Row-major sparse matrix (CSR). Row `i` occupies `indptr[i]..indptr[i + 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsrMatrix {
    n_cols: usize,
    indptr: Vec<usize>,
    indices: Vec<u32>,
    data: Vec<f32>,
}

impl CsrMatrix {
    /// An empty matrix with `n_cols` columns and no rows.
    pub fn new(n_cols: usize) -> Self {
        CsrMatrix { n_cols, indptr: vec![0], indices: Vec::new(), data: Vec::new() }
    }

    /// Appends a row. Column indices must be strictly increasing and below `n_cols`.
    pub fn push_row(&mut self, row: SparseVector) {
        debug_assert_eq!(row.indices.len(), row.values.len());
        debug_assert!(row.indices.windows(2).all(|w| w[0] < w[1]));
        self.indices.extend(row.indices);
        self.data.extend(row.values);
        self.indptr.push(self.indices.len());
    }

    pub fn n_rows(&self) -> usize {
        self.indptr.len() - 1
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    pub fn row(&self, i: usize) -> SparseRow<'_> {
        let (start, end) = (self.indptr[i], self.indptr[i + 1]);
        SparseRow { indices: &self.indices[start..end], values: &self.data[start..end] }
    }

    pub fn rows(&self) -> impl Iterator<Item = SparseRow<'_>> + '_ {
        (0..self.n_rows()).map(move |i| self.row(i))
    }

    /// Elementwise arithmetic mean of the given rows, as a dense vector.
    /// Returns a zero vector when `rows` is empty.
    pub fn mean_of_rows(&self, rows: &[usize]) -> Array1<f32> {
        let mut sum = Array1::<f32>::zeros(self.n_cols);
        if rows.is_empty() {
            return sum;
        }
        for &r in rows {
            let row = self.row(r);
            for (&col, &v) in row.indices.iter().zip(row.values) {
                sum[col as usize] += v;
            }
        }
        sum / rows.len() as f32
    }

    /// Checks the structural invariants; returns a description of the first violation.
    pub(crate) fn check_structure(&self) -> Result<(), String> {
        if self.indptr.first() != Some(&0) {
            return Err("indptr must start at 0".to_string());
        }
        if self.indptr.windows(2).any(|w| w[0] > w[1]) {
            return Err("indptr is not monotonic".to_string());
        }
        if self.indptr.last() != Some(&self.indices.len()) || self.indices.len() != self.data.len() {
            return Err(format!(
                "indptr end {:?} disagrees with {} indices / {} values",
                self.indptr.last(), self.indices.len(), self.data.len()
            ));
        }
        for i in 0..self.n_rows() {
            let row = self.row(i);
            if row.indices.windows(2).any(|w| w[0] >= w[1]) {
                return Err(format!("row {} has unsorted column indices", i));
            }
            if row.indices.last().map_or(false, |&c| c as usize >= self.n_cols) {
                return Err(format!("row {} has a column index out of range", i));
            }
            if row.values.iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(format!("row {} has a negative or non-finite weight", i));
            }
        }
        Ok(())
    }
}
