use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Normalized propagation operator in compressed sparse row form.
///
/// Produced once per graph by [`crate::operator::AdjacencyNormalizer`] and
/// treated as a read-only constant afterwards. Column indices within each row
/// are sorted, which `get` relies on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagationOperator {
    dim: usize,
    row_offsets: Vec<usize>,
    col_indices: Vec<usize>,
    values: Vec<f64>,
}

impl PropagationOperator {
    pub(crate) fn from_csr(
        dim: usize,
        row_offsets: Vec<usize>,
        col_indices: Vec<usize>,
        values: Vec<f64>,
    ) -> Self {
        debug_assert_eq!(row_offsets.len(), dim + 1);
        debug_assert_eq!(col_indices.len(), values.len());
        Self {
            dim,
            row_offsets,
            col_indices,
            values,
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Entry at `(row, col)`, zero when outside the sparse support.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        if row >= self.dim || col >= self.dim {
            return 0.0;
        }
        let range = self.row_offsets[row]..self.row_offsets[row + 1];
        let cols = &self.col_indices[range.clone()];
        match cols.binary_search(&col) {
            Ok(pos) => self.values[range.start + pos],
            Err(_) => 0.0,
        }
    }

    /// Iterate the non-zero entries as `(row, col, value)` triplets.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.dim).flat_map(move |row| {
            let range = self.row_offsets[row]..self.row_offsets[row + 1];
            range.map(move |k| (row, self.col_indices[k], self.values[k]))
        })
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.dim, self.dim);
        for (row, col, value) in self.iter() {
            dense[(row, col)] = value;
        }
        dense
    }

    /// Sparse-dense product `self * rhs`, parallelized over operator rows.
    /// `rhs` must have `dim` rows; callers validate shapes before composing.
    pub fn matmul(&self, rhs: &DMatrix<f64>) -> DMatrix<f64> {
        debug_assert_eq!(rhs.nrows(), self.dim);
        let cols = rhs.ncols();
        let flat: Vec<f64> = (0..self.dim)
            .into_par_iter()
            .flat_map_iter(|row| {
                let mut acc = vec![0.0f64; cols];
                for k in self.row_offsets[row]..self.row_offsets[row + 1] {
                    let col = self.col_indices[k];
                    let value = self.values[k];
                    for (slot, c) in acc.iter_mut().zip(0..cols) {
                        *slot += value * rhs[(col, c)];
                    }
                }
                acc
            })
            .collect();
        DMatrix::from_row_slice(self.dim, cols, &flat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_operator() -> PropagationOperator {
        // [[0.5, 0.5], [0.5, 0.5]]
        PropagationOperator::from_csr(2, vec![0, 2, 4], vec![0, 1, 0, 1], vec![0.5; 4])
    }

    #[test]
    fn get_reads_inside_and_outside_support() {
        let operator = PropagationOperator::from_csr(2, vec![0, 1, 2], vec![0, 1], vec![1.0, 1.0]);
        assert_eq!(operator.get(0, 0), 1.0);
        assert_eq!(operator.get(0, 1), 0.0);
        assert_eq!(operator.get(5, 0), 0.0);
    }

    #[test]
    fn matmul_matches_dense_product() {
        let operator = small_operator();
        let features = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let sparse = operator.matmul(&features);
        let dense = operator.to_dense() * &features;
        assert!((&sparse - &dense).amax() < 1e-12);
    }

    #[test]
    fn serde_round_trip_preserves_structure() {
        let operator = small_operator();
        let json = serde_json::to_string(&operator).expect("serialize");
        let restored: PropagationOperator = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(operator, restored);
    }
}
