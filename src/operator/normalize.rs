use nalgebra::DMatrix;
use ndarray::Array1;
use thiserror::Error;

use crate::operator::adjacency::CooAdjacency;
use crate::operator::matrix::PropagationOperator;

#[derive(Debug, Error)]
pub enum OperatorError {
    #[error("invalid graph: {0}")]
    InvalidGraph(String),
    #[error("numerical failure: {0}")]
    Numerical(String),
}

/// Builds the symmetrically normalized propagation operator
/// `Â = D^{-1/2} (A + I) D^{-1/2}` used by spectral graph convolution.
pub struct AdjacencyNormalizer;

impl AdjacencyNormalizer {
    /// Normalize a sparse adjacency. Pure: the caller's matrix is untouched.
    ///
    /// Self-loops of weight 1.0 are added to every diagonal entry before the
    /// row-sum degrees are computed, so every degree is at least 1 for valid
    /// non-negative input. Entries must be finite and non-negative.
    pub fn normalize(adjacency: &CooAdjacency) -> Result<PropagationOperator, OperatorError> {
        let dim = adjacency.dim();
        if dim == 0 {
            return Err(OperatorError::InvalidGraph(
                "adjacency must have at least one node".to_string(),
            ));
        }

        for &(row, col, weight) in adjacency.entries() {
            if row >= dim || col >= dim {
                return Err(OperatorError::InvalidGraph(format!(
                    "entry ({row}, {col}) outside {dim}x{dim} adjacency"
                )));
            }
            if !weight.is_finite() {
                return Err(OperatorError::InvalidGraph(format!(
                    "non-finite weight {weight} at ({row}, {col})"
                )));
            }
            if weight < 0.0 {
                return Err(OperatorError::InvalidGraph(format!(
                    "negative weight {weight} at ({row}, {col})"
                )));
            }
        }

        // A' = A + I, accumulating duplicate triplets per row.
        let mut rows: Vec<Vec<(usize, f64)>> = vec![Vec::new(); dim];
        for &(row, col, weight) in adjacency.entries() {
            rows[row].push((col, weight));
        }
        for (row, entries) in rows.iter_mut().enumerate() {
            entries.push((row, 1.0));
            entries.sort_unstable_by_key(|(col, _)| *col);
            entries.dedup_by(|(col_b, w_b), (col_a, w_a)| {
                if col_a == col_b {
                    *w_a += *w_b;
                    true
                } else {
                    false
                }
            });
        }

        let degrees: Vec<f64> = rows
            .iter()
            .map(|entries| entries.iter().map(|(_, weight)| weight).sum())
            .collect();

        // Unreachable for valid input because of the self-loop, checked so a
        // malformed degree surfaces as an error instead of NaN.
        let mut scale: Array1<f64> = Array1::zeros(dim);
        for (node, &degree) in degrees.iter().enumerate() {
            if degree <= 0.0 {
                return Err(OperatorError::Numerical(format!(
                    "non-positive degree {degree} at node {node}"
                )));
            }
            scale[node] = 1.0 / degree.sqrt();
        }

        let nnz: usize = rows.iter().map(Vec::len).sum();
        let mut row_offsets = Vec::with_capacity(dim + 1);
        let mut col_indices = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);
        row_offsets.push(0);
        for (row, entries) in rows.into_iter().enumerate() {
            for (col, weight) in entries {
                col_indices.push(col);
                values.push(scale[row] * weight * scale[col]);
            }
            row_offsets.push(col_indices.len());
        }

        Ok(PropagationOperator::from_csr(
            dim,
            row_offsets,
            col_indices,
            values,
        ))
    }

    /// Dense convenience wrapper; rejects non-square input.
    pub fn normalize_dense(matrix: &DMatrix<f64>) -> Result<PropagationOperator, OperatorError> {
        let adjacency = CooAdjacency::from_dense(matrix)?;
        Self::normalize(&adjacency)
    }
}
