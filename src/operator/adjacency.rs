use nalgebra::DMatrix;
use petgraph::visit::EdgeRef;

use crate::graph::model::GraphInstance;
use crate::operator::normalize::OperatorError;

/// Raw adjacency in triplet form. Entry `(row, col, weight)` encodes the edge
/// col -> row, so row sums are in-degrees. Duplicate triplets are legal and
/// accumulate during normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct CooAdjacency {
    dim: usize,
    entries: Vec<(usize, usize, f64)>,
}

impl CooAdjacency {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, row: usize, col: usize, weight: f64) {
        self.entries.push((row, col, weight));
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(usize, usize, f64)] {
        &self.entries
    }

    /// Collect the adjacency of a loaded graph. Undirected graphs already
    /// carry both edge directions, so every stored edge maps to one triplet.
    /// Missing edge weights default to 1.0.
    pub fn from_graph(graph: &GraphInstance) -> Self {
        let mut adjacency = Self::new(graph.node_count());
        for edge in graph.graph.edge_references() {
            let weight = edge.weight().weight.unwrap_or(1.0);
            adjacency.push(edge.target().index(), edge.source().index(), weight);
        }
        adjacency
    }

    /// Convert a dense matrix, keeping only its non-zero entries. This is the
    /// entry point where a non-square input can be observed.
    pub fn from_dense(matrix: &DMatrix<f64>) -> Result<Self, OperatorError> {
        if matrix.nrows() != matrix.ncols() {
            return Err(OperatorError::InvalidGraph(format!(
                "adjacency must be square, got {}x{}",
                matrix.nrows(),
                matrix.ncols()
            )));
        }
        let mut adjacency = Self::new(matrix.nrows());
        for i in 0..matrix.nrows() {
            for j in 0..matrix.ncols() {
                let value = matrix[(i, j)];
                // NaN compares unequal to zero and is kept so validation can
                // reject it.
                if value != 0.0 {
                    adjacency.push(i, j, value);
                }
            }
        }
        Ok(adjacency)
    }
}
