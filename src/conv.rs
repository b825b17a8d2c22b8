use anyhow::{bail, Result};
use nalgebra::{DMatrix, DVector};

use crate::operator::PropagationOperator;

/// Affine projection `X * W + b` applied row-wise to a feature matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearProjection {
    weights: DMatrix<f64>,
    bias: DVector<f64>,
}

impl LinearProjection {
    pub fn new(weights: DMatrix<f64>, bias: DVector<f64>) -> Result<Self> {
        if weights.ncols() != bias.len() {
            bail!(
                "bias length {} does not match output width {}",
                bias.len(),
                weights.ncols()
            );
        }
        Ok(Self { weights, bias })
    }

    pub fn input_dim(&self) -> usize {
        self.weights.nrows()
    }

    pub fn output_dim(&self) -> usize {
        self.weights.ncols()
    }

    pub fn weights(&self) -> &DMatrix<f64> {
        &self.weights
    }

    pub fn bias(&self) -> &DVector<f64> {
        &self.bias
    }

    fn project(&self, features: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        if features.ncols() != self.input_dim() {
            bail!(
                "feature width {} does not match projection input {}",
                features.ncols(),
                self.input_dim()
            );
        }
        Ok(features * &self.weights)
    }

    fn add_bias(&self, output: &mut DMatrix<f64>) {
        for i in 0..output.nrows() {
            for j in 0..output.ncols() {
                output[(i, j)] += self.bias[j];
            }
        }
    }
}

/// One graph convolution: given a propagation operator and node features,
/// produce aggregated output features `Â * (X * W) + b`. The bias is added
/// after aggregation so the operator's row sums do not rescale it.
pub trait GraphConvolution: Send + Sync {
    fn forward(
        &self,
        operator: &PropagationOperator,
        features: &DMatrix<f64>,
    ) -> Result<DMatrix<f64>>;

    fn projection(&self) -> &LinearProjection;

    fn input_dim(&self) -> usize {
        self.projection().input_dim()
    }

    fn output_dim(&self) -> usize {
        self.projection().output_dim()
    }
}

fn check_operator(operator: &PropagationOperator, features: &DMatrix<f64>) -> Result<()> {
    if operator.dim() != features.nrows() {
        bail!(
            "operator dimension {} does not match node count {}",
            operator.dim(),
            features.nrows()
        );
    }
    Ok(())
}

/// Convolution backed by the sparse CSR product.
#[derive(Debug, Clone)]
pub struct SparseConvolution {
    projection: LinearProjection,
}

impl SparseConvolution {
    pub fn new(projection: LinearProjection) -> Self {
        Self { projection }
    }
}

impl GraphConvolution for SparseConvolution {
    fn forward(
        &self,
        operator: &PropagationOperator,
        features: &DMatrix<f64>,
    ) -> Result<DMatrix<f64>> {
        check_operator(operator, features)?;
        let projected = self.projection.project(features)?;
        let mut aggregated = operator.matmul(&projected);
        self.projection.add_bias(&mut aggregated);
        Ok(aggregated)
    }

    fn projection(&self) -> &LinearProjection {
        &self.projection
    }
}

/// Convolution that materializes the dense operator and multiplies densely.
/// Interchangeable with [`SparseConvolution`] up to floating-point rounding.
#[derive(Debug, Clone)]
pub struct DenseConvolution {
    projection: LinearProjection,
}

impl DenseConvolution {
    pub fn new(projection: LinearProjection) -> Self {
        Self { projection }
    }
}

impl GraphConvolution for DenseConvolution {
    fn forward(
        &self,
        operator: &PropagationOperator,
        features: &DMatrix<f64>,
    ) -> Result<DMatrix<f64>> {
        check_operator(operator, features)?;
        let projected = self.projection.project(features)?;
        let mut aggregated = operator.to_dense() * projected;
        self.projection.add_bias(&mut aggregated);
        Ok(aggregated)
    }

    fn projection(&self) -> &LinearProjection {
        &self.projection
    }
}
