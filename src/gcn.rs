use std::path::Path;

use anyhow::{Context, Result};
use nalgebra::{DMatrix, DVector};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::checkpoint::{LayerWeights, ModelCheckpoint};
use crate::conv::{DenseConvolution, GraphConvolution, LinearProjection, SparseConvolution};
use crate::operator::PropagationOperator;

/// Which convolution implementation the model is assembled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvKind {
    Sparse,
    Dense,
}

/// Two-layer graph convolutional network: `layer2(Â, relu(layer1(Â, X)))`.
///
/// Weights are fixed at construction; the model is read-only afterwards and
/// safe to share behind an `Arc` across concurrent callers.
pub struct GcnModel {
    layer1: Box<dyn GraphConvolution>,
    layer2: Box<dyn GraphConvolution>,
    kind: ConvKind,
}

impl GcnModel {
    pub fn from_checkpoint(checkpoint: &ModelCheckpoint, kind: ConvKind) -> Result<Self> {
        let layer1 = checkpoint
            .layer1
            .to_projection()
            .context("restore layer1 weights")?;
        let layer2 = checkpoint
            .layer2
            .to_projection()
            .context("restore layer2 weights")?;
        Ok(Self {
            layer1: make_layer(kind, layer1),
            layer2: make_layer(kind, layer2),
            kind,
        })
    }

    /// Load a checkpoint from disk exactly once; callers keep the resulting
    /// model for the lifetime of the process instead of reloading per request.
    pub fn from_checkpoint_path(path: &Path, kind: ConvKind) -> Result<Self> {
        let checkpoint = ModelCheckpoint::read_from_path(path)
            .with_context(|| format!("load model checkpoint {:?}", path))?;
        Self::from_checkpoint(&checkpoint, kind)
    }

    /// Untrained model with Glorot-uniform weights from a seeded generator.
    pub fn random(
        in_dim: usize,
        hidden_dim: usize,
        out_dim: usize,
        kind: ConvKind,
        seed: u64,
    ) -> Result<Self> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let layer1 = random_projection(in_dim, hidden_dim, &mut rng)?;
        let layer2 = random_projection(hidden_dim, out_dim, &mut rng)?;
        Ok(Self {
            layer1: make_layer(kind, layer1),
            layer2: make_layer(kind, layer2),
            kind,
        })
    }

    pub fn kind(&self) -> ConvKind {
        self.kind
    }

    pub fn input_dim(&self) -> usize {
        self.layer1.input_dim()
    }

    pub fn hidden_dim(&self) -> usize {
        self.layer1.output_dim()
    }

    pub fn output_dim(&self) -> usize {
        self.layer2.output_dim()
    }

    pub fn to_checkpoint(&self) -> ModelCheckpoint {
        ModelCheckpoint::new(
            LayerWeights::from_projection(self.layer1.projection()),
            LayerWeights::from_projection(self.layer2.projection()),
        )
    }

    /// Forward pass producing one logit row per node.
    pub fn forward(
        &self,
        operator: &PropagationOperator,
        features: &DMatrix<f64>,
    ) -> Result<DMatrix<f64>> {
        let hidden = self
            .layer1
            .forward(operator, features)
            .context("first convolution layer")?;
        let activated = hidden.map(|v| v.max(0.0));
        self.layer2
            .forward(operator, &activated)
            .context("second convolution layer")
    }

    /// Predicted class index per node (argmax over logits).
    pub fn predict(
        &self,
        operator: &PropagationOperator,
        features: &DMatrix<f64>,
    ) -> Result<Vec<usize>> {
        let logits = self.forward(operator, features)?;
        Ok(argmax_rows(&logits))
    }
}

fn make_layer(kind: ConvKind, projection: LinearProjection) -> Box<dyn GraphConvolution> {
    match kind {
        ConvKind::Sparse => Box::new(SparseConvolution::new(projection)),
        ConvKind::Dense => Box::new(DenseConvolution::new(projection)),
    }
}

fn random_projection(
    in_dim: usize,
    out_dim: usize,
    rng: &mut Xoshiro256PlusPlus,
) -> Result<LinearProjection> {
    let limit = (6.0 / (in_dim + out_dim) as f64).sqrt();
    let weights = DMatrix::from_fn(in_dim, out_dim, |_, _| rng.gen::<f64>() * 2.0 * limit - limit);
    let bias = DVector::zeros(out_dim);
    LinearProjection::new(weights, bias)
}

/// Index of the largest entry in each row; ties resolve to the first maximum.
pub(crate) fn argmax_rows(logits: &DMatrix<f64>) -> Vec<usize> {
    logits
        .row_iter()
        .map(|row| {
            let mut best = 0;
            let mut best_value = f64::NEG_INFINITY;
            for (idx, value) in row.iter().enumerate() {
                if *value > best_value {
                    best = idx;
                    best_value = *value;
                }
            }
            best
        })
        .collect()
}
