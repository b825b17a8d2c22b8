use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::gcn::{argmax_rows, ConvKind, GcnModel};
use crate::operator::{AdjacencyNormalizer, CooAdjacency};

/// Payload-level prediction request: per-node feature rows plus an edge list
/// over the row indices. Transport is a caller concern.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictRequest {
    pub x: Vec<Vec<f64>>,
    #[serde(default)]
    pub edges: Vec<RequestEdge>,
    #[serde(default)]
    pub directed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestEdge {
    pub source: usize,
    pub target: usize,
    #[serde(default)]
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictResponse {
    pub classes: Vec<usize>,
    pub logits: Vec<Vec<f64>>,
}

/// Holds the model loaded once at startup and answers prediction requests
/// against it. The model is immutable, so one service value can be shared
/// across concurrent callers.
pub struct PredictService {
    model: Arc<GcnModel>,
}

impl PredictService {
    pub fn new(model: Arc<GcnModel>) -> Self {
        Self { model }
    }

    pub fn from_checkpoint_path(path: &Path, kind: ConvKind) -> Result<Self> {
        let model = GcnModel::from_checkpoint_path(path, kind)
            .with_context(|| format!("initialize prediction service from {:?}", path))?;
        Ok(Self::new(Arc::new(model)))
    }

    pub fn model(&self) -> Arc<GcnModel> {
        Arc::clone(&self.model)
    }

    pub fn handle(&self, request: &PredictRequest) -> Result<PredictResponse> {
        let features = request_features(request, self.model.input_dim())?;
        let adjacency = request_adjacency(request)?;
        let operator =
            AdjacencyNormalizer::normalize(&adjacency).context("normalize request adjacency")?;
        let logits = self
            .model
            .forward(&operator, &features)
            .context("request forward pass")?;

        let classes = argmax_rows(&logits);
        let logits = logits
            .row_iter()
            .map(|row| row.iter().copied().collect())
            .collect();
        Ok(PredictResponse { classes, logits })
    }
}

fn request_features(request: &PredictRequest, expected_width: usize) -> Result<DMatrix<f64>> {
    if request.x.is_empty() {
        bail!("request carries no feature rows");
    }
    for (idx, row) in request.x.iter().enumerate() {
        if row.len() != expected_width {
            bail!(
                "feature row {} has width {}, model expects {}",
                idx,
                row.len(),
                expected_width
            );
        }
    }
    let flat: Vec<f64> = request.x.iter().flatten().copied().collect();
    Ok(DMatrix::from_row_slice(
        request.x.len(),
        expected_width,
        &flat,
    ))
}

fn request_adjacency(request: &PredictRequest) -> Result<CooAdjacency> {
    let n = request.x.len();
    let mut adjacency = CooAdjacency::new(n);
    for (idx, edge) in request.edges.iter().enumerate() {
        if edge.source >= n || edge.target >= n {
            bail!(
                "edge {} references node ({}, {}) outside {} feature rows",
                idx,
                edge.source,
                edge.target,
                n
            );
        }
        let weight = edge.weight.unwrap_or(1.0);
        adjacency.push(edge.target, edge.source, weight);
        if !request.directed && edge.source != edge.target {
            adjacency.push(edge.source, edge.target, weight);
        }
    }
    Ok(adjacency)
}
