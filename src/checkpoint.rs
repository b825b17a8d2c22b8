use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{bail, Context, Result};
use nalgebra::{DMatrix, DVector};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::conv::LinearProjection;

pub const CHECKPOINT_VERSION: u32 = 1;

/// Row-major weights and bias of one convolution layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerWeights {
    pub in_dim: usize,
    pub out_dim: usize,
    pub weights: Vec<f64>,
    pub bias: Vec<f64>,
}

impl LayerWeights {
    pub fn from_projection(projection: &LinearProjection) -> Self {
        let weights = projection
            .weights()
            .row_iter()
            .flat_map(|row| row.iter().copied().collect::<Vec<_>>())
            .collect();
        Self {
            in_dim: projection.input_dim(),
            out_dim: projection.output_dim(),
            weights,
            bias: projection.bias().iter().copied().collect(),
        }
    }

    pub fn to_projection(&self) -> Result<LinearProjection> {
        if self.weights.len() != self.in_dim * self.out_dim {
            bail!(
                "layer stores {} weights, expected {}x{}",
                self.weights.len(),
                self.in_dim,
                self.out_dim
            );
        }
        if self.bias.len() != self.out_dim {
            bail!(
                "layer stores {} bias entries, expected {}",
                self.bias.len(),
                self.out_dim
            );
        }
        let weights = DMatrix::from_row_slice(self.in_dim, self.out_dim, &self.weights);
        let bias = DVector::from_row_slice(&self.bias);
        LinearProjection::new(weights, bias)
    }
}

/// Serialized form of a trained two-layer model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCheckpoint {
    pub version: u32,
    pub layer1: LayerWeights,
    pub layer2: LayerWeights,
}

impl ModelCheckpoint {
    pub fn new(layer1: LayerWeights, layer2: LayerWeights) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            layer1,
            layer2,
        }
    }

    pub fn read_from_path(path: &Path) -> Result<Self> {
        let checkpoint: Self = read_json(path)?;
        if checkpoint.version != CHECKPOINT_VERSION {
            bail!(
                "unsupported checkpoint version {} in {:?}, expected {}",
                checkpoint.version,
                path,
                CHECKPOINT_VERSION
            );
        }
        if checkpoint.layer1.out_dim != checkpoint.layer2.in_dim {
            bail!(
                "layer widths disagree: layer1 emits {}, layer2 expects {}",
                checkpoint.layer1.out_dim,
                checkpoint.layer2.in_dim
            );
        }
        Ok(checkpoint)
    }

    pub fn write_to_path(&self, path: &Path) -> Result<()> {
        write_json(path, self)
    }
}

fn read_json<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let file = File::open(path).with_context(|| format!("open checkpoint file {:?}", path))?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader)
        .with_context(|| format!("deserialize checkpoint file {:?}", path))
}

fn write_json<T>(path: &Path, value: &T) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create checkpoint parent directory {:?}", parent))?;
    }
    let file = File::create(path).with_context(|| format!("create checkpoint file {:?}", path))?;
    let writer = BufWriter::new(file);
    serde_json::to_writer(writer, value)
        .with_context(|| format!("serialize checkpoint file {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_layer(dim: usize) -> LayerWeights {
        let mut weights = vec![0.0; dim * dim];
        for i in 0..dim {
            weights[i * dim + i] = 1.0;
        }
        LayerWeights {
            in_dim: dim,
            out_dim: dim,
            weights,
            bias: vec![0.0; dim],
        }
    }

    #[test]
    fn projection_round_trip_preserves_values() {
        let layer = LayerWeights {
            in_dim: 2,
            out_dim: 3,
            weights: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            bias: vec![0.1, 0.2, 0.3],
        };
        let projection = layer.to_projection().expect("projection");
        assert_eq!(projection.weights()[(0, 1)], 2.0);
        assert_eq!(projection.weights()[(1, 0)], 4.0);
        assert_eq!(LayerWeights::from_projection(&projection), layer);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let mut layer = identity_layer(2);
        layer.weights.pop();
        assert!(layer.to_projection().is_err());
    }

    #[test]
    fn file_round_trip_and_version_check() {
        let checkpoint = ModelCheckpoint::new(identity_layer(2), identity_layer(2));
        let mut path = std::env::temp_dir();
        path.push(format!(
            "gcnkit_checkpoint_{}.json",
            std::process::id()
        ));
        checkpoint.write_to_path(&path).expect("write checkpoint");
        let restored = ModelCheckpoint::read_from_path(&path).expect("read checkpoint");
        assert_eq!(checkpoint, restored);

        let mut stale = checkpoint.clone();
        stale.version = CHECKPOINT_VERSION + 1;
        stale.write_to_path(&path).expect("write stale checkpoint");
        assert!(ModelCheckpoint::read_from_path(&path).is_err());
        let _ = fs::remove_file(&path);
    }
}
