use anyhow::{bail, Context, Result};

use crate::gcn::GcnModel;
use crate::prepare::PreparedGraph;

/// Node classification accuracy over the labeled subset of a graph.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    pub correct: usize,
    pub evaluated: usize,
    pub accuracy: f64,
}

/// Run one forward pass and compare argmax predictions against node classes.
/// Unlabeled nodes are excluded from the denominator, so partial labelings
/// act as an evaluation mask.
pub fn evaluate(model: &GcnModel, prepared: &PreparedGraph) -> Result<EvaluationReport> {
    let operator = prepared.operator().context("prepare propagation operator")?;
    let features = prepared.features().context("prepare feature matrix")?;
    let predictions = model
        .predict(&operator, &features)
        .context("model prediction")?;

    let labels = prepared.labels();
    let mut correct = 0;
    let mut evaluated = 0;
    for (prediction, label) in predictions.iter().zip(&labels) {
        if let Some(class) = label {
            evaluated += 1;
            if prediction == class {
                correct += 1;
            }
        }
    }

    if evaluated == 0 {
        bail!("graph has no labeled nodes to evaluate against");
    }

    Ok(EvaluationReport {
        correct,
        evaluated,
        accuracy: correct as f64 / evaluated as f64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{LayerWeights, ModelCheckpoint};
    use crate::gcn::ConvKind;
    use crate::graph::GraphLoader;
    use crate::prepare::GraphPreprocessor;

    fn identity_model(dim: usize) -> GcnModel {
        let mut weights = vec![0.0; dim * dim];
        for i in 0..dim {
            weights[i * dim + i] = 1.0;
        }
        let layer = LayerWeights {
            in_dim: dim,
            out_dim: dim,
            weights,
            bias: vec![0.0; dim],
        };
        GcnModel::from_checkpoint(&ModelCheckpoint::new(layer.clone(), layer), ConvKind::Sparse)
            .expect("identity model")
    }

    #[test]
    fn perfect_predictions_reach_full_accuracy() {
        // Isolated nodes with one-hot features: an identity model predicts
        // each node's own hot index.
        let json = r#"{
            "nodes": [
                {"id": "a", "attributes": {"features": [1.0, 0.0], "class": 0}},
                {"id": "b", "attributes": {"features": [0.0, 1.0], "class": 1}},
                {"id": "c", "attributes": {"features": [0.0, 1.0]}}
            ],
            "edges": []
        }"#;
        let prepared =
            GraphPreprocessor::from_instance(GraphLoader::from_json_str(json).expect("load"));
        let report = evaluate(&identity_model(2), &prepared).expect("evaluate");
        assert_eq!(report.correct, 2);
        assert_eq!(report.evaluated, 2, "unlabeled node must not be counted");
        assert!((report.accuracy - 1.0).abs() < 1e-12);
    }

    #[test]
    fn wrong_labels_lower_accuracy() {
        let json = r#"{
            "nodes": [
                {"id": "a", "attributes": {"features": [1.0, 0.0], "class": 0}},
                {"id": "b", "attributes": {"features": [0.0, 1.0], "class": 0}}
            ],
            "edges": []
        }"#;
        let prepared =
            GraphPreprocessor::from_instance(GraphLoader::from_json_str(json).expect("load"));
        let report = evaluate(&identity_model(2), &prepared).expect("evaluate");
        assert_eq!(report.correct, 1);
        assert_eq!(report.evaluated, 2);
        assert!((report.accuracy - 0.5).abs() < 1e-12);
    }

    #[test]
    fn fully_unlabeled_graph_is_an_error() {
        let json = r#"{
            "nodes": [{"id": "a", "attributes": {"features": [1.0, 0.0]}}],
            "edges": []
        }"#;
        let prepared =
            GraphPreprocessor::from_instance(GraphLoader::from_json_str(json).expect("load"));
        assert!(evaluate(&identity_model(2), &prepared).is_err());
    }
}
