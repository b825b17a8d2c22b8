use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::debug;
use nalgebra::DMatrix;
use once_cell::sync::OnceCell;

use crate::graph::{GraphInstance, GraphLoader};
use crate::operator::{AdjacencyNormalizer, CooAdjacency, PropagationOperator};

/// A loaded graph together with its derived propagation operator and feature
/// matrix. Both derivations run at most once and are shared read-only via
/// `Arc`; the instance itself is never mutated after construction.
#[derive(Debug)]
pub struct PreparedGraph {
    instance: Arc<GraphInstance>,
    operator: OnceCell<Arc<PropagationOperator>>,
    features: OnceCell<Arc<DMatrix<f64>>>,
}

impl PreparedGraph {
    pub fn node_count(&self) -> usize {
        self.instance.node_count()
    }

    pub fn graph(&self) -> &GraphInstance {
        &self.instance
    }

    pub fn instance_arc(&self) -> Arc<GraphInstance> {
        Arc::clone(&self.instance)
    }

    /// Normalized propagation operator, computed on first access.
    pub fn operator(&self) -> Result<Arc<PropagationOperator>> {
        self.operator
            .get_or_try_init(|| {
                let adjacency = CooAdjacency::from_graph(&self.instance);
                let operator = AdjacencyNormalizer::normalize(&adjacency)
                    .context("normalize graph adjacency")?;
                debug!(
                    "normalized operator: dim {}, non-zeros {}",
                    operator.dim(),
                    operator.nnz()
                );
                Ok(Arc::new(operator))
            })
            .map(Arc::clone)
    }

    /// Node feature matrix in internal index order, computed on first access.
    pub fn features(&self) -> Result<Arc<DMatrix<f64>>> {
        self.features
            .get_or_try_init(|| {
                let Some(width) = self.instance.feature_width() else {
                    bail!("graph carries no node features");
                };
                let n = self.instance.node_count();
                let mut matrix = DMatrix::zeros(n, width);
                for node in self.instance.graph.node_indices() {
                    let attrs = self
                        .instance
                        .graph
                        .node_weight(node)
                        .context("node weight present")?;
                    if attrs.features.len() != width {
                        bail!(
                            "node {} carries {} features, expected {}",
                            node.index(),
                            attrs.features.len(),
                            width
                        );
                    }
                    for (j, value) in attrs.features.iter().enumerate() {
                        matrix[(node.index(), j)] = *value;
                    }
                }
                Ok(Arc::new(matrix))
            })
            .map(Arc::clone)
    }

    pub fn labels(&self) -> Vec<Option<usize>> {
        self.instance.labels()
    }
}

#[derive(Debug, Default)]
pub struct GraphPreprocessor;

impl GraphPreprocessor {
    pub fn from_path(path: &Path) -> Result<PreparedGraph> {
        let instance =
            GraphLoader::from_path(path).with_context(|| format!("open graph file {:?}", path))?;
        Ok(Self::from_instance(instance))
    }

    pub fn from_instance(instance: GraphInstance) -> PreparedGraph {
        PreparedGraph {
            instance: Arc::new(instance),
            operator: OnceCell::new(),
            features: OnceCell::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_json() -> &'static str {
        r#"{
            "nodes": [
                {"id": "a", "attributes": {"features": [1.0, 0.0], "class": 0}},
                {"id": "b", "attributes": {"features": [0.0, 1.0], "class": 1}},
                {"id": "c", "attributes": {"features": [1.0, 1.0]}}
            ],
            "edges": [
                {"source": "a", "target": "b", "attributes": {}},
                {"source": "b", "target": "c", "attributes": {}},
                {"source": "c", "target": "a", "attributes": {}}
            ]
        }"#
    }

    #[test]
    fn operator_is_computed_once_and_shared() {
        let instance = GraphLoader::from_json_str(triangle_json()).expect("load");
        let prepared = GraphPreprocessor::from_instance(instance);
        let first = prepared.operator().expect("operator");
        let second = prepared.operator().expect("operator again");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.dim(), 3);
    }

    #[test]
    fn feature_matrix_follows_insertion_order() {
        let instance = GraphLoader::from_json_str(triangle_json()).expect("load");
        let prepared = GraphPreprocessor::from_instance(instance);
        let features = prepared.features().expect("features");
        assert_eq!(features.shape(), (3, 2));
        assert_eq!(features[(0, 0)], 1.0);
        assert_eq!(features[(1, 1)], 1.0);
        assert_eq!(prepared.labels(), vec![Some(0), Some(1), None]);
    }

    #[test]
    fn featureless_graph_is_reported() {
        let json = r#"{"nodes": [{"id": "a", "attributes": {}}], "edges": []}"#;
        let instance = GraphLoader::from_json_str(json).expect("load");
        let prepared = GraphPreprocessor::from_instance(instance);
        let err = prepared.features().expect_err("no features");
        assert!(err.to_string().contains("no node features"));
    }
}
