use indexmap::IndexMap;
use petgraph::{graph::Graph, prelude::NodeIndex};
use serde::{Deserialize, Serialize};

pub type GraphId = String;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeAttributes {
    pub label: Option<String>,
    pub class: Option<usize>,
    pub features: Vec<f64>,
    pub extra: IndexMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeAttributes {
    pub weight: Option<f64>,
    pub extra: IndexMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawGraph {
    pub nodes: Vec<RawNode>,
    pub edges: Vec<RawEdge>,
    #[serde(default)]
    pub graph_attributes: IndexMap<String, serde_json::Value>,
    #[serde(default)]
    pub directed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNode {
    pub id: GraphId,
    #[serde(default)]
    pub attributes: IndexMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEdge {
    pub source: GraphId,
    pub target: GraphId,
    #[serde(default)]
    pub attributes: IndexMap<String, serde_json::Value>,
}

pub type LabeledGraph = Graph<NodeAttributes, EdgeAttributes>;

#[derive(Debug, Clone)]
pub struct GraphInstance {
    pub graph: LabeledGraph,
    pub node_lookup: IndexMap<GraphId, NodeIndex>,
    pub reverse_lookup: IndexMap<NodeIndex, GraphId>,
    pub graph_attributes: IndexMap<String, serde_json::Value>,
    pub directed: bool,
}

impl GraphInstance {
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Width of the node feature vectors, or `None` when no node carries
    /// features. The loader guarantees the width is uniform across nodes.
    pub fn feature_width(&self) -> Option<usize> {
        self.graph
            .node_weights()
            .map(|node| node.features.len())
            .find(|len| *len > 0)
    }

    /// Per-node class labels in internal index order.
    pub fn labels(&self) -> Vec<Option<usize>> {
        self.graph.node_weights().map(|node| node.class).collect()
    }

    /// Number of distinct classes, derived as `max class + 1`.
    pub fn class_count(&self) -> Option<usize> {
        self.graph
            .node_weights()
            .filter_map(|node| node.class)
            .max()
            .map(|max| max + 1)
    }
}
