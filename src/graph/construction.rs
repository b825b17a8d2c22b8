use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;

use crate::graph::model::{EdgeAttributes, GraphInstance, NodeAttributes, RawGraph};

/// High-level loader responsible for turning JSON representations into in-memory graphs.
#[derive(Debug, Default)]
pub struct GraphLoader;

impl GraphLoader {
    /// Parse a JSON string into a graph instance.
    pub fn from_json_str(json: &str) -> Result<GraphInstance> {
        let raw: RawGraph = serde_json::from_str(json)?;
        Self::from_raw_graph(raw)
    }

    /// Read JSON graph data from a reader.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<GraphInstance> {
        let mut buf = String::new();
        reader.read_to_string(&mut buf)?;
        Self::from_json_str(&buf)
    }

    /// Load a graph from a JSON file on disk.
    pub fn from_path(path: &Path) -> Result<GraphInstance> {
        let file = File::open(path).with_context(|| format!("open graph file {:?}", path))?;
        Self::from_reader(BufReader::new(file))
            .with_context(|| format!("parse graph file {:?}", path))
    }

    pub fn from_raw_graph(raw: RawGraph) -> Result<GraphInstance> {
        let mut pending = Vec::with_capacity(raw.nodes.len());
        for raw_node in raw.nodes {
            let mut attributes = raw_node.attributes;
            let label = extract_label(&mut attributes);
            let class = extract_class(&mut attributes)
                .with_context(|| format!("node '{}' class attribute", raw_node.id))?;
            let features = extract_features(&mut attributes)
                .with_context(|| format!("node '{}' feature attribute", raw_node.id))?;
            pending.push((raw_node.id, label, class, features, attributes));
        }

        // Once any node carries features, every node must carry the same
        // width; a featureless node in a featured graph is rejected here,
        // where its id is still known.
        let feature_width = pending
            .iter()
            .map(|(_, _, _, features, _)| features.len())
            .find(|len| *len > 0);
        if let Some(width) = feature_width {
            for (id, _, _, features, _) in &pending {
                if features.len() != width {
                    return Err(anyhow!(
                        "node '{}' carries {} features, expected {}",
                        id,
                        features.len(),
                        width
                    ));
                }
            }
        }

        let mut graph =
            crate::graph::model::LabeledGraph::with_capacity(pending.len(), raw.edges.len());
        let mut node_lookup = IndexMap::new();
        let mut reverse_lookup = IndexMap::new();

        for (id, label, class, features, extra) in pending {
            let node_attr = NodeAttributes {
                label,
                class,
                features,
                extra,
            };
            let idx = graph.add_node(node_attr);
            node_lookup.insert(id.clone(), idx);
            reverse_lookup.insert(idx, id);
        }

        for raw_edge in raw.edges {
            let source_idx = *node_lookup
                .get(&raw_edge.source)
                .ok_or_else(|| anyhow!("Unknown source node id: {}", raw_edge.source))?;
            let target_idx = *node_lookup
                .get(&raw_edge.target)
                .ok_or_else(|| anyhow!("Unknown target node id: {}", raw_edge.target))?;

            let mut attributes = raw_edge.attributes;
            let weight = extract_weight(&mut attributes);
            let edge_attr = EdgeAttributes {
                weight,
                extra: attributes,
            };
            graph.add_edge(source_idx, target_idx, edge_attr.clone());
            if !raw.directed && source_idx != target_idx {
                graph.add_edge(target_idx, source_idx, edge_attr);
            }
        }

        Ok(GraphInstance {
            graph,
            node_lookup,
            reverse_lookup,
            graph_attributes: raw.graph_attributes,
            directed: raw.directed,
        })
    }
}

fn extract_label(attrs: &mut IndexMap<String, serde_json::Value>) -> Option<String> {
    attrs.shift_remove("label").and_then(value_to_string)
}

fn extract_class(attrs: &mut IndexMap<String, serde_json::Value>) -> Result<Option<usize>> {
    match attrs.shift_remove("class") {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(num)) => num
            .as_u64()
            .map(|v| Some(v as usize))
            .ok_or_else(|| anyhow!("class must be a non-negative integer, got {}", num)),
        Some(other) => Err(anyhow!("class must be a non-negative integer, got {}", other)),
    }
}

fn extract_features(attrs: &mut IndexMap<String, serde_json::Value>) -> Result<Vec<f64>> {
    match attrs.shift_remove("features") {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(serde_json::Value::Array(values)) => values
            .into_iter()
            .map(|value| match value {
                serde_json::Value::Number(num) => num
                    .as_f64()
                    .ok_or_else(|| anyhow!("feature value out of f64 range")),
                other => Err(anyhow!("feature entries must be numbers, got {}", other)),
            })
            .collect(),
        Some(other) => Err(anyhow!("features must be an array, got {}", other)),
    }
}

fn extract_weight(attrs: &mut IndexMap<String, serde_json::Value>) -> Option<f64> {
    attrs.shift_remove("weight").and_then(|value| match value {
        serde_json::Value::Number(num) => num.as_f64(),
        serde_json::Value::String(s) => s.parse::<f64>().ok(),
        serde_json::Value::Bool(b) => Some(if b { 1.0 } else { 0.0 }),
        _ => None,
    })
}

fn value_to_string(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(num) => Some(num.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}
