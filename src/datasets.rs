use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::graph::{GraphInstance, GraphLoader};
use crate::prepare::{GraphPreprocessor, PreparedGraph};

const DEFAULT_ROOT: &str = "datasets";
const GRAPH_FILE: &str = "graph.json";
const CHECKPOINT_FILE: &str = "checkpoint.json";

/// Resolves named citation datasets under a root directory. A dataset is a
/// subdirectory holding `graph.json` and, when a trained model exists for it,
/// a `checkpoint.json` next to it.
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    root: PathBuf,
}

impl Default for DatasetLoader {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT)
    }
}

impl DatasetLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn graph_path(&self, dataset: &str) -> PathBuf {
        self.root.join(dataset).join(GRAPH_FILE)
    }

    /// Path to the dataset's trained checkpoint, if one has been written.
    pub fn checkpoint_path(&self, dataset: &str) -> Option<PathBuf> {
        let path = self.root.join(dataset).join(CHECKPOINT_FILE);
        path.is_file().then_some(path)
    }

    /// Dataset names under the root that carry a graph file, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("list dataset root {:?}", self.root))?;
        let mut datasets: Vec<String> = entries
            .filter_map(|entry| {
                let entry = entry.ok()?;
                let path = entry.path();
                if path.is_dir() && path.join(GRAPH_FILE).is_file() {
                    Some(entry.file_name().to_string_lossy().into_owned())
                } else {
                    None
                }
            })
            .collect();
        datasets.sort();
        Ok(datasets)
    }

    pub fn load(&self, dataset: &str) -> Result<GraphInstance> {
        let path = self.graph_path(dataset);
        GraphLoader::from_path(&path)
            .with_context(|| format!("load dataset '{}' from {:?}", dataset, path))
    }

    /// Load a dataset and wrap it for operator and feature derivation.
    pub fn prepare(&self, dataset: &str) -> Result<PreparedGraph> {
        Ok(GraphPreprocessor::from_instance(self.load(dataset)?))
    }
}
