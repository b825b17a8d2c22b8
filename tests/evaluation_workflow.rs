use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use gcnkit::{
    evaluate, ConvKind, DatasetLoader, GcnModel, GraphPreprocessor, LayerWeights, ModelCheckpoint,
};

const CITESEER_LIKE: &str = r#"{
    "directed": false,
    "nodes": [
        {"id": "paper0", "attributes": {"features": [1.0, 0.0, 0.0], "class": 0}},
        {"id": "paper1", "attributes": {"features": [0.9, 0.1, 0.0], "class": 0}},
        {"id": "paper2", "attributes": {"features": [0.0, 1.0, 0.0], "class": 1}},
        {"id": "paper3", "attributes": {"features": [0.0, 0.9, 0.1], "class": 1}},
        {"id": "paper4", "attributes": {"features": [0.0, 0.0, 1.0], "class": 2}},
        {"id": "paper5", "attributes": {"features": [0.1, 0.0, 0.9]}}
    ],
    "edges": [
        {"source": "paper0", "target": "paper1", "attributes": {"weight": 1.0}},
        {"source": "paper2", "target": "paper3", "attributes": {"weight": 1.0}},
        {"source": "paper4", "target": "paper5", "attributes": {"weight": 1.0}}
    ]
}"#;

fn temp_dataset_root() -> PathBuf {
    let epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis();
    let mut path = std::env::temp_dir();
    path.push(format!("gcnkit_datasets_{}_{}", std::process::id(), epoch));
    path
}

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
fn dataset_loading_preparation_and_evaluation() -> Result<()> {
    let root = temp_dataset_root();
    fs::create_dir_all(root.join("citations")).context("create dataset directory")?;
    fs::write(root.join("citations").join("graph.json"), CITESEER_LIKE)
        .context("write dataset graph")?;

    let loader = DatasetLoader::new(&root);
    assert_eq!(loader.list().context("list datasets")?, vec!["citations"]);
    assert!(
        loader.checkpoint_path("citations").is_none(),
        "no checkpoint written yet"
    );
    let graph = loader.load("citations").context("load dataset graph")?;
    assert_eq!(graph.node_count(), 6);
    assert_eq!(graph.edge_count(), 6, "undirected edges stored both ways");
    assert_eq!(graph.feature_width(), Some(3));
    assert_eq!(graph.class_count(), Some(3));

    let prepared = GraphPreprocessor::from_instance(graph);
    let operator = prepared.operator().context("normalize adjacency")?;
    assert_eq!(operator.dim(), 6);
    for i in 0..6 {
        assert!(operator.get(i, i) > 0.0, "self-loop missing at node {i}");
        for j in 0..6 {
            assert!(
                (operator.get(i, j) - operator.get(j, i)).abs() < 1e-6,
                "operator asymmetry at ({i}, {j})"
            );
        }
    }

    // Each connected pair shares a dominant feature axis, so an identity
    // model classifies every labeled node correctly.
    let checkpoint = ModelCheckpoint::new(identity_layer(3), identity_layer(3));
    checkpoint
        .write_to_path(&root.join("citations").join("checkpoint.json"))
        .context("write dataset checkpoint")?;
    let checkpoint_path = loader
        .checkpoint_path("citations")
        .context("checkpoint should now resolve")?;
    let model = GcnModel::from_checkpoint_path(&checkpoint_path, ConvKind::Sparse)?;
    let report = evaluate(&model, &prepared).context("evaluate")?;
    assert_eq!(report.evaluated, 5, "unlabeled paper5 is masked out");
    assert_eq!(report.correct, 5);
    assert!((report.accuracy - 1.0).abs() < 1e-12);

    // Sparse and dense assemblies of the same weights score identically.
    let dense_model = GcnModel::from_checkpoint(&checkpoint, ConvKind::Dense)?;
    let dense_report = evaluate(&dense_model, &prepared).context("evaluate dense")?;
    assert_eq!(report, dense_report);

    fs::remove_dir_all(&root).context("cleanup dataset root")?;
    Ok(())
}

#[test]
fn random_model_evaluation_stays_in_range() -> Result<()> {
    let root = temp_dataset_root();
    fs::create_dir_all(root.join("synthetic")).context("create dataset directory")?;
    fs::write(root.join("synthetic").join("graph.json"), CITESEER_LIKE)
        .context("write dataset graph")?;

    let prepared = DatasetLoader::new(&root)
        .prepare("synthetic")
        .context("prepare dataset graph")?;
    let model = GcnModel::random(3, 16, 3, ConvKind::Sparse, 42)?;
    let report = evaluate(&model, &prepared).context("evaluate")?;
    assert_eq!(report.evaluated, 5);
    assert!((0.0..=1.0).contains(&report.accuracy));

    fs::remove_dir_all(&root).context("cleanup dataset root")?;
    Ok(())
}
