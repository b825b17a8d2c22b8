use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use log::info;

use gcnkit::{
    evaluate, ConvKind, DatasetLoader, GcnModel, GraphPreprocessor, PredictRequest,
    PredictService, RequestEdge,
};

const HIDDEN_DIM: usize = 16;
const FALLBACK_SEED: u64 = 42;

fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}

struct CliArgs {
    graph: PathBuf,
    checkpoint: Option<PathBuf>,
    kind: ConvKind,
}

fn parse_args() -> Result<CliArgs> {
    let mut graph = None;
    let mut checkpoint = None;
    let mut kind = ConvKind::Sparse;

    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--dense" => kind = ConvKind::Dense,
            "--sparse" => kind = ConvKind::Sparse,
            _ if graph.is_none() => graph = Some(PathBuf::from(&arg)),
            _ if checkpoint.is_none() => checkpoint = Some(PathBuf::from(&arg)),
            _ => anyhow::bail!("Unexpected extra argument: {arg}"),
        }
    }

    let Some(graph) = graph else {
        anyhow::bail!("Usage: gcnkit <graph.json> [checkpoint.json] [--dense|--sparse]");
    };
    Ok(CliArgs {
        graph,
        checkpoint,
        kind,
    })
}

/// A graph argument may be a JSON file or a dataset directory following the
/// `DatasetLoader` convention; a directory also supplies a default checkpoint
/// when one sits next to the graph.
fn resolve_graph(path: &Path) -> (PathBuf, Option<PathBuf>) {
    if !path.is_dir() {
        return (path.to_path_buf(), None);
    }
    let root = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let dataset = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let loader = DatasetLoader::new(root);
    (
        loader.graph_path(&dataset),
        loader.checkpoint_path(&dataset),
    )
}

fn main() -> Result<()> {
    init_logging();
    let args = parse_args()?;
    let (graph_path, dataset_checkpoint) = resolve_graph(&args.graph);
    let checkpoint = args.checkpoint.clone().or(dataset_checkpoint);

    let load_start = Instant::now();
    let prepared = GraphPreprocessor::from_path(&graph_path)
        .with_context(|| format!("prepare graph at {:?}", graph_path))?;
    info!(
        "Graph {:?}: nodes {}, edges {}, loaded in {:?}",
        graph_path,
        prepared.node_count(),
        prepared.graph().edge_count(),
        load_start.elapsed()
    );

    let operator = prepared.operator().context("normalize adjacency")?;
    info!(
        "Propagation operator: dim {}, non-zeros {}",
        operator.dim(),
        operator.nnz()
    );

    // The model is loaded exactly once and reused for evaluation and the
    // smoke prediction below.
    let model = match &checkpoint {
        Some(path) => {
            GcnModel::from_checkpoint_path(path, args.kind)
                .with_context(|| format!("load checkpoint {:?}", path))?
        }
        None => {
            let features = prepared.features().context("materialize features")?;
            let classes = prepared
                .graph()
                .class_count()
                .context("graph has no class labels; cannot size a fallback model")?;
            info!(
                "No checkpoint given, random-initializing {}-{}-{} model (seed {})",
                features.ncols(),
                HIDDEN_DIM,
                classes,
                FALLBACK_SEED
            );
            GcnModel::random(features.ncols(), HIDDEN_DIM, classes, args.kind, FALLBACK_SEED)?
        }
    };

    let eval_start = Instant::now();
    let report = evaluate(&model, &prepared).context("evaluate model")?;
    info!(
        "Accuracy: {:.2}% ({}/{} labeled nodes) in {:?}",
        report.accuracy * 100.0,
        report.correct,
        report.evaluated,
        eval_start.elapsed()
    );

    smoke_prediction(&prepared, Arc::new(model))
}

/// Push the first few nodes back through the request path to confirm the
/// serving boundary answers with the loaded model.
fn smoke_prediction(prepared: &gcnkit::PreparedGraph, model: Arc<GcnModel>) -> Result<()> {
    let features = prepared.features().context("materialize features")?;
    let sample = prepared.node_count().min(4);

    let x: Vec<Vec<f64>> = (0..sample)
        .map(|i| features.row(i).iter().copied().collect())
        .collect();
    let edges: Vec<RequestEdge> = (1..sample)
        .map(|i| RequestEdge {
            source: i - 1,
            target: i,
            weight: None,
        })
        .collect();

    let service = PredictService::new(model);
    let response = service
        .handle(&PredictRequest {
            x,
            edges,
            directed: false,
        })
        .context("smoke prediction request")?;
    info!("Smoke prediction classes: {:?}", response.classes);
    Ok(())
}
