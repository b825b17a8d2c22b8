pub mod checkpoint;
pub mod conv;
pub mod datasets;
pub mod eval;
pub mod gcn;
pub mod graph;
pub mod operator;
pub mod prepare;
pub mod serve;

pub use checkpoint::{LayerWeights, ModelCheckpoint, CHECKPOINT_VERSION};
pub use conv::{DenseConvolution, GraphConvolution, LinearProjection, SparseConvolution};
pub use datasets::DatasetLoader;
pub use eval::{evaluate, EvaluationReport};
pub use gcn::{ConvKind, GcnModel};
pub use graph::{GraphInstance, GraphLoader};
pub use operator::{AdjacencyNormalizer, CooAdjacency, OperatorError, PropagationOperator};
pub use prepare::{GraphPreprocessor, PreparedGraph};
pub use serve::{PredictRequest, PredictResponse, PredictService, RequestEdge};
