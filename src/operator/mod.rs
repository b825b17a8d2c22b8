pub mod adjacency;
pub mod matrix;
pub mod normalize;

pub use adjacency::CooAdjacency;
pub use matrix::PropagationOperator;
pub use normalize::{AdjacencyNormalizer, OperatorError};
