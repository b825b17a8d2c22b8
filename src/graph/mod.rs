pub mod construction;
pub mod model;

pub use construction::GraphLoader;
pub use model::{EdgeAttributes, GraphInstance, NodeAttributes, RawGraph};
