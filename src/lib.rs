// VertexDB - an embedded graph database with a concurrent traversal engine.
// Root library module.

pub mod builders;
pub mod error;
pub mod model;
pub mod observability;
pub mod pool;
pub mod storage;
pub mod traverser;
pub mod validation;
pub mod value;

pub use builders::{EdgeBuilder, NodeBuilder};
pub use error::{GraphError, Result};
pub use model::{Edge, EdgeId, Node, NodeId};
pub use observability::{init_logging, init_logging_with_level};
pub use pool::WorkerPool;
pub use storage::{GraphStorage, GraphStorageConfig, GraphStorageConfigBuilder, Statistics};
pub use traverser::ParallelTraverser;
pub use value::Value;
