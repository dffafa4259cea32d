// Error taxonomy shared by GraphStorage, WorkerPool, and ParallelTraverser.
// One enum because all three components share exactly these four kinds of
// failure; splitting it per-component would just be three copies of the
// same four variants.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, GraphError>;

/// The failure kinds a caller can pattern-match on.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A requested node, edge, or path does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed input: empty edge type, worker count over the safety cap, etc.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The operation was attempted after storage/pool/traverser was closed.
    #[error("operation attempted on closed {0}")]
    Closed(&'static str),

    /// An internal consistency check failed. Indicates a bug, not bad input.
    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl GraphError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(why: impl Into<String>) -> Self {
        Self::Validation(why.into())
    }

    pub fn invariant(why: impl Into<String>) -> Self {
        Self::Invariant(why.into())
    }
}
