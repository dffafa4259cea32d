// Validation layer.
// Pure precondition checks shared by GraphStorage and WorkerPool
// construction. Returns the crate-wide GraphError rather than a validation-
// specific error type — see DESIGN.md for why the taxonomy stays unified.

use std::collections::HashMap;

use crate::error::{GraphError, Result};

/// Fluent context for chaining related precondition checks with a shared
/// "operation" label, so a failure message names what was being attempted.
#[derive(Clone)]
pub struct ValidationContext {
    operation: String,
    attributes: HashMap<String, String>,
}

impl ValidationContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn validate(self, condition: bool, message: &str) -> Result<()> {
        if !condition {
            return Err(GraphError::validation(format!(
                "{}: {message} (attributes: {:?})",
                self.operation, self.attributes
            )));
        }
        Ok(())
    }
}

/// Non-empty string check used for edge types and node/edge property keys.
pub fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(GraphError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Worker-count bound shared by `WorkerPool::new` and `ParallelTraverser::new`.
pub fn require_worker_count_within_cap(worker_count: usize, cap: usize) -> Result<()> {
    if worker_count > cap {
        return Err(GraphError::validation(format!(
            "worker count {worker_count} exceeds safety cap {cap}"
        )));
    }
    Ok(())
}
