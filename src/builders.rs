// Builder Patterns
// Fluent builder APIs for constructing Node and Edge records with sensible
// defaults, matching the construction style GraphStorage itself uses.

use std::collections::HashMap;

use crate::error::{GraphError, Result};
use crate::model::{Edge, EdgeId, Node, NodeId, DEFAULT_EDGE_WEIGHT};
use crate::value::Value;

/// Fluent builder for creating a [`Node`] outside of `GraphStorage::create_node`
/// (useful for tests and for callers assembling a node before submitting it).
pub struct NodeBuilder {
    labels: Vec<String>,
    properties: HashMap<String, Value>,
}

impl NodeBuilder {
    pub fn new() -> Self {
        Self {
            labels: Vec::new(),
            properties: HashMap::new(),
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    pub fn labels(mut self, labels: impl IntoIterator<Item = String>) -> Self {
        self.labels.extend(labels);
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Builds a `Node` carrying the id `0` as a placeholder; `GraphStorage`
    /// is the only authority for real ids, so callers normally pass the
    /// labels/properties straight to `create_node` rather than calling this.
    /// This exists for tests that need a standalone `Node` value.
    pub fn build_detached(self) -> Node {
        Node::new(NodeId::new(0), self.labels, self.properties)
    }
}

impl Default for NodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Fluent builder for creating an [`Edge`] outside of `GraphStorage::create_edge`.
pub struct EdgeBuilder {
    from_node_id: Option<NodeId>,
    to_node_id: Option<NodeId>,
    edge_type: Option<String>,
    properties: HashMap<String, Value>,
    weight: f64,
}

impl EdgeBuilder {
    pub fn new() -> Self {
        Self {
            from_node_id: None,
            to_node_id: None,
            edge_type: None,
            properties: HashMap::new(),
            weight: DEFAULT_EDGE_WEIGHT,
        }
    }

    pub fn from(mut self, id: NodeId) -> Self {
        self.from_node_id = Some(id);
        self
    }

    pub fn to(mut self, id: NodeId) -> Self {
        self.to_node_id = Some(id);
        self
    }

    pub fn edge_type(mut self, edge_type: impl Into<String>) -> Self {
        self.edge_type = Some(edge_type.into());
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Validates the same constraint `create_edge` enforces (non-empty
    /// type) and builds a detached `Edge` carrying id `0` as a placeholder.
    pub fn build_detached(self) -> Result<Edge> {
        let from = self
            .from_node_id
            .ok_or_else(|| GraphError::validation("edge requires a from_node_id"))?;
        let to = self
            .to_node_id
            .ok_or_else(|| GraphError::validation("edge requires a to_node_id"))?;
        let edge_type = self
            .edge_type
            .ok_or_else(|| GraphError::validation("edge requires a type"))?;
        if edge_type.is_empty() {
            return Err(GraphError::validation("edge type must not be empty"));
        }
        Ok(Edge::new(EdgeId::new(0), from, to, edge_type, self.properties, self.weight))
    }
}

impl Default for EdgeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_builder_collects_labels_and_properties() {
        let node = NodeBuilder::new()
            .label("Person")
            .property("name", "Ada")
            .build_detached();
        assert_eq!(node.labels, vec!["Person".to_string()]);
        assert_eq!(node.properties.get("name"), Some(&Value::from("Ada")));
    }

    #[test]
    fn edge_builder_rejects_empty_type() {
        let err = EdgeBuilder::new()
            .from(NodeId::new(1))
            .to(NodeId::new(2))
            .edge_type("")
            .build_detached()
            .unwrap_err();
        assert!(matches!(err, GraphError::Validation(_)));
    }

    #[test]
    fn edge_builder_defaults_weight() {
        let edge = EdgeBuilder::new()
            .from(NodeId::new(1))
            .to(NodeId::new(2))
            .edge_type("knows")
            .build_detached()
            .unwrap();
        assert_eq!(edge.weight, DEFAULT_EDGE_WEIGHT);
    }
}
