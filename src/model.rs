//! Node and edge records, and the monotonic ids that address them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::value::Value;

/// A node identifier. Strictly positive, assigned by `GraphStorage`, never
/// reused. Wrapped in a newtype so node and edge ids can't be swapped by
/// accident at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u64);

impl NodeId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An edge identifier. Disjoint numbering from `NodeId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(u64);

impl EdgeId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A labelled node with properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub labels: Vec<String>,
    pub properties: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Node {
    pub(crate) fn new(id: NodeId, labels: Vec<String>, properties: HashMap<String, Value>) -> Self {
        let now = Utc::now();
        Self {
            id,
            labels,
            properties,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A typed directed edge with properties and a carried (but uninterpreted
/// by the core traversals) weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub from_node_id: NodeId,
    pub to_node_id: NodeId,
    pub edge_type: String,
    pub properties: HashMap<String, Value>,
    pub weight: f64,
    pub created_at: DateTime<Utc>,
}

impl Edge {
    pub(crate) fn new(
        id: EdgeId,
        from_node_id: NodeId,
        to_node_id: NodeId,
        edge_type: String,
        properties: HashMap<String, Value>,
        weight: f64,
    ) -> Self {
        Self {
            id,
            from_node_id,
            to_node_id,
            edge_type,
            properties,
            weight,
            created_at: Utc::now(),
        }
    }
}

pub const DEFAULT_EDGE_WEIGHT: f64 = 1.0;
