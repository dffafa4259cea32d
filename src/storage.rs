//! In-memory graph storage: owns every node and edge, maintains adjacency
//! indices, and assigns monotonic ids.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::{GraphError, Result};
use crate::model::{Edge, EdgeId, Node, NodeId};
use crate::observability::{record_error, record_operation};
use crate::validation::ValidationContext;
use crate::value::Value;

/// Construction knobs for [`GraphStorage`].
#[derive(Debug, Clone)]
pub struct GraphStorageConfig {
    pub data_dir: PathBuf,
    pub max_traversal_depth: u32,
}

impl GraphStorageConfig {
    pub fn builder() -> GraphStorageConfigBuilder {
        GraphStorageConfigBuilder::default()
    }
}

/// Fluent builder for [`GraphStorageConfig`], in the style the rest of the
/// crate's `builders` module uses for `Node`/`Edge`.
#[derive(Debug, Default)]
pub struct GraphStorageConfigBuilder {
    data_dir: Option<PathBuf>,
    max_traversal_depth: Option<u32>,
}

impl GraphStorageConfigBuilder {
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    pub fn max_traversal_depth(mut self, depth: u32) -> Self {
        self.max_traversal_depth = Some(depth);
        self
    }

    pub fn build(self) -> Result<GraphStorageConfig> {
        let data_dir = self
            .data_dir
            .ok_or_else(|| GraphError::validation("data_dir is required"))?;
        Ok(GraphStorageConfig {
            data_dir,
            max_traversal_depth: self.max_traversal_depth.unwrap_or(64),
        })
    }
}

/// Read-only counters exposed for observability.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    pub node_count: usize,
    pub edge_count: usize,
    pub total_queries: u64,
    pub avg_query_time: f64,
    pub adjacency_errors_skipped: u64,
}

struct QueryTiming {
    count: AtomicU64,
    sum_millis: AtomicU64,
}

impl QueryTiming {
    fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            sum_millis: AtomicU64::new(0),
        }
    }

    fn record(&self, elapsed: std::time::Duration) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_millis
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
    }

    fn average(&self) -> f64 {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        self.sum_millis.load(Ordering::Relaxed) as f64 / count as f64
    }

    fn total(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

#[derive(Default)]
struct Indices {
    nodes_by_id: HashMap<NodeId, Node>,
    edges_by_id: HashMap<EdgeId, Edge>,
    outgoing: HashMap<NodeId, Vec<EdgeId>>,
    incoming: HashMap<NodeId, Vec<EdgeId>>,
}

/// Owns the authoritative node/edge set for one graph. Cloneable handles are
/// not provided; wrap in `Arc` at the call site the way the traverser does.
pub struct GraphStorage {
    indices: RwLock<Indices>,
    next_node_id: AtomicU64,
    next_edge_id: AtomicU64,
    closed: AtomicBool,
    adjacency_errors_skipped: AtomicU64,
    query_timing: QueryTiming,
    #[allow(dead_code)]
    config: GraphStorageConfig,
}

impl GraphStorage {
    /// Opens storage rooted at `config.data_dir`, creating the directory if
    /// absent. No content is written there yet — this is a placeholder for a
    /// future persistence layer, not a no-op validation step.
    pub fn open(config: GraphStorageConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir).map_err(|e| {
            GraphError::validation(format!(
                "could not create data_dir {}: {e}",
                config.data_dir.display()
            ))
        })?;
        debug!(data_dir = %config.data_dir.display(), "opened graph storage");
        Ok(Self {
            indices: RwLock::new(Indices::default()),
            next_node_id: AtomicU64::new(1),
            next_edge_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            adjacency_errors_skipped: AtomicU64::new(0),
            query_timing: QueryTiming::new(),
            config,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(GraphError::Closed("GraphStorage"));
        }
        Ok(())
    }

    pub fn create_node(&self, labels: Vec<String>, properties: HashMap<String, Value>) -> Result<Node> {
        self.check_open()?;
        let id = NodeId::new(self.next_node_id.fetch_add(1, Ordering::Relaxed));
        let node = Node::new(id, labels, properties);
        let mut indices = self.indices.write();
        indices.nodes_by_id.insert(id, node.clone());
        indices.outgoing.entry(id).or_default();
        indices.incoming.entry(id).or_default();
        debug!(node_id = %id, "created node");
        record_operation();
        Ok(node)
    }

    pub fn get_node(&self, id: NodeId) -> Result<Node> {
        self.check_open()?;
        let indices = self.indices.read();
        indices
            .nodes_by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| GraphError::not_found(format!("node {id}")))
    }

    pub fn update_node(&self, id: NodeId, mutator: impl FnOnce(&mut Node)) -> Result<()> {
        self.check_open()?;
        let mut indices = self.indices.write();
        let node = match indices.nodes_by_id.get_mut(&id) {
            Some(node) => node,
            None => {
                record_error();
                return Err(GraphError::not_found(format!("node {id}")));
            }
        };
        mutator(node);
        node.updated_at = chrono::Utc::now();
        debug!(node_id = %id, "updated node");
        record_operation();
        Ok(())
    }

    pub fn delete_node(&self, id: NodeId) -> Result<()> {
        self.check_open()?;
        let mut indices = self.indices.write();
        if !indices.nodes_by_id.contains_key(&id) {
            record_error();
            return Err(GraphError::not_found(format!("node {id}")));
        }
        let incident: Vec<EdgeId> = indices
            .outgoing
            .get(&id)
            .into_iter()
            .flatten()
            .chain(indices.incoming.get(&id).into_iter().flatten())
            .copied()
            .collect();
        for edge_id in incident {
            Self::remove_edge_from_indices(&mut indices, edge_id);
        }
        indices.nodes_by_id.remove(&id);
        indices.outgoing.remove(&id);
        indices.incoming.remove(&id);
        debug!(node_id = %id, "deleted node and incident edges");
        record_operation();
        Ok(())
    }

    fn remove_edge_from_indices(indices: &mut Indices, edge_id: EdgeId) {
        let Some(edge) = indices.edges_by_id.remove(&edge_id) else {
            return;
        };
        if let Some(list) = indices.outgoing.get_mut(&edge.from_node_id) {
            list.retain(|e| *e != edge_id);
        }
        if let Some(list) = indices.incoming.get_mut(&edge.to_node_id) {
            list.retain(|e| *e != edge_id);
        }
    }

    pub fn create_edge(
        &self,
        from: NodeId,
        to: NodeId,
        edge_type: impl Into<String>,
        properties: HashMap<String, Value>,
        weight: f64,
    ) -> Result<Edge> {
        self.check_open()?;
        let edge_type = edge_type.into();
        if let Err(err) = ValidationContext::new("create_edge")
            .with_attribute("from", from.to_string())
            .with_attribute("to", to.to_string())
            .validate(!edge_type.is_empty(), "edge type must not be empty")
        {
            warn!("rejected edge creation with empty type");
            record_error();
            return Err(err);
        }
        let mut indices = self.indices.write();
        if !indices.nodes_by_id.contains_key(&from) {
            record_error();
            return Err(GraphError::not_found(format!("node {from}")));
        }
        if !indices.nodes_by_id.contains_key(&to) {
            record_error();
            return Err(GraphError::not_found(format!("node {to}")));
        }
        let id = EdgeId::new(self.next_edge_id.fetch_add(1, Ordering::Relaxed));
        let edge = Edge::new(id, from, to, edge_type, properties, weight);
        indices.edges_by_id.insert(id, edge.clone());
        indices.outgoing.entry(from).or_default().push(id);
        indices.incoming.entry(to).or_default().push(id);
        debug!(edge_id = %id, from = %from, to = %to, "created edge");
        record_operation();
        Ok(edge)
    }

    pub fn get_edge(&self, id: EdgeId) -> Result<Edge> {
        self.check_open()?;
        let indices = self.indices.read();
        indices
            .edges_by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| GraphError::not_found(format!("edge {id}")))
    }

    pub fn delete_edge(&self, id: EdgeId) -> Result<()> {
        self.check_open()?;
        let mut indices = self.indices.write();
        if !indices.edges_by_id.contains_key(&id) {
            record_error();
            return Err(GraphError::not_found(format!("edge {id}")));
        }
        Self::remove_edge_from_indices(&mut indices, id);
        debug!(edge_id = %id, "deleted edge");
        record_operation();
        Ok(())
    }

    /// Returns a snapshot of outgoing edges for `id`. An unknown node yields
    /// `NotFound` rather than an empty sequence — traversal code is expected
    /// to demote that error to "no edges" and bump
    /// `Statistics.adjacency_errors_skipped` (spec §4.1, §9).
    pub fn outgoing_edges(&self, id: NodeId) -> Result<Vec<Edge>> {
        self.check_open()?;
        let indices = self.indices.read();
        let edge_ids = indices
            .outgoing
            .get(&id)
            .ok_or_else(|| GraphError::not_found(format!("node {id}")))?;
        Ok(edge_ids
            .iter()
            .filter_map(|eid| indices.edges_by_id.get(eid).cloned())
            .collect())
    }

    pub fn incoming_edges(&self, id: NodeId) -> Result<Vec<Edge>> {
        self.check_open()?;
        let indices = self.indices.read();
        let edge_ids = indices
            .incoming
            .get(&id)
            .ok_or_else(|| GraphError::not_found(format!("node {id}")))?;
        Ok(edge_ids
            .iter()
            .filter_map(|eid| indices.edges_by_id.get(eid).cloned())
            .collect())
    }

    pub(crate) fn note_adjacency_error_skipped(&self) {
        self.adjacency_errors_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_query(&self, elapsed: std::time::Duration) {
        self.query_timing.record(elapsed);
    }

    pub fn statistics(&self) -> Statistics {
        let indices = self.indices.read();
        Statistics {
            node_count: indices.nodes_by_id.len(),
            edge_count: indices.edges_by_id.len(),
            total_queries: self.query_timing.total(),
            avg_query_time: self.query_timing.average(),
            adjacency_errors_skipped: self.adjacency_errors_skipped.load(Ordering::Relaxed),
        }
    }

    /// Releases in-memory state. Assumes any traverser over this storage has
    /// already been closed (spec.md §3 lifecycle).
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let mut indices = self.indices.write();
        indices.nodes_by_id.clear();
        indices.edges_by_id.clear();
        indices.outgoing.clear();
        indices.incoming.clear();
        debug!("closed graph storage");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_storage() -> GraphStorage {
        let dir = tempdir().unwrap();
        let path = dir.path().to_path_buf();
        std::mem::forget(dir);
        let config = GraphStorageConfig::builder().data_dir(path).build().unwrap();
        GraphStorage::open(config).unwrap()
    }

    #[test]
    fn id_monotonicity() {
        let storage = open_storage();
        let n1 = storage.create_node(vec![], HashMap::new()).unwrap();
        let n2 = storage.create_node(vec![], HashMap::new()).unwrap();
        assert!(n2.id.get() > n1.id.get());
    }

    #[test]
    fn adjacency_closure() {
        let storage = open_storage();
        let a = storage.create_node(vec![], HashMap::new()).unwrap();
        let b = storage.create_node(vec![], HashMap::new()).unwrap();
        storage
            .create_edge(a.id, b.id, "knows", HashMap::new(), 1.0)
            .unwrap();
        let out = storage.outgoing_edges(a.id).unwrap();
        assert!(out.iter().any(|e| e.to_node_id == b.id && e.edge_type == "knows"));
        let inc = storage.incoming_edges(b.id).unwrap();
        assert!(inc.iter().any(|e| e.from_node_id == a.id && e.edge_type == "knows"));
    }

    #[test]
    fn delete_completeness() {
        let storage = open_storage();
        let a = storage.create_node(vec![], HashMap::new()).unwrap();
        let b = storage.create_node(vec![], HashMap::new()).unwrap();
        let edge = storage
            .create_edge(a.id, b.id, "knows", HashMap::new(), 1.0)
            .unwrap();
        storage.delete_node(a.id).unwrap();
        assert!(storage.get_edge(edge.id).is_err());
        assert!(storage.incoming_edges(b.id).unwrap().is_empty());
    }

    #[test]
    fn create_edge_rejects_empty_type() {
        let storage = open_storage();
        let a = storage.create_node(vec![], HashMap::new()).unwrap();
        let b = storage.create_node(vec![], HashMap::new()).unwrap();
        let err = storage.create_edge(a.id, b.id, "", HashMap::new(), 1.0).unwrap_err();
        assert!(matches!(err, GraphError::Validation(_)));
    }

    #[test]
    fn create_edge_rejects_missing_endpoint() {
        let storage = open_storage();
        let a = storage.create_node(vec![], HashMap::new()).unwrap();
        let bogus = NodeId::new(a.id.get() + 1000);
        let err = storage
            .create_edge(a.id, bogus, "knows", HashMap::new(), 1.0)
            .unwrap_err();
        assert!(matches!(err, GraphError::NotFound(_)));
    }

    #[test]
    fn operations_after_close_are_errors() {
        let storage = open_storage();
        storage.close();
        assert!(storage.create_node(vec![], HashMap::new()).is_err());
    }

    #[test]
    fn self_loops_and_parallel_edges_permitted() {
        let storage = open_storage();
        let a = storage.create_node(vec![], HashMap::new()).unwrap();
        storage.create_edge(a.id, a.id, "self", HashMap::new(), 1.0).unwrap();
        storage.create_edge(a.id, a.id, "self", HashMap::new(), 1.0).unwrap();
        assert_eq!(storage.outgoing_edges(a.id).unwrap().len(), 2);
    }
}
