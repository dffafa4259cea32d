//! BFS, adaptive-parallel DFS, and BFS-based shortest path over
//! [`GraphStorage`], fanned out across a [`WorkerPool`].

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{unbounded, Sender};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::error;

use crate::error::{GraphError, Result};
use crate::model::{Edge, NodeId};
use crate::pool::{WaitGroup, WorkerPool};
use crate::storage::GraphStorage;

/// Out-degree above which DFS schedules children as independent tasks
/// instead of recursing inline (spec.md §4.3.2 "design value: 10").
const DFS_PARALLEL_THRESHOLD: usize = 10;

/// Reads `node`'s outgoing edges, demoting a `NotFound` to "no edges" (and
/// bumping `Statistics.adjacency_errors_skipped`) while latching a `Closed`
/// error into `hard_failure` so the whole traversal call can abort with it.
fn read_outgoing_or_skip(
    storage: &GraphStorage,
    node: NodeId,
    hard_failure: &Mutex<Option<GraphError>>,
) -> Vec<Edge> {
    match storage.outgoing_edges(node) {
        Ok(edges) => edges,
        Err(err @ GraphError::Closed(_)) => {
            let mut guard = hard_failure.lock();
            if guard.is_none() {
                *guard = Some(err);
            }
            Vec::new()
        }
        Err(_) => {
            storage.note_adjacency_error_skipped();
            Vec::new()
        }
    }
}

fn latch_pool_closed(hard_failure: &Mutex<Option<GraphError>>) {
    let mut guard = hard_failure.lock();
    if guard.is_none() {
        *guard = Some(GraphError::Closed("WorkerPool"));
    }
}

/// Partitions `frontier` into at most `workers` chunks, each of size
/// `ceil(len / chunk_count)`, matching spec.md §4.3.1's partitioning rule.
fn partition(frontier: &[NodeId], workers: usize) -> Vec<Vec<NodeId>> {
    if frontier.is_empty() {
        return Vec::new();
    }
    let chunk_count = workers.min(frontier.len()).max(1);
    let chunk_size = frontier.len().div_ceil(chunk_count).max(1);
    frontier.chunks(chunk_size).map(|c| c.to_vec()).collect()
}

/// Owns a [`WorkerPool`] and exposes read-only traversal primitives over a
/// shared [`GraphStorage`]. No component below the traverser is aware of it.
pub struct ParallelTraverser {
    storage: Arc<GraphStorage>,
    pool: Arc<WorkerPool>,
    workers: usize,
}

impl ParallelTraverser {
    /// `workers <= 0` defaults to the machine's logical CPU count.
    pub fn new(storage: Arc<GraphStorage>, workers: i64) -> Result<Self> {
        let effective = if workers <= 0 {
            num_cpus::get() as i64
        } else {
            workers
        };
        let pool = Arc::new(WorkerPool::new(effective)?);
        Ok(Self {
            storage,
            pool,
            workers: effective.max(1) as usize,
        })
    }

    /// Releases the owned worker pool. The underlying storage is not
    /// affected — it may outlive several traversers.
    pub fn close(&self) {
        self.pool.close();
    }

    /// Level-synchronous breadth-first traversal. Start nodes are marked
    /// visited but never appear in the result (spec.md §4.3.1).
    pub fn bfs(&self, start_nodes: &[NodeId], max_depth: u32) -> Result<Vec<NodeId>> {
        let began = Instant::now();
        if start_nodes.is_empty() || max_depth == 0 {
            self.storage.record_query(began.elapsed());
            return Ok(Vec::new());
        }

        let visited: Arc<DashMap<NodeId, ()>> = Arc::new(DashMap::new());
        for &n in start_nodes {
            visited.insert(n, ());
        }
        let hard_failure: Arc<Mutex<Option<GraphError>>> = Arc::new(Mutex::new(None));

        let mut result = Vec::new();
        let mut frontier: Vec<NodeId> = start_nodes.to_vec();
        let mut depth = 0u32;

        while depth < max_depth && !frontier.is_empty() {
            let chunks = partition(&frontier, self.workers);
            let wg = WaitGroup::new();
            wg.add(chunks.len());
            let next_level: Arc<Mutex<Vec<NodeId>>> = Arc::new(Mutex::new(Vec::new()));

            for chunk in chunks {
                let storage = Arc::clone(&self.storage);
                let next_level = Arc::clone(&next_level);
                let visited = Arc::clone(&visited);
                let hard_failure = Arc::clone(&hard_failure);
                let wg_task = wg.clone_handle();
                let submitted = self.pool.submit(move || {
                    let mut local_next = Vec::new();
                    for node in chunk {
                        let edges = read_outgoing_or_skip(&storage, node, &hard_failure);
                        for edge in edges {
                            let d = edge.to_node_id;
                            if visited.insert(d, ()).is_none() {
                                local_next.push(d);
                            }
                        }
                    }
                    next_level.lock().extend(local_next);
                    wg_task.done();
                });
                if !submitted {
                    latch_pool_closed(&hard_failure);
                    wg.done();
                }
            }
            wg.wait();

            if let Some(err) = hard_failure.lock().take() {
                return Err(err);
            }

            depth += 1;
            let next = std::mem::take(&mut *next_level.lock());
            result.extend(next.iter().copied());
            frontier = next;
        }

        self.storage.record_query(began.elapsed());
        Ok(result)
    }

    /// Adaptive-parallelism depth-first reachability scan. Not a classical
    /// pre-order DFS once any branch crosses [`DFS_PARALLEL_THRESHOLD`] —
    /// see [`ParallelTraverser::dfs_sequential`] for that guarantee.
    pub fn dfs(&self, start_node: NodeId, max_depth: u32) -> Result<Vec<NodeId>> {
        let began = Instant::now();
        let (tx, rx) = unbounded::<NodeId>();
        let visited: Arc<DashMap<NodeId, ()>> = Arc::new(DashMap::new());
        let hard_failure: Arc<Mutex<Option<GraphError>>> = Arc::new(Mutex::new(None));

        let wg = WaitGroup::new();
        wg.add(1);
        Self::dfs_task(
            Arc::clone(&self.storage),
            Arc::clone(&self.pool),
            start_node,
            0,
            max_depth,
            visited,
            tx.clone(),
            Arc::clone(&hard_failure),
            wg.clone_handle(),
        );
        wg.wait();
        drop(tx);

        if let Some(err) = hard_failure.lock().take() {
            return Err(err);
        }

        let result: Vec<NodeId> = rx.try_iter().collect();
        self.storage.record_query(began.elapsed());
        Ok(result)
    }

    /// Dispatches a fan-out branch's children. The over-threshold case
    /// spawns a raw OS thread per child rather than resubmitting to `pool`:
    /// `dfs_task` may itself be running *inside* a pool-submitted closure,
    /// and `WorkerPool::submit` blocks the caller once the bounded queue is
    /// full, so resubmitting to the same fixed pool from within it can
    /// deadlock every worker against a full queue with no one left to drain
    /// it. Raw threads have no such shared capacity limit to exhaust.
    #[allow(clippy::too_many_arguments)]
    fn dfs_task(
        storage: Arc<GraphStorage>,
        pool: Arc<WorkerPool>,
        node: NodeId,
        depth: u32,
        max_depth: u32,
        visited: Arc<DashMap<NodeId, ()>>,
        tx: Sender<NodeId>,
        hard_failure: Arc<Mutex<Option<GraphError>>>,
        wg: WaitGroup,
    ) {
        // Depth check precedes the visited check: a node at the exact depth
        // limit is never emitted (spec.md §4.3.2).
        if depth >= max_depth {
            wg.done();
            return;
        }
        if visited.insert(node, ()).is_some() {
            wg.done();
            return;
        }
        let _ = tx.send(node);

        let edges = read_outgoing_or_skip(&storage, node, &hard_failure);

        if edges.len() > DFS_PARALLEL_THRESHOLD {
            wg.add(edges.len());
            for edge in edges {
                let storage = Arc::clone(&storage);
                let pool_for_child = Arc::clone(&pool);
                let visited = Arc::clone(&visited);
                let tx = tx.clone();
                let hard_failure = Arc::clone(&hard_failure);
                let wg_task = wg.clone_handle();
                let child = edge.to_node_id;
                let spawned = std::thread::Builder::new().spawn(move || {
                    Self::dfs_task(
                        storage,
                        pool_for_child,
                        child,
                        depth + 1,
                        max_depth,
                        visited,
                        tx,
                        hard_failure,
                        wg_task,
                    );
                });
                if let Err(err) = spawned {
                    error!(%err, "failed to spawn dfs fan-out thread");
                    let mut guard = hard_failure.lock();
                    if guard.is_none() {
                        *guard = Some(GraphError::invariant(format!(
                            "failed to spawn dfs fan-out thread: {err}"
                        )));
                    }
                    drop(guard);
                    wg.done();
                }
            }
        } else {
            for edge in edges {
                Self::dfs_task(
                    Arc::clone(&storage),
                    Arc::clone(&pool),
                    edge.to_node_id,
                    depth + 1,
                    max_depth,
                    Arc::clone(&visited),
                    tx.clone(),
                    Arc::clone(&hard_failure),
                    wg.clone_handle(),
                );
            }
        }

        wg.done();
    }

    /// Single-threaded classical pre-order DFS, offered per spec.md §9
    /// ("strictly sequential DFS alternative") for callers that need
    /// deterministic ordering instead of `dfs`'s reachability-scan shape.
    pub fn dfs_sequential(&self, start_node: NodeId, max_depth: u32) -> Result<Vec<NodeId>> {
        let began = Instant::now();
        let mut visited = HashSet::new();
        let mut result = Vec::new();
        let mut hard_failure = None;
        self.dfs_sequential_visit(start_node, 0, max_depth, &mut visited, &mut result, &mut hard_failure);
        if let Some(err) = hard_failure {
            return Err(err);
        }
        self.storage.record_query(began.elapsed());
        Ok(result)
    }

    fn dfs_sequential_visit(
        &self,
        node: NodeId,
        depth: u32,
        max_depth: u32,
        visited: &mut HashSet<NodeId>,
        result: &mut Vec<NodeId>,
        hard_failure: &mut Option<GraphError>,
    ) {
        if hard_failure.is_some() || depth >= max_depth {
            return;
        }
        if !visited.insert(node) {
            return;
        }
        result.push(node);

        let edges = match self.storage.outgoing_edges(node) {
            Ok(edges) => edges,
            Err(err @ GraphError::Closed(_)) => {
                *hard_failure = Some(err);
                return;
            }
            Err(_) => {
                self.storage.note_adjacency_error_skipped();
                Vec::new()
            }
        };
        for edge in edges {
            self.dfs_sequential_visit(edge.to_node_id, depth + 1, max_depth, visited, result, hard_failure);
        }
    }

    /// BFS-based unweighted shortest path. Returns `GraphError::NotFound`
    /// if `end` is unreachable within `max_depth` edges.
    pub fn shortest_path(&self, start: NodeId, end: NodeId, max_depth: u32) -> Result<Vec<NodeId>> {
        let began = Instant::now();
        if start == end {
            self.storage.record_query(began.elapsed());
            return Ok(vec![start]);
        }

        let visited: Arc<DashMap<NodeId, ()>> = Arc::new(DashMap::new());
        visited.insert(start, ());
        let parent: Arc<DashMap<NodeId, NodeId>> = Arc::new(DashMap::new());
        let found = Arc::new(AtomicBool::new(false));
        let hard_failure: Arc<Mutex<Option<GraphError>>> = Arc::new(Mutex::new(None));

        let mut frontier = vec![start];
        let mut depth = 0u32;

        while depth < max_depth && !frontier.is_empty() {
            let chunks = partition(&frontier, self.workers);
            let wg = WaitGroup::new();
            wg.add(chunks.len());
            let next_level: Arc<Mutex<Vec<NodeId>>> = Arc::new(Mutex::new(Vec::new()));

            for chunk in chunks {
                let storage = Arc::clone(&self.storage);
                let visited = Arc::clone(&visited);
                let parent = Arc::clone(&parent);
                let found = Arc::clone(&found);
                let next_level = Arc::clone(&next_level);
                let hard_failure = Arc::clone(&hard_failure);
                let wg_task = wg.clone_handle();
                let submitted = self.pool.submit(move || {
                    let mut local_next = Vec::new();
                    for node in chunk {
                        let edges = read_outgoing_or_skip(&storage, node, &hard_failure);
                        for edge in edges {
                            let d = edge.to_node_id;
                            if visited.insert(d, ()).is_none() {
                                parent.insert(d, node);
                                if d == end {
                                    found.store(true, Ordering::Release);
                                }
                                local_next.push(d);
                            }
                        }
                    }
                    next_level.lock().extend(local_next);
                    wg_task.done();
                });
                if !submitted {
                    latch_pool_closed(&hard_failure);
                    wg.done();
                }
            }
            wg.wait();

            if let Some(err) = hard_failure.lock().take() {
                return Err(err);
            }

            depth += 1;
            if found.load(Ordering::Acquire) {
                let path = Self::reconstruct_path(&parent, start, end)?;
                self.storage.record_query(began.elapsed());
                return Ok(path);
            }
            frontier = std::mem::take(&mut *next_level.lock());
        }

        self.storage.record_query(began.elapsed());
        Err(GraphError::not_found(format!(
            "no path from {start} to {end} within depth {max_depth}"
        )))
    }

    /// Walks `parent` backward from `end` to `start`, then reverses.
    /// Absence of a parent mid-walk indicates a visited-without-parent race
    /// that the insert-then-store ordering should make impossible; it is
    /// treated as `NotFound` rather than panicking (spec.md §4.3.3).
    fn reconstruct_path(parent: &DashMap<NodeId, NodeId>, start: NodeId, end: NodeId) -> Result<Vec<NodeId>> {
        let mut path = vec![end];
        let mut current = end;
        while current != start {
            match parent.get(&current) {
                Some(p) => {
                    current = *p;
                    path.push(current);
                }
                None => {
                    return Err(GraphError::not_found(format!(
                        "no path from {start} to {end}"
                    )))
                }
            }
        }
        path.reverse();
        Ok(path)
    }
}
