use std::collections::HashMap;

use pretty_assertions::assert_eq;
use vertexdb::{GraphError, GraphStorage, GraphStorageConfig};

fn open_storage() -> GraphStorage {
    let dir = tempfile::tempdir().unwrap();
    let config = GraphStorageConfig::builder()
        .data_dir(dir.path().to_path_buf())
        .build()
        .unwrap();
    let storage = GraphStorage::open(config).unwrap();
    std::mem::forget(dir);
    storage
}

#[test]
fn open_creates_missing_data_dir() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("nested").join("graph");
    let config = GraphStorageConfig::builder().data_dir(nested.clone()).build().unwrap();
    GraphStorage::open(config).unwrap();
    assert!(nested.is_dir());
}

#[test]
fn update_node_advances_updated_at() {
    let storage = open_storage();
    let node = storage.create_node(vec!["Person".into()], HashMap::new()).unwrap();
    let before = node.updated_at;
    std::thread::sleep(std::time::Duration::from_millis(5));
    storage
        .update_node(node.id, |n| {
            n.labels.push("Employee".to_string());
        })
        .unwrap();
    let updated = storage.get_node(node.id).unwrap();
    assert!(updated.updated_at > before);
    assert_eq!(updated.labels, vec!["Person".to_string(), "Employee".to_string()]);
}

#[test]
fn get_missing_node_is_not_found() {
    let storage = open_storage();
    let node = storage.create_node(vec![], HashMap::new()).unwrap();
    storage.delete_node(node.id).unwrap();
    let err = storage.get_node(node.id).unwrap_err();
    assert!(matches!(err, GraphError::NotFound(_)));
}

#[test]
fn statistics_reflect_node_and_edge_counts() {
    let storage = open_storage();
    let a = storage.create_node(vec![], HashMap::new()).unwrap();
    let b = storage.create_node(vec![], HashMap::new()).unwrap();
    storage.create_edge(a.id, b.id, "knows", HashMap::new(), 1.0).unwrap();

    let stats = storage.statistics();
    assert_eq!(stats.node_count, 2);
    assert_eq!(stats.edge_count, 1);
}

#[test]
fn deleting_edge_removes_it_from_both_adjacency_lists() {
    let storage = open_storage();
    let a = storage.create_node(vec![], HashMap::new()).unwrap();
    let b = storage.create_node(vec![], HashMap::new()).unwrap();
    let edge = storage.create_edge(a.id, b.id, "knows", HashMap::new(), 1.0).unwrap();

    storage.delete_edge(edge.id).unwrap();

    assert!(storage.outgoing_edges(a.id).unwrap().is_empty());
    assert!(storage.incoming_edges(b.id).unwrap().is_empty());
}

#[test]
fn concurrent_node_creation_never_collides_on_id() {
    use std::sync::Arc;
    use std::thread;

    let storage = Arc::new(open_storage());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let storage = Arc::clone(&storage);
            thread::spawn(move || {
                let mut ids = Vec::with_capacity(50);
                for _ in 0..50 {
                    ids.push(storage.create_node(vec![], HashMap::new()).unwrap().id);
                }
                ids
            })
        })
        .collect();

    let mut all_ids = Vec::new();
    for handle in handles {
        all_ids.extend(handle.join().unwrap());
    }

    let unique: std::collections::HashSet<_> = all_ids.iter().collect();
    assert_eq!(unique.len(), all_ids.len());
}
