//! Integration tests for the frontier store shared between connections
//!
//! Each thread opens its own connection to the same database file, the way
//! separate crawler processes would.

use social_ripple::state::{Direction, NodeStatus};
use social_ripple::storage::{open_storage, SqliteStorage, Storage};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

fn database(temp_dir: &TempDir) -> PathBuf {
    temp_dir.path().join("frontier.db")
}

#[test]
fn test_concurrent_claims_are_disjoint() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = database(&temp_dir);

    {
        let mut storage = SqliteStorage::new(&db_path).unwrap();
        for i in 0..60 {
            storage.seed(&format!("user-{:02}", i), None).unwrap();
        }
    }

    let workers = 4;
    let barrier = Arc::new(Barrier::new(workers));
    let handles: Vec<_> = (0..workers)
        .map(|_| {
            let db_path = db_path.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let mut storage = SqliteStorage::new(&db_path).unwrap();
                barrier.wait();

                let mut claimed = Vec::new();
                loop {
                    let batch = storage.claim_batch(7, 3).unwrap();
                    if batch.is_empty() {
                        break;
                    }
                    claimed.extend(batch.into_iter().map(|node| node.username));
                }
                claimed
            })
        })
        .collect();

    let mut seen = HashSet::new();
    let mut total = 0;
    for handle in handles {
        for username in handle.join().unwrap() {
            total += 1;
            assert!(seen.insert(username.clone()), "{} claimed twice", username);
        }
    }

    assert_eq!(total, 60);
    assert_eq!(seen.len(), 60);

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.count_nodes_by_status(NodeStatus::Processing).unwrap(), 60);
    assert_eq!(storage.count_nodes_by_status(NodeStatus::Pending).unwrap(), 0);
}

#[test]
fn test_concurrent_discovery_keeps_best_priority() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = database(&temp_dir);
    let parents = [("p1", 10.0), ("p2", 40.0), ("p3", 20.0), ("p4", 30.0)];

    {
        let mut storage = SqliteStorage::new(&db_path).unwrap();
        for (parent, rating) in parents {
            storage.seed(parent, Some(rating)).unwrap();
        }
    }

    let barrier = Arc::new(Barrier::new(parents.len()));
    let handles: Vec<_> = parents
        .iter()
        .map(|&(parent, rating)| {
            let db_path = db_path.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let mut storage = SqliteStorage::new(&db_path).unwrap();
                barrier.wait();
                storage
                    .discover(
                        parent,
                        rating,
                        Direction::Following,
                        &["shared".to_string(), format!("{}-only", parent)],
                        None,
                    )
                    .unwrap()
            })
        })
        .collect();

    let created: usize = handles
        .into_iter()
        .map(|handle| handle.join().unwrap().created)
        .sum();

    // One shared child plus one private child per parent
    assert_eq!(created, 5);

    let storage = SqliteStorage::new(&db_path).unwrap();
    let shared = storage.get_node("shared").unwrap().unwrap();
    assert_eq!(shared.depth, 1);
    assert_eq!(shared.status, NodeStatus::Pending);
    assert_eq!(shared.priority, 60.0);

    let lineage = storage.get_lineage("shared").unwrap();
    let parents_seen: Vec<&str> = lineage.iter().map(|entry| entry.parent.as_str()).collect();
    assert_eq!(parents_seen, vec!["p1", "p2", "p3", "p4"]);
    assert_eq!(storage.best_lineage_rating("shared").unwrap(), Some(40.0));
}

#[test]
fn test_frontier_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = database(&temp_dir);

    {
        let mut storage = SqliteStorage::new(&db_path).unwrap();
        storage.seed("alice", Some(90.0)).unwrap();
        let claimed = storage.claim_batch(10, 2).unwrap();
        assert_eq!(claimed.len(), 1);
        storage
            .discover("alice", 90.0, Direction::Following, &["bob".to_string()], None)
            .unwrap();
    }

    let mut storage = open_storage(&db_path).unwrap();
    assert_eq!(storage.count_total_nodes().unwrap(), 2);

    // Alice is still claimed by the dead connection; only bob is claimable
    let claimed = storage.claim_batch(10, 2).unwrap();
    let names: Vec<&str> = claimed.iter().map(|node| node.username.as_str()).collect();
    assert_eq!(names, vec!["bob"]);
    assert_eq!(claimed[0].priority, 135.0);
}
