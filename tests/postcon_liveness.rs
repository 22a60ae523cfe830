//! Post-Construction Liveness Tests
//!
//! The engine's correctness contract: after finalize, the new index
//! equals the index function evaluated over every primary row present
//! at finalize time, no matter which writes raced the build. Interrupts
//! leave the queue file on disk; finalize removes it.

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use scatterdb::postcon::spawn_post_construction;
use scatterdb::region::StoreKey;
use scatterdb::store::Store;

use common::MemStore;

fn seed_rows(store: &MemStore, names: &[&str]) {
    for name in names {
        store.write_row(
            StoreKey::from(*name),
            Some(json!({"id": name, "field": format!("v_{name}")})),
        );
    }
}

fn queue_files(dir: &TempDir) -> Vec<String> {
    std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("post_construction_"))
        .collect()
}

/// Build over a quiet table: the finished index covers every row and is
/// marked ready, the queue is deregistered, and its file is gone.
#[test]
fn test_build_over_quiet_table() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemStore::new(dir.path()));
    seed_rows(&store, &["a", "b", "c"]);
    let index_id = store.add_index("by_field", "field");

    let handle = spawn_post_construction(&store, BTreeSet::from([index_id]), &()).unwrap();
    handle.join().unwrap();

    assert!(store.index_ready(index_id));
    assert_eq!(store.index_entries(index_id), store.expected_entries(index_id));
    assert_eq!(store.registered_queue_count(), 0);
    assert!(queue_files(&dir).is_empty());
}

/// The liveness scenario: start a build over {A, B, C}; concurrently
/// write D, update A, delete B. At finalize the index reflects
/// {A', C, D}.
#[test]
fn test_build_with_concurrent_writes() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemStore::new(dir.path()));
    seed_rows(&store, &["a", "b", "c"]);
    let index_id = store.add_index("by_field", "field");

    let handle = spawn_post_construction(&store, BTreeSet::from([index_id]), &()).unwrap();

    // Every one of these commits after queue registration, so each must
    // reach the new index through the scan, the queue, or both.
    store.write_row(StoreKey::from("d"), Some(json!({"id": "d", "field": "v_d"})));
    store.write_row(
        StoreKey::from("a"),
        Some(json!({"id": "a", "field": "v_a_updated"})),
    );
    store.write_row(StoreKey::from("b"), None);

    handle.join().unwrap();

    assert!(store.index_ready(index_id));
    let entries = store.index_entries(index_id);
    assert_eq!(entries, store.expected_entries(index_id));

    let keys: Vec<String> = entries.keys().map(|k| k.to_string()).collect();
    assert_eq!(keys, ["a", "c", "d"]);
    assert_eq!(
        entries[&StoreKey::from("a")],
        scatterdb::region::encode_primary(&json!("v_a_updated"))
    );
}

/// Writes that land after finalize flow through the ready index's
/// normal write path and stay consistent.
#[test]
fn test_writes_after_finalize() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemStore::new(dir.path()));
    seed_rows(&store, &["a", "b"]);
    let index_id = store.add_index("by_field", "field");

    let handle = spawn_post_construction(&store, BTreeSet::from([index_id]), &()).unwrap();
    handle.join().unwrap();

    store.write_row(StoreKey::from("z"), Some(json!({"id": "z", "field": "v_z"})));
    store.write_row(StoreKey::from("a"), None);

    assert_eq!(store.index_entries(index_id), store.expected_entries(index_id));
}

/// Draining the store interrupts the build: the registration is removed
/// by the emergency path, the index never becomes ready, and the queue
/// file is left on disk for the store to reclaim at next open.
#[test]
fn test_drain_interrupts_build() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemStore::with_held_scans(dir.path()));
    seed_rows(&store, &["a", "b", "c"]);
    let index_id = store.add_index("by_field", "field");

    let handle = spawn_post_construction(&store, BTreeSet::from([index_id]), &()).unwrap();
    // Catch the task mid-scan, then pull the store out from under it.
    store.wait_for_scan();
    store.drainer().drain();
    handle.join().unwrap();

    assert!(!store.index_ready(index_id));
    assert_eq!(store.registered_queue_count(), 0);
    assert_eq!(queue_files(&dir).len(), 1, "queue file must survive interrupt");
}

/// Dropping every target index mid-build ends the task cleanly: the
/// queue is deregistered the standard way and its file is removed.
#[test]
fn test_all_indexes_dropped_mid_build() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemStore::new(dir.path()));
    seed_rows(&store, &["a", "b", "c"]);
    let index_id = store.add_index("by_field", "field");

    // Drop the index before spawning; the drain loop's first access
    // acquisition comes back empty and the task winds down.
    store.inner.lock().unwrap().indexes.clear();

    let handle = spawn_post_construction(&store, BTreeSet::from([index_id]), &()).unwrap();
    handle.join().unwrap();

    assert_eq!(store.registered_queue_count(), 0);
    assert!(queue_files(&dir).is_empty());
}

/// Two concurrent builds over different indexes both finalize; the
/// backfill-postcon line admits any number of post-constructions.
#[test]
fn test_concurrent_builds() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemStore::new(dir.path()));
    seed_rows(&store, &["a", "b", "c", "d"]);
    let first = store.add_index("by_field", "field");
    let second = store.add_index("by_id", "id");

    let h1 = spawn_post_construction(&store, BTreeSet::from([first]), &()).unwrap();
    let h2 = spawn_post_construction(&store, BTreeSet::from([second]), &()).unwrap();
    store.write_row(StoreKey::from("e"), Some(json!({"id": "e", "field": "v_e"})));
    h1.join().unwrap();
    h2.join().unwrap();

    for id in [first, second] {
        assert!(store.index_ready(id));
        assert_eq!(store.index_entries(id), store.expected_entries(id));
    }
    assert_eq!(store.registered_queue_count(), 0);
}

/// A drained store refuses new build tasks outright.
#[test]
fn test_no_build_after_drain() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemStore::new(dir.path()));
    let index_id = store.add_index("by_field", "field");
    store.drainer().drain();

    let result = spawn_post_construction(&store, BTreeSet::from([index_id]), &());
    assert!(result.is_err());
}

/// Re-running a build over an index that already has entries converges
/// to the same state: index updates are idempotent.
#[test]
fn test_rebuild_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemStore::new(dir.path()));
    seed_rows(&store, &["a", "b", "c"]);
    let index_id = store.add_index("by_field", "field");

    let first = spawn_post_construction(&store, BTreeSet::from([index_id]), &()).unwrap();
    first.join().unwrap();
    let after_first = store.index_entries(index_id);

    let second = spawn_post_construction(&store, BTreeSet::from([index_id]), &()).unwrap();
    second.join().unwrap();

    assert_eq!(store.index_entries(index_id), after_first);
    assert!(queue_files(&dir).is_empty());
}
