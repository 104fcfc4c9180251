//! Fingerprint store: skip decisions, batching, subtree markers, resets.

use ledgerscan::ResetScope;
use ledgerscan::engine::FingerprintStore;
use ledgerscan::utils::DB_INSERT_BATCH_SIZE;

#[test]
fn test_lookup_missing() {
    let store = FingerprintStore::open_in_memory().unwrap();
    assert_eq!(store.lookup("/a").unwrap(), None);
    assert!(!store.should_skip("/a", 1, 1).unwrap());
}

#[test]
fn test_should_skip_exact_match_only() {
    let mut store = FingerprintStore::open_in_memory().unwrap();
    store.upsert("/a", 100, 5_000, 1).unwrap();
    assert!(store.should_skip("/a", 100, 5_000).unwrap());
    assert!(!store.should_skip("/a", 101, 5_000).unwrap());
    assert!(!store.should_skip("/a", 100, 5_001).unwrap());
    assert!(!store.should_skip("/b", 100, 5_000).unwrap());
}

#[test]
fn test_pending_visible_before_flush() {
    let mut store = FingerprintStore::open_in_memory().unwrap();
    store.upsert("/a", 1, 2, 3).unwrap();
    assert_eq!(store.pending_len(), 1);
    assert_eq!(store.entry_count().unwrap(), 0);
    let e = store.lookup("/a").unwrap().unwrap();
    assert_eq!((e.size, e.mtime_ns, e.written_ms), (1, 2, 3));

    assert_eq!(store.flush().unwrap(), 1);
    assert_eq!(store.pending_len(), 0);
    assert_eq!(store.entry_count().unwrap(), 1);
    assert_eq!(store.lookup("/a").unwrap().unwrap().size, 1);
}

#[test]
fn test_upsert_replaces() {
    let mut store = FingerprintStore::open_in_memory().unwrap();
    store.upsert("/a", 1, 1, 1).unwrap();
    store.flush().unwrap();
    store.upsert("/a", 2, 2, 2).unwrap();
    store.flush().unwrap();
    assert_eq!(store.entry_count().unwrap(), 1);
    assert!(store.should_skip("/a", 2, 2).unwrap());
    assert!(!store.should_skip("/a", 1, 1).unwrap());
}

#[test]
fn test_full_batch_is_signalled_not_flushed() {
    let mut store = FingerprintStore::open_in_memory().unwrap();
    for i in 0..DB_INSERT_BATCH_SIZE {
        assert!(!store.batch_full());
        store.upsert(&format!("/f{i}"), i as u64, 0, 0).unwrap();
    }
    assert!(store.batch_full());
    assert_eq!(store.pending_len(), DB_INSERT_BATCH_SIZE);
    assert_eq!(store.entry_count().unwrap(), 0);
    assert_eq!(store.flush().unwrap(), DB_INSERT_BATCH_SIZE);
    assert!(!store.batch_full());
}

#[test]
fn test_negative_mtime_round_trip() {
    let mut store = FingerprintStore::open_in_memory().unwrap();
    store.upsert("/old", 7, -1_000_000, 0).unwrap();
    store.flush().unwrap();
    assert!(store.should_skip("/old", 7, -1_000_000).unwrap());
}

#[test]
fn test_subtree_markers() {
    let mut store = FingerprintStore::open_in_memory().unwrap();
    assert!(!store.is_subtree_finished("alpha").unwrap());
    assert_eq!(store.subtree_progress("alpha").unwrap(), None);

    store.upsert("/r/alpha/x", 1, 1, 1).unwrap();
    store.mark_subtree_finished("alpha", 1_700_000_000).unwrap();
    assert!(store.is_subtree_finished("alpha").unwrap());
    assert!(!store.is_subtree_finished("beta").unwrap());
    let p = store.subtree_progress("alpha").unwrap().unwrap();
    assert_eq!(p.root, "alpha");
    assert_eq!(p.finished_ts, Some(1_700_000_000));
    // Marking finished flushes pending fingerprints first.
    assert_eq!(store.pending_len(), 0);
    assert_eq!(store.entry_count().unwrap(), 1);
}

#[test]
fn test_reset_selected_subtrees_keeps_fingerprints() {
    let mut store = FingerprintStore::open_in_memory().unwrap();
    store.upsert("/r/alpha/x", 1, 1, 1).unwrap();
    store.mark_subtree_finished("alpha", 1).unwrap();
    store.mark_subtree_finished("beta", 1).unwrap();

    store
        .reset(&ResetScope::Subtrees(vec!["alpha".to_string()]))
        .unwrap();
    assert!(!store.is_subtree_finished("alpha").unwrap());
    assert!(store.is_subtree_finished("beta").unwrap());
    assert!(store.should_skip("/r/alpha/x", 1, 1).unwrap());
}

#[test]
fn test_reset_all() {
    let mut store = FingerprintStore::open_in_memory().unwrap();
    store.upsert("/a", 1, 1, 1).unwrap();
    store.mark_subtree_finished("alpha", 1).unwrap();
    store.upsert("/b", 1, 1, 1).unwrap();

    store.reset(&ResetScope::All).unwrap();
    assert_eq!(store.entry_count().unwrap(), 0);
    assert_eq!(store.pending_len(), 0);
    assert!(!store.should_skip("/a", 1, 1).unwrap());
    assert!(!store.should_skip("/b", 1, 1).unwrap());
    assert!(!store.is_subtree_finished("alpha").unwrap());
}

#[test]
fn test_file_store_persists_after_close() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("state.sqlite");
    {
        let mut store = FingerprintStore::open(&path).unwrap();
        store.upsert("/a", 10, 20, 30).unwrap();
        store.mark_subtree_finished("alpha", 5).unwrap();
        store.upsert("/b", 1, 1, 1).unwrap();
        store.close().unwrap();
    }
    let store = FingerprintStore::open(&path).unwrap();
    assert!(store.should_skip("/a", 10, 20).unwrap());
    assert!(store.should_skip("/b", 1, 1).unwrap());
    assert!(store.is_subtree_finished("alpha").unwrap());
}

#[test]
fn test_unflushed_batch_lost_on_drop() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.sqlite");
    {
        let mut store = FingerprintStore::open(&path).unwrap();
        store.upsert("/kept", 1, 1, 1).unwrap();
        store.flush().unwrap();
        store.upsert("/in_flight", 1, 1, 1).unwrap();
        // Dropped without flush: simulates a crash between checkpoints.
    }
    let store = FingerprintStore::open(&path).unwrap();
    assert!(store.should_skip("/kept", 1, 1).unwrap());
    assert!(!store.should_skip("/in_flight", 1, 1).unwrap());
}

#[test]
fn test_shrink_memory() {
    let mut store = FingerprintStore::open_in_memory().unwrap();
    store.upsert("/a", 1, 1, 1).unwrap();
    store.shrink_memory().unwrap();
    assert!(store.should_skip("/a", 1, 1).unwrap());
}
