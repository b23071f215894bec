//! End-to-end tests for the B+Tree engine through the storage contract.

use jparque_btree::BTreeEngine;
use jparque_storage::{FieldMap, Record, StorageEngine, Value};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tempfile::TempDir;

fn fields(pairs: &[(&str, Value)]) -> FieldMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn open(dir: &TempDir) -> BTreeEngine {
    BTreeEngine::open(&dir.path().join("tree.db")).unwrap()
}

#[test]
fn insert_read_and_missing_key() {
    let dir = TempDir::new().unwrap();
    let mut tree = open(&dir);

    let person = fields(&[
        ("name", Value::Str("John Doe".into())),
        ("age", Value::Int32(30)),
        ("email", Value::Str("john@example.com".into())),
    ]);
    tree.write(b"test-key", person.clone()).unwrap();

    assert_eq!(tree.read(b"test-key").unwrap(), Some(person));
    assert_eq!(tree.read(b"missing").unwrap(), None);
}

#[test]
fn overwrite_returns_most_recent_value() {
    let dir = TempDir::new().unwrap();
    let mut tree = open(&dir);

    tree.write(b"k", fields(&[("v", Value::Int32(1))])).unwrap();
    tree.write(b"k", fields(&[("v", Value::Int32(2))])).unwrap();
    // A different encoded size forces the delete-and-reinsert path.
    tree.write(
        b"k",
        fields(&[("v", Value::Str("a much longer replacement value".into()))]),
    )
    .unwrap();

    let got = tree.read(b"k").unwrap().unwrap();
    assert_eq!(
        got["v"],
        Value::Str("a much longer replacement value".into())
    );
    // The key must not be duplicated anywhere in the tree.
    let all = tree.scan(b"", None, None).unwrap();
    assert_eq!(all.len(), 1);
}

#[test]
fn range_scan_is_inclusive_and_ordered() {
    let dir = TempDir::new().unwrap();
    let mut tree = open(&dir);

    for i in 10..50 {
        let key = format!("key-{i:03}");
        tree.write(key.as_bytes(), fields(&[("index", Value::Int32(i))]))
            .unwrap();
    }

    let hits = tree.scan(b"key-020", Some(b"key-030"), None).unwrap();
    assert_eq!(hits.len(), 11);
    for (offset, record) in hits.iter().enumerate() {
        assert_eq!(record.key, format!("key-{:03}", 20 + offset).into_bytes());
        assert_eq!(record.fields["index"], Value::Int32(20 + offset as i32));
    }
}

#[test]
fn scan_projects_requested_columns() {
    let dir = TempDir::new().unwrap();
    let mut tree = open(&dir);

    tree.write(
        b"row",
        fields(&[
            ("field1", Value::Int32(1)),
            ("field2", Value::Int32(2)),
            ("field3", Value::Int32(3)),
            ("field4", Value::Int32(4)),
        ]),
    )
    .unwrap();

    let columns = vec!["field1".to_string(), "field3".to_string()];
    let hits = tree.scan(b"row", Some(b"row"), Some(&columns)).unwrap();
    assert_eq!(hits.len(), 1);
    let got = &hits[0].fields;
    assert_eq!(got.len(), 2);
    assert_eq!(got["field1"], Value::Int32(1));
    assert_eq!(got["field3"], Value::Int32(3));
    assert!(!got.contains_key("field2"));
    assert!(!got.contains_key("field4"));
}

#[test]
fn scan_crosses_leaf_boundaries() {
    let dir = TempDir::new().unwrap();
    let mut tree =
        BTreeEngine::open_with_page_size(&dir.path().join("small.db"), 256).unwrap();

    for i in 0..200 {
        let key = format!("k{i:04}");
        tree.write(key.as_bytes(), fields(&[("i", Value::Int32(i))]))
            .unwrap();
    }

    // A 256-byte page holds only a handful of entries, so this range
    // spans many leaves.
    let hits = tree.scan(b"k0010", Some(b"k0150"), None).unwrap();
    assert_eq!(hits.len(), 141);
    for (offset, record) in hits.iter().enumerate() {
        assert_eq!(record.key, format!("k{:04}", 10 + offset).into_bytes());
    }
}

#[test]
fn thousand_inserts_split_and_stay_reachable() {
    let dir = TempDir::new().unwrap();
    let mut tree = open(&dir);

    for i in 0..1000 {
        let key = format!("split-test-{i:04}");
        tree.write(key.as_bytes(), fields(&[("index", Value::Int32(i))]))
            .unwrap();
    }

    for i in (0..1000).step_by(50) {
        let key = format!("split-test-{i:04}");
        let got = tree.read(key.as_bytes()).unwrap().unwrap();
        assert_eq!(got["index"], Value::Int32(i));
    }

    // Every key must be reachable by descent from the current root, each
    // exactly once.
    for i in 0..1000 {
        let key = format!("split-test-{i:04}");
        assert!(tree.read(key.as_bytes()).unwrap().is_some(), "lost {key}");
    }
    let all = tree.scan(b"", None, None).unwrap();
    assert_eq!(all.len(), 1000);
    for window in all.windows(2) {
        assert!(window[0].key < window[1].key);
    }

    // Structural invariants after the split storm: every key in exactly
    // one leaf, sorted directories, uniform leaf depth.
    let stats = tree.verify().unwrap();
    assert_eq!(stats.entries, 1000);
    assert!(stats.leaf_pages > 1, "expected the root to have split");
    assert!(stats.branch_pages >= 1);
}

#[test]
fn deep_tree_with_small_pages() {
    let dir = TempDir::new().unwrap();
    let mut tree =
        BTreeEngine::open_with_page_size(&dir.path().join("deep.db"), 512).unwrap();

    let mut keys: Vec<u32> = (0..1000).collect();
    let mut rng = StdRng::seed_from_u64(7);
    keys.shuffle(&mut rng);

    for &i in &keys {
        let key = format!("key-{i:06}");
        tree.write(key.as_bytes(), fields(&[("i", Value::Int32(i as i32))]))
            .unwrap();
    }
    for &i in &keys {
        let key = format!("key-{i:06}");
        assert_eq!(
            tree.read(key.as_bytes()).unwrap().unwrap()["i"],
            Value::Int32(i as i32)
        );
    }
    assert_eq!(tree.scan(b"", None, None).unwrap().len(), 1000);

    let stats = tree.verify().unwrap();
    assert_eq!(stats.entries, 1000);
    assert!(
        stats.leaf_depth.unwrap() >= 3,
        "small pages should force a multi-level tree, got {stats:?}"
    );
}

#[test]
fn overflow_values_round_trip() {
    let dir = TempDir::new().unwrap();
    let mut tree = open(&dir);

    let big = "x".repeat(1_300_000);
    tree.write(b"large-value", fields(&[("blob", Value::Str(big.clone()))]))
        .unwrap();
    let got = tree.read(b"large-value").unwrap().unwrap();
    assert_eq!(got["blob"], Value::Str(big));

    let stats = tree.verify().unwrap();
    assert_eq!(stats.overflow_values, 1);
    assert!(stats.overflow_bytes > 1_300_000);

    // Overwrite with different large content.
    let other = "y".repeat(1_500_000);
    tree.write(
        b"large-value",
        fields(&[("blob", Value::Str(other.clone()))]),
    )
    .unwrap();
    let got = tree.read(b"large-value").unwrap().unwrap();
    assert_eq!(got["blob"], Value::Str(other));

    tree.delete(b"large-value").unwrap();
    assert_eq!(tree.read(b"large-value").unwrap(), None);
}

#[test]
fn small_neighbors_survive_overflow_writes() {
    let dir = TempDir::new().unwrap();
    let mut tree = open(&dir);

    tree.write(b"a-small", fields(&[("v", Value::Int32(1))])).unwrap();
    let big = "z".repeat(2_000_000);
    tree.write(b"b-large", fields(&[("blob", Value::Str(big.clone()))]))
        .unwrap();
    tree.write(b"c-small", fields(&[("v", Value::Int32(3))])).unwrap();

    assert_eq!(tree.read(b"a-small").unwrap().unwrap()["v"], Value::Int32(1));
    assert_eq!(
        tree.read(b"b-large").unwrap().unwrap()["blob"],
        Value::Str(big)
    );
    assert_eq!(tree.read(b"c-small").unwrap().unwrap()["v"], Value::Int32(3));
}

#[test]
fn delete_removes_only_the_target() {
    let dir = TempDir::new().unwrap();
    let mut tree = open(&dir);

    for i in 0..20 {
        let key = format!("k{i:02}");
        tree.write(key.as_bytes(), fields(&[("i", Value::Int32(i))]))
            .unwrap();
    }
    tree.delete(b"k07").unwrap();
    // Deleting a missing key is a no-op.
    tree.delete(b"no-such-key").unwrap();

    assert_eq!(tree.read(b"k07").unwrap(), None);
    assert_eq!(tree.scan(b"", None, None).unwrap().len(), 19);
    assert_eq!(tree.read(b"k06").unwrap().unwrap()["i"], Value::Int32(6));
    assert_eq!(tree.read(b"k08").unwrap().unwrap()["i"], Value::Int32(8));
}

#[test]
fn keys_order_as_unsigned_bytes() {
    let dir = TempDir::new().unwrap();
    let mut tree = open(&dir);

    tree.write(&[0x80], fields(&[("v", Value::Int32(128))])).unwrap();
    tree.write(&[0x7f], fields(&[("v", Value::Int32(127))])).unwrap();

    let all = tree.scan(&[0x00], None, None).unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].key, vec![0x7f]);
    assert_eq!(all[1].key, vec![0x80]);

    // An exclusive-looking bound below 0x80 must not pick it up.
    let low = tree.scan(&[0x00], Some(&[0x7f]), None).unwrap();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0].key, vec![0x7f]);
}

#[test]
fn write_batch_applies_sequentially() {
    let dir = TempDir::new().unwrap();
    let mut tree = open(&dir);

    let records: Vec<Record> = (0..50)
        .map(|i| {
            Record::new(
                format!("batch-{i:02}").into_bytes(),
                fields(&[("i", Value::Int32(i))]),
            )
        })
        .collect();
    tree.write_batch(records).unwrap();

    assert_eq!(tree.scan(b"", None, None).unwrap().len(), 50);
    assert_eq!(
        tree.read(b"batch-49").unwrap().unwrap()["i"],
        Value::Int32(49)
    );
}

#[test]
fn empty_batch_leaves_file_untouched() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tree.db");
    let mut tree = BTreeEngine::open(&path).unwrap();
    tree.write(b"k", fields(&[("v", Value::Int32(1))])).unwrap();
    tree.close().unwrap();

    let before = std::fs::read(&path).unwrap();
    let mut tree = BTreeEngine::open(&path).unwrap();
    tree.write_batch(Vec::new()).unwrap();
    tree.close().unwrap();
    let after = std::fs::read(&path).unwrap();
    assert_eq!(before, after);
}

#[test]
fn tree_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tree.db");
    {
        let mut tree = BTreeEngine::open(&path).unwrap();
        for i in 0..300 {
            let key = format!("persist-{i:04}");
            tree.write(key.as_bytes(), fields(&[("i", Value::Int32(i))]))
                .unwrap();
        }
        tree.close().unwrap();
    }

    let mut tree = BTreeEngine::open(&path).unwrap();
    for i in 0..300 {
        let key = format!("persist-{i:04}");
        assert_eq!(
            tree.read(key.as_bytes()).unwrap().unwrap()["i"],
            Value::Int32(i),
            "missing after reopen: {key}"
        );
    }
}

#[test]
fn overflow_chain_cycle_is_detected() {
    use jparque_btree::PageManager;
    use jparque_result::Error;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cycle.db");
    {
        let mut tree = BTreeEngine::open(&path).unwrap();
        let big = "c".repeat(100_000);
        tree.write(b"chained", fields(&[("blob", Value::Str(big))]))
            .unwrap();
        tree.close().unwrap();
    }

    // Find the chain head and point some chain page back at it.
    {
        let mut pm = PageManager::open(&path, 4096).unwrap();
        let mut head = 0u64;
        for id in 1..pm.next_page_id() {
            let page = pm.read_page(id).unwrap();
            if page.is_overflow() {
                head = id;
                break;
            }
        }
        assert_ne!(head, 0, "no overflow page found");
        let mut corrupted = pm.read_page(head + 1).unwrap();
        corrupted.set_overflow(head);
        pm.write_page(&corrupted).unwrap();
        pm.close().unwrap();
    }

    let mut tree = BTreeEngine::open(&path).unwrap();
    match tree.read(b"chained") {
        Err(Error::Corrupt(msg)) => assert!(msg.contains("cycle"), "message was: {msg}"),
        other => panic!("expected a cycle error, got {other:?}"),
    }
}

#[test]
fn close_is_idempotent_and_fences_operations() {
    let dir = TempDir::new().unwrap();
    let mut tree = open(&dir);
    tree.write(b"k", fields(&[("v", Value::Int32(1))])).unwrap();
    tree.close().unwrap();
    tree.close().unwrap();
    assert!(tree.read(b"k").is_err());
    assert!(tree.write(b"k2", FieldMap::default()).is_err());
}
