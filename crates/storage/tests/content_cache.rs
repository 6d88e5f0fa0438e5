#![forbid(unsafe_code)]

use arbor_storage::{ContentCache, StoreError};

#[test]
fn put_get_delete_round_trip() {
    let root = tempfile::tempdir().expect("temp dir");
    let cache = ContentCache::enable(root.path(), "files").expect("enable");
    assert!(cache.dir().ends_with("files"));

    cache.put(7, "hello").expect("put");
    assert_eq!(cache.get(7).expect("get"), Some("hello".to_string()));
    assert_eq!(cache.len().expect("len"), 1);

    assert!(cache.delete(7).expect("delete"));
    assert_eq!(cache.get(7).expect("get"), None);
    assert!(!cache.delete(7).expect("delete absent"), "absent delete is a no-op");
    assert!(cache.is_empty().expect("is empty"));
}

#[test]
fn disable_purges_previous_payloads() {
    let root = tempfile::tempdir().expect("temp dir");
    let cache = ContentCache::enable(root.path(), "files").expect("enable");
    for id in 2..6 {
        cache.put(id, &format!("payload {id}")).expect("put");
    }

    ContentCache::disable(root.path(), "files").expect("disable");
    assert!(!root.path().join("files").exists());

    let reenabled = ContentCache::enable(root.path(), "files").expect("enable again");
    for id in 2..6 {
        assert_eq!(reenabled.get(id).expect("get"), None);
    }
    assert_eq!(reenabled.len().expect("len"), 0);
}

#[test]
fn disable_only_touches_its_own_store() {
    let root = tempfile::tempdir().expect("temp dir");
    let files = ContentCache::enable(root.path(), "files").expect("enable files");
    let sheets = ContentCache::enable(root.path(), "sheets").expect("enable sheets");
    files.put(2, "a").expect("put");
    sheets.put(2, "b").expect("put");

    files.purge().expect("purge");
    assert_eq!(sheets.get(2).expect("get"), Some("b".to_string()));
}

#[test]
fn disabling_a_missing_cache_is_fine() {
    let root = tempfile::tempdir().expect("temp dir");
    ContentCache::disable(root.path(), "never_enabled").expect("disable");
}

#[test]
fn store_id_must_be_an_identifier() {
    let root = tempfile::tempdir().expect("temp dir");
    let err = ContentCache::enable(root.path(), "../outside").expect_err("bad id");
    assert!(matches!(err, StoreError::Schema(_)));
}
