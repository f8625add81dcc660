use bson::doc;
use resik_todo::query::{Lookup, Unwind, lookup_stage, union_with_stage, unwind_stage};
use resik_todo::{CallContext, Store, StoreError, StoreOptions};
use std::io::{Seek, SeekFrom, Write};

fn ctx() -> CallContext {
    CallContext::background()
}

fn durable(dir: &std::path::Path) -> StoreOptions {
    StoreOptions { path: Some(dir.to_path_buf()), name: "db".into() }
}

#[test]
fn reopen_replays_every_write() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = Store::open(durable(dir.path())).unwrap();
        store.insert_one(&ctx(), "a", doc! { "_id": "1", "v": 1 }).unwrap();
        store.insert_one(&ctx(), "a", doc! { "_id": "2", "v": 2 }).unwrap();
        store.insert_one(&ctx(), "b", doc! { "_id": "1", "v": 9 }).unwrap();
        store.find_one_and_replace(&ctx(), "a", &doc! { "_id": "1" }, doc! { "v": 10 }).unwrap();
        store.find_one_and_delete(&ctx(), "a", &doc! { "_id": "2" }).unwrap();
    }
    let store = Store::open(durable(dir.path())).unwrap();
    assert_eq!(store.count_documents(&ctx(), "a", &doc! {}).unwrap(), 1);
    let one = store.find_one(&ctx(), "a", &doc! { "_id": "1" }).unwrap().unwrap();
    assert_eq!(one.get_i32("v").unwrap(), 10);
    assert_eq!(store.count_documents(&ctx(), "b", &doc! { "v": 9 }).unwrap(), 1);
}

#[test]
fn corrupted_record_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = Store::open(durable(dir.path())).unwrap();
        store.insert_one(&ctx(), "a", doc! { "_id": "1", "v": "payload" }).unwrap();
    }
    let wal = dir.path().join("db.wal");
    let mut f = std::fs::OpenOptions::new().write(true).open(&wal).unwrap();
    f.seek(SeekFrom::Start(12)).unwrap();
    f.write_all(&[0xAA, 0xBB]).unwrap();
    drop(f);
    assert!(matches!(Store::open(durable(dir.path())), Err(StoreError::Corrupt { offset: 0, .. })));
}

#[test]
fn unsupported_stage_is_a_query_error() {
    let store = Store::in_memory();
    let err = store.aggregate(&ctx(), "a", &[doc! { "$lookup": { "from": "b" } }]).unwrap_err();
    assert!(matches!(err, StoreError::QueryError(_)));
    let err = store.count_documents(&ctx(), "a", &doc! { "x": { "$where": "1" } }).unwrap_err();
    assert!(matches!(err, StoreError::QueryError(_)));
}

#[test]
fn built_join_stages_are_rejected_by_the_store() {
    let store = Store::in_memory();
    let lookup = Lookup { from: "b".into(), local_field: "x".into(), foreign_field: "_id".into(), as_field: "y".into() };
    let unwind = Unwind { path: "$y".into(), ..Unwind::default() };
    for stage in [lookup_stage(&lookup), unwind_stage(&unwind), union_with_stage("b", &[])] {
        let err = store.aggregate(&ctx(), "a", &[stage]).unwrap_err();
        assert!(matches!(err, StoreError::QueryError(_)));
    }
}

#[test]
fn reads_on_missing_collections_are_empty() {
    let store = Store::in_memory();
    assert!(store.aggregate(&ctx(), "none", &[]).unwrap().is_empty());
    assert!(store.find_one(&ctx(), "none", &doc! {}).unwrap().is_none());
    assert!(store.find_one_and_delete(&ctx(), "none", &doc! {}).unwrap().is_none());
}

#[test]
fn cancelled_context_rejects_writes() {
    let store = Store::in_memory();
    let c = CallContext::background();
    c.cancel();
    assert!(matches!(store.insert_one(&c, "a", doc! { "_id": "1" }), Err(StoreError::Cancelled)));
    assert_eq!(store.count_documents(&ctx(), "a", &doc! {}).unwrap(), 0);
}
