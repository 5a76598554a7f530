// crates/nexus-router-store/tests/store_integration.rs
// ============================================================================
// Integration tests: SqliteEventStore persistence across store instances
// ============================================================================

//! Exercises `SqliteEventStore` against a real file on disk rather than
//! `:memory:`, confirming runs and events survive closing and reopening the
//! database, the way a host process restarting mid-run depends on.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "integration fixtures use explicit asserts and unwraps for clarity"
)]

use nexus_router_core::model::EventType;
use nexus_router_core::model::RunMode;
use nexus_router_core::model::RunStatus;
use nexus_router_core::store::EventStore;
use nexus_router_store::SqliteEventStore;
use nexus_router_store::SqliteStoreConfig;
use serde_json::json;

#[test]
fn events_survive_closing_and_reopening_the_same_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("events.sqlite3");

    let run_id = {
        let store =
            SqliteEventStore::open(&SqliteStoreConfig::at_path(&db_path)).expect("open store");
        let run_id = store
            .create_run_with_id(None, RunMode::Apply, "persist across reopen")
            .expect("create run");
        store
            .append(&run_id, EventType::RunStarted, json!({ "goal": "persist across reopen" }))
            .expect("append run started");
        store.set_run_status(&run_id, RunStatus::Completed).expect("set status");
        run_id
    };

    let reopened =
        SqliteEventStore::open(&SqliteStoreConfig::at_path(&db_path)).expect("reopen store");
    let run = reopened.get_run(&run_id).expect("get run").expect("run persisted");
    assert_eq!(run.status, RunStatus::Completed);

    let events = reopened.read_events(&run_id).expect("read events");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::RunStarted);
    assert_eq!(events[0].payload["goal"], "persist across reopen");
}

#[test]
fn duplicate_caller_supplied_run_id_is_rejected_on_a_real_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("events.sqlite3");
    let store = SqliteEventStore::open(&SqliteStoreConfig::at_path(&db_path)).expect("open store");

    store
        .create_run_with_id(Some("fixed-id".to_string()), RunMode::DryRun, "first")
        .expect("first create succeeds");
    let err = store
        .create_run_with_id(Some("fixed-id".to_string()), RunMode::DryRun, "second")
        .expect_err("duplicate id must fail");
    assert!(matches!(err, nexus_router_core::error::StoreError::Invalid(_)));
}

#[test]
fn export_then_import_round_trips_through_a_second_file_backed_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source_path = dir.path().join("source.sqlite3");
    let dest_path = dir.path().join("dest.sqlite3");

    let source = SqliteEventStore::open(&SqliteStoreConfig::at_path(&source_path)).expect("open source");
    let run_id = source.create_run_with_id(None, RunMode::Apply, "export me").expect("create run");
    source.append(&run_id, EventType::RunStarted, json!({ "goal": "export me" })).expect("append");
    source.set_run_status(&run_id, RunStatus::Completed).expect("set status");

    let run = source.get_run(&run_id).expect("get run").expect("run exists");
    let events = source.read_events(&run_id).expect("read events");

    let dest = SqliteEventStore::open(&SqliteStoreConfig::at_path(&dest_path)).expect("open dest");
    dest.import_rows(run.clone(), events.clone()).expect("import rows");

    let imported_run = dest.get_run(&run_id).expect("get run").expect("run imported");
    assert_eq!(imported_run.status, run.status);
    let imported_events = dest.read_events(&run_id).expect("read events");
    assert_eq!(imported_events.len(), events.len());
    assert_eq!(imported_events[0].payload, events[0].payload);
}
