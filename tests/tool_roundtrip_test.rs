//! Integration tests for the tool surface.
//!
//! Tests verify that:
//! - Created tables show up in list_tables and describe_table
//! - Inserted values come back unchanged, in declared column order
//! - Repeated inserts duplicate rows when there is no unique constraint
//! - Unknown tool names are rejected
//! - Free-form SQL writes report rows_affected
//! - Transaction control through the query tool is refused

use serde_json::{Value as JsonValue, json};
use sqlite_mcp_server::DbError;
use sqlite_mcp_server::config::OpenOptions;
use sqlite_mcp_server::db::ConnectionManager;
use sqlite_mcp_server::lineage::FieldTracker;
use sqlite_mcp_server::mcp::Dispatcher;
use std::sync::Arc;
use tempfile::TempDir;

fn setup() -> (Dispatcher, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let manager = ConnectionManager::new(dir.path().join("app.db"), OpenOptions::default());
    (Dispatcher::new(Arc::new(manager), FieldTracker::new()), dir)
}

async fn create_people(dispatcher: &Dispatcher) {
    dispatcher
        .call(
            "create_table",
            json!({
                "table": "people",
                "columns": [
                    {"name": "id", "type": "INTEGER", "primary_key": true},
                    {"name": "name", "type": "TEXT", "not_null": true},
                    {"name": "height", "type": "REAL"},
                    {"name": "active", "type": "BOOLEAN", "default": true},
                    {"name": "notes", "type": "TEXT"}
                ]
            }),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_create_table_then_list_tables() {
    let (dispatcher, _dir) = setup();
    create_people(&dispatcher).await;

    let output = dispatcher.call("list_tables", json!({})).await.unwrap();
    let names: Vec<&str> = output["tables"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"people"));
    assert_eq!(output["tables"][0]["type"], "table");
}

#[tokio::test]
async fn test_insert_reports_rows_and_duplicates() {
    let (dispatcher, _dir) = setup();
    dispatcher
        .call(
            "create_table",
            json!({"table": "events", "columns": [{"name": "kind", "type": "TEXT"}]}),
        )
        .await
        .unwrap();

    let rows = json!({"table": "events", "rows": [{"kind": "a"}, {"kind": "b"}, {"kind": "c"}]});
    let first = dispatcher.call("insert", rows.clone()).await.unwrap();
    assert_eq!(first["rows_affected"], 3);
    let second = dispatcher.call("insert", rows).await.unwrap();
    assert_eq!(second["rows_affected"], 3);

    let count = dispatcher
        .call("query", json!({"sql": "SELECT COUNT(*) AS n FROM events"}))
        .await
        .unwrap();
    assert_eq!(count["rows"][0]["n"], 6);
}

#[tokio::test]
async fn test_query_round_trips_values_in_column_order() {
    let (dispatcher, _dir) = setup();
    create_people(&dispatcher).await;

    dispatcher
        .call(
            "insert",
            json!({
                "table": "people",
                "rows": [
                    {"name": "Ada", "height": 1.65, "active": false, "notes": "first"},
                    {"name": "東京タワー", "height": null, "active": true, "notes": "a|b\nc"}
                ]
            }),
        )
        .await
        .unwrap();

    let output = dispatcher
        .call(
            "query",
            json!({"sql": "SELECT * FROM people WHERE id >= ? ORDER BY id", "params": [1]}),
        )
        .await
        .unwrap();

    let columns: Vec<&str> = output["columns"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(columns, vec!["id", "name", "height", "active", "notes"]);
    assert_eq!(output["row_count"], 2);

    let first = output["rows"][0].as_object().unwrap();
    let keys: Vec<&str> = first.keys().map(String::as_str).collect();
    assert_eq!(keys, columns);
    assert_eq!(first["id"], 1);
    assert_eq!(first["name"], "Ada");
    assert_eq!(first["height"], 1.65);
    assert_eq!(first["active"], false);

    let second = &output["rows"][1];
    assert_eq!(second["name"], "東京タワー");
    assert_eq!(second["height"], JsonValue::Null);
    assert_eq!(second["active"], true);
    assert_eq!(second["notes"], "a|b\nc");
}

#[tokio::test]
async fn test_describe_table_reports_schema() {
    let (dispatcher, _dir) = setup();
    create_people(&dispatcher).await;

    let output = dispatcher
        .call("describe_table", json!({"table": "PEOPLE"}))
        .await
        .unwrap();
    assert_eq!(output["table_name"], "people");
    assert_eq!(output["primary_key"], json!(["id"]));
    assert_eq!(output["columns"][1]["name"], "name");
    assert_eq!(output["columns"][1]["nullable"], false);
    assert_eq!(output["columns"][3]["default"], "1");
    assert_eq!(output["row_count"], 0);
}

#[tokio::test]
async fn test_unknown_tool_is_unsupported() {
    let (dispatcher, _dir) = setup();
    let err = dispatcher
        .call("vacuum_everything", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::UnsupportedOperation { .. }));
    assert!(err.to_string().contains("Unsupported operation"));
}

#[tokio::test]
async fn test_free_form_write_and_table_format() {
    let (dispatcher, _dir) = setup();
    dispatcher
        .call(
            "query",
            json!({"sql": "CREATE TABLE kv (k TEXT PRIMARY KEY, v INTEGER)"}),
        )
        .await
        .unwrap();

    let inserted = dispatcher
        .call(
            "query",
            json!({"sql": "INSERT INTO kv (k, v) VALUES (?, ?), (?, ?)", "params": ["a", 1, "b", 2]}),
        )
        .await
        .unwrap();
    assert_eq!(inserted["rows_affected"], 2);
    assert!(inserted.get("rows").is_none());

    let table = dispatcher
        .call(
            "query",
            json!({"sql": "SELECT k, v FROM kv ORDER BY k", "format": "table"}),
        )
        .await
        .unwrap();
    let formatted = table["formatted"].as_str().unwrap();
    assert!(formatted.contains("| a |"));
    assert!(formatted.contains("2 rows in set"));
}

#[tokio::test]
async fn test_transaction_control_refused_and_writes_stay_committed() {
    let (dispatcher, dir) = setup();
    create_people(&dispatcher).await;

    for sql in [
        "BEGIN",
        "BEGIN IMMEDIATE",
        "COMMIT",
        "END",
        "ROLLBACK",
        "SAVEPOINT sp",
        "RELEASE sp",
        "SELECT 1; BEGIN",
    ] {
        let err = dispatcher.call("query", json!({"sql": sql})).await.unwrap_err();
        assert!(
            matches!(err, DbError::Permission { .. }),
            "expected permission error for {sql}, got {err:?}"
        );
    }

    let inserted = dispatcher
        .call("insert", json!({"table": "people", "rows": [{"name": "Ada"}]}))
        .await
        .unwrap();
    assert_eq!(inserted["rows_affected"], 1);

    // A separate connection sees the row, so nothing was left uncommitted
    let manager = ConnectionManager::new(dir.path().join("app.db"), OpenOptions::default());
    let other = Dispatcher::new(Arc::new(manager), FieldTracker::new());
    let count = other
        .call("query", json!({"sql": "SELECT COUNT(*) AS n FROM people"}))
        .await
        .unwrap();
    assert_eq!(count["rows"][0]["n"], 1);
}

#[tokio::test]
async fn test_update_and_delete_with_filters() {
    let (dispatcher, _dir) = setup();
    create_people(&dispatcher).await;
    dispatcher
        .call(
            "insert",
            json!({"table": "people", "rows": [{"name": "a"}, {"name": "b"}, {"name": "c"}]}),
        )
        .await
        .unwrap();

    let updated = dispatcher
        .call(
            "update",
            json!({"table": "people", "set": {"notes": "x"}, "filter": {"name": "b"}}),
        )
        .await
        .unwrap();
    assert_eq!(updated["rows_affected"], 1);

    let refused = dispatcher
        .call("delete", json!({"table": "people"}))
        .await
        .unwrap_err();
    assert!(matches!(refused, DbError::Permission { .. }));

    let deleted = dispatcher
        .call("delete", json!({"table": "people", "filter": {"notes": null}}))
        .await
        .unwrap();
    assert_eq!(deleted["rows_affected"], 2);
}

#[tokio::test]
async fn test_connect_database_and_db_path() {
    let (dispatcher, dir) = setup();
    let other = dir.path().join("nested").join("other.db");
    let other_path = other.display().to_string();

    let connected = dispatcher
        .call("connect_database", json!({"db_path": other_path}))
        .await
        .unwrap();
    assert_eq!(connected["tables"], json!([]));
    assert!(!connected["sqlite_version"].as_str().unwrap().is_empty());
    assert!(other.exists());

    dispatcher
        .call(
            "create_table",
            json!({"table": "only_here", "columns": [{"name": "x"}], "db_path": other_path}),
        )
        .await
        .unwrap();

    let default_tables = dispatcher.call("list_tables", json!({})).await.unwrap();
    assert_eq!(default_tables["count"], 0);
    let other_tables = dispatcher
        .call("list_tables", json!({"db_path": other_path}))
        .await
        .unwrap();
    assert_eq!(other_tables["count"], 1);
}
