//! Concurrent tool calls against one database file.
//!
//! Every file has a single connection, so concurrent calls are applied one at
//! a time and multi-row inserts never interleave.

use serde_json::json;
use sqlite_mcp_server::config::OpenOptions;
use sqlite_mcp_server::db::ConnectionManager;
use sqlite_mcp_server::lineage::FieldTracker;
use sqlite_mcp_server::mcp::Dispatcher;
use std::sync::Arc;

async fn setup(dir: &tempfile::TempDir) -> Arc<Dispatcher> {
    let manager = ConnectionManager::new(dir.path().join("busy.db"), OpenOptions::default());
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(manager), FieldTracker::new()));
    dispatcher
        .call(
            "create_table",
            json!({"table": "hits", "columns": [
                {"name": "id", "type": "INTEGER", "primary_key": true},
                {"name": "worker", "type": "INTEGER"},
                {"name": "seq", "type": "INTEGER"}
            ]}),
        )
        .await
        .unwrap();
    dispatcher
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_single_row_inserts() {
    let dir = tempfile::tempdir().unwrap();
    let dispatcher = setup(&dir).await;
    const WORKERS: i64 = 32;

    let handles: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .call(
                        "insert",
                        json!({"table": "hits", "rows": [{"worker": worker, "seq": 0}]}),
                    )
                    .await
            })
        })
        .collect();

    for handle in handles {
        let output = handle.await.unwrap().unwrap();
        assert_eq!(output["rows_affected"], 1);
    }

    let count = dispatcher
        .call("query", json!({"sql": "SELECT COUNT(DISTINCT worker) AS n FROM hits"}))
        .await
        .unwrap();
    assert_eq!(count["rows"][0]["n"], WORKERS);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_batches_do_not_interleave() {
    let dir = tempfile::tempdir().unwrap();
    let dispatcher = setup(&dir).await;
    const WORKERS: i64 = 8;
    const ROWS: i64 = 25;

    let handles: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let dispatcher = dispatcher.clone();
            let rows: Vec<_> = (0..ROWS)
                .map(|seq| json!({"worker": worker, "seq": seq}))
                .collect();
            tokio::spawn(async move {
                dispatcher
                    .call("insert", json!({"table": "hits", "rows": rows}))
                    .await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Each batch occupies a contiguous rowid range
    let output = dispatcher
        .call(
            "query",
            json!({"sql": "SELECT worker, MAX(id) - MIN(id) + 1 AS span, COUNT(*) AS n FROM hits GROUP BY worker"}),
        )
        .await
        .unwrap();
    let rows = output["rows"].as_array().unwrap();
    assert_eq!(rows.len(), WORKERS as usize);
    for row in rows {
        assert_eq!(row["n"], ROWS);
        assert_eq!(row["span"], ROWS);
    }
}
