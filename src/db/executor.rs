//! Query execution engine.
//!
//! This module provides statement execution with support for:
//! - Parameterized queries
//! - Multi-statement writes inside a single transaction
//! - Column metadata for empty result sets
//!
//! No row limit or timeout is applied; SQLite's own behavior is the only bound.

use crate::db::params::bind_all;
use crate::db::types::RowToJson;
use crate::error::DbResult;
use crate::models::{ColumnMetadata, QueryParam, QueryRequest, QueryResult, WriteSummary};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Executor, SqlitePool, TypeInfo};
use std::time::Instant;
use tracing::debug;

/// A statement plus its bound parameters.
#[derive(Debug, Clone)]
pub struct BoundStatement {
    pub sql: String,
    pub params: Vec<QueryParam>,
}

impl BoundStatement {
    pub fn new(sql: impl Into<String>, params: Vec<QueryParam>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Query executor that handles database statement execution.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryExecutor;

impl QueryExecutor {
    /// Create a new query executor.
    pub fn new() -> Self {
        Self
    }

    /// Execute a row-returning statement and return results.
    pub async fn execute_query(
        &self,
        pool: &SqlitePool,
        request: &QueryRequest,
    ) -> DbResult<QueryResult> {
        let start = Instant::now();

        debug!(
            sql = %request.sql,
            params = request.params.len(),
            "Executing query"
        );

        let rows = fetch_rows(pool, &request.sql, &request.params).await?;

        let columns = match rows.first() {
            Some(row) => row.get_column_metadata(),
            None => describe_columns(pool, &request.sql).await,
        };

        let json_rows = rows
            .iter()
            .map(|r| r.to_json_map_with_options(request.decode_binary))
            .collect();

        Ok(QueryResult {
            columns,
            rows: json_rows,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Execute a single write statement (INSERT, UPDATE, DELETE, DDL).
    pub async fn execute_write(
        &self,
        pool: &SqlitePool,
        sql: &str,
        params: &[QueryParam],
    ) -> DbResult<WriteSummary> {
        let start = Instant::now();

        debug!(sql = %sql, params = params.len(), "Executing write operation");

        // When params is empty, execute raw SQL directly so scripts with
        // several statements (e.g. CREATE TRIGGER bodies) are accepted.
        let result = if params.is_empty() {
            pool.execute(sql).await?
        } else {
            bind_all(sqlx::query(sql), params).execute(pool).await?
        };

        let mut summary = WriteSummary::default();
        summary.absorb(result.rows_affected(), result.last_insert_rowid());
        summary.execution_time_ms = start.elapsed().as_millis() as u64;
        Ok(summary)
    }

    /// Execute several statements inside one transaction.
    ///
    /// Either all statements are applied or none: the first failure rolls the
    /// transaction back (dropping an uncommitted `Transaction` rolls back).
    pub async fn execute_batch(
        &self,
        pool: &SqlitePool,
        statements: &[BoundStatement],
    ) -> DbResult<WriteSummary> {
        let start = Instant::now();
        let mut summary = WriteSummary::default();

        debug!(statements = statements.len(), "Executing batch in transaction");

        let mut tx = pool.begin().await?;
        for stmt in statements {
            let result = bind_all(sqlx::query(&stmt.sql), &stmt.params)
                .execute(&mut *tx)
                .await?;
            summary.absorb(result.rows_affected(), result.last_insert_rowid());
        }
        tx.commit().await?;

        summary.execution_time_ms = start.elapsed().as_millis() as u64;
        Ok(summary)
    }
}

async fn fetch_rows(pool: &SqlitePool, sql: &str, params: &[QueryParam]) -> DbResult<Vec<SqliteRow>> {
    let rows = if params.is_empty() {
        pool.fetch_all(sql).await?
    } else {
        bind_all(sqlx::query(sql), params).fetch_all(pool).await?
    };
    Ok(rows)
}

/// Column metadata for a statement that returned no rows.
async fn describe_columns(pool: &SqlitePool, sql: &str) -> Vec<ColumnMetadata> {
    match pool.describe(sql).await {
        Ok(describe) => describe
            .columns()
            .iter()
            .map(|col| ColumnMetadata::new(col.name(), col.type_info().name()))
            .collect(),
        Err(e) => {
            debug!(error = %e, "Could not describe statement columns");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn memory_pool() -> SqlitePool {
        sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_query_preserves_column_order() {
        let pool = memory_pool().await;
        let executor = QueryExecutor::new();
        executor
            .execute_write(&pool, "CREATE TABLE t (z INTEGER, a TEXT, m REAL)", &[])
            .await
            .unwrap();
        executor
            .execute_write(
                &pool,
                "INSERT INTO t VALUES (?, ?, ?)",
                &[
                    QueryParam::Int(1),
                    QueryParam::String("x".to_string()),
                    QueryParam::Float(0.5),
                ],
            )
            .await
            .unwrap();

        let result = executor
            .execute_query(&pool, &QueryRequest::new("SELECT * FROM t"))
            .await
            .unwrap();
        let names: Vec<_> = result.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["z", "a", "m"]);
        let keys: Vec<_> = result.rows[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
        assert_eq!(result.rows[0]["m"], json!(0.5));
    }

    #[tokio::test]
    async fn test_empty_result_still_reports_columns() {
        let pool = memory_pool().await;
        let executor = QueryExecutor::new();
        executor
            .execute_write(&pool, "CREATE TABLE t (id INTEGER, name TEXT)", &[])
            .await
            .unwrap();

        let result = executor
            .execute_query(&pool, &QueryRequest::new("SELECT id, name FROM t"))
            .await
            .unwrap();
        assert!(result.is_empty());
        assert_eq!(result.columns.len(), 2);
        assert_eq!(result.columns[1].name, "name");
    }

    #[tokio::test]
    async fn test_batch_rolls_back_on_failure() {
        let pool = memory_pool().await;
        let executor = QueryExecutor::new();
        executor
            .execute_write(&pool, "CREATE TABLE t (id INTEGER PRIMARY KEY)", &[])
            .await
            .unwrap();

        let insert = |id| BoundStatement::new("INSERT INTO t (id) VALUES (?)", vec![QueryParam::Int(id)]);
        let result = executor
            .execute_batch(&pool, &[insert(1), insert(2), insert(1)])
            .await;
        assert!(result.is_err());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM t")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_batch_sums_rows_affected() {
        let pool = memory_pool().await;
        let executor = QueryExecutor::new();
        executor
            .execute_write(&pool, "CREATE TABLE t (v TEXT)", &[])
            .await
            .unwrap();

        let stmt = BoundStatement::new("INSERT INTO t (v) VALUES (?)", vec![QueryParam::Null]);
        let summary = executor
            .execute_batch(&pool, &[stmt.clone(), stmt.clone(), stmt])
            .await
            .unwrap();
        assert_eq!(summary.rows_affected, 3);
        assert_eq!(summary.last_insert_rowid, 3);
    }
}
