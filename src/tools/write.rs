//! Structured write tools.
//!
//! This module implements the `create_table`, `insert`, `update` and `delete`
//! MCP tools. Statements are built by [`crate::db::statement`], so table and
//! column names are always quoted and values always bound.

use crate::db::schema::SchemaInspector;
use crate::db::statement::{build_create_table, build_delete, build_inserts, build_update};
use crate::db::{ConnectionManager, QueryExecutor, ValueMap};
use crate::error::{DbError, DbResult};
use crate::models::ColumnSpec;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::info;

/// Input for the create_table tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateTableInput {
    /// Name of the table to create
    pub table: String,
    /// Column definitions in order. A single primary_key column of type INTEGER becomes the rowid alias
    pub columns: Vec<ColumnSpec>,
    /// Do nothing if the table already exists. Default: false
    #[serde(default)]
    pub if_not_exists: bool,
    /// Path of the SQLite database file. Default: the server's configured database
    #[serde(default)]
    pub db_path: Option<String>,
}

/// Output from the create_table tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CreateTableOutput {
    pub table: String,
    /// False when if_not_exists was set and the table already existed
    pub created: bool,
    /// The CREATE TABLE statement that was executed
    pub sql: String,
}

/// Input for the insert tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct InsertInput {
    /// Target table
    pub table: String,
    /// Rows to insert as column → value maps. Every row must use the same columns
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    /// Path of the SQLite database file. Default: the server's configured database
    #[serde(default)]
    pub db_path: Option<String>,
}

/// Output from the insert tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct InsertOutput {
    /// Number of rows inserted
    pub rows_affected: u64,
    /// Rowid of the last inserted row
    pub last_insert_rowid: i64,
    pub execution_time_ms: u64,
}

/// Input for the update tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UpdateInput {
    /// Target table
    pub table: String,
    /// Columns to change and their new values
    pub set: ValueMap,
    /// Equality conditions AND-ed together; a null value matches NULL. Default: no filter
    #[serde(default)]
    pub filter: ValueMap,
    /// Must be true to update every row when filter is empty. Default: false
    #[serde(default)]
    pub all_rows: bool,
    /// Path of the SQLite database file. Default: the server's configured database
    #[serde(default)]
    pub db_path: Option<String>,
}

/// Input for the delete tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DeleteInput {
    /// Target table
    pub table: String,
    /// Equality conditions AND-ed together; a null value matches NULL. Default: no filter
    #[serde(default)]
    pub filter: ValueMap,
    /// Must be true to delete every row when filter is empty. Default: false
    #[serde(default)]
    pub all_rows: bool,
    /// Path of the SQLite database file. Default: the server's configured database
    #[serde(default)]
    pub db_path: Option<String>,
}

/// Output from the update and delete tools.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct WriteOutput {
    /// Number of rows changed
    pub rows_affected: u64,
    pub execution_time_ms: u64,
}

/// Refuse unfiltered updates and deletes unless the caller opted in.
fn ensure_filtered(operation: &str, filter: &ValueMap, all_rows: bool) -> DbResult<()> {
    if filter.is_empty() && !all_rows {
        return Err(DbError::permission(
            format!("{} without filter", operation),
            format!(
                "This would {} every row in the table. Pass a filter, or set all_rows to true",
                operation.to_lowercase()
            ),
        ));
    }
    Ok(())
}

pub struct WriteToolHandler {
    connection_manager: Arc<ConnectionManager>,
    executor: QueryExecutor,
}

impl WriteToolHandler {
    pub fn new(connection_manager: Arc<ConnectionManager>) -> Self {
        Self {
            connection_manager,
            executor: QueryExecutor::new(),
        }
    }

    pub async fn create_table(&self, input: CreateTableInput) -> DbResult<CreateTableOutput> {
        let sql = build_create_table(&input.table, &input.columns, input.if_not_exists)?;
        let pool = self.connection_manager.pool(input.db_path.as_deref()).await?;

        let existed = input.if_not_exists
            && SchemaInspector::find_table(&pool, &input.table)
                .await?
                .is_some();

        self.executor.execute_write(&pool, &sql, &[]).await?;

        info!(
            table = %input.table,
            columns = input.columns.len(),
            created = !existed,
            "Created table"
        );

        Ok(CreateTableOutput {
            table: input.table,
            created: !existed,
            sql,
        })
    }

    /// Insert all rows in one transaction.
    pub async fn insert(&self, input: InsertInput) -> DbResult<InsertOutput> {
        let statements = build_inserts(&input.table, &input.rows)?;
        let pool = self.connection_manager.pool(input.db_path.as_deref()).await?;
        SchemaInspector::require_table(&pool, &input.table).await?;

        let summary = self.executor.execute_batch(&pool, &statements).await?;

        info!(
            table = %input.table,
            rows_affected = summary.rows_affected,
            execution_time_ms = summary.execution_time_ms,
            "Inserted rows"
        );

        Ok(InsertOutput {
            rows_affected: summary.rows_affected,
            last_insert_rowid: summary.last_insert_rowid,
            execution_time_ms: summary.execution_time_ms,
        })
    }

    pub async fn update(&self, input: UpdateInput) -> DbResult<WriteOutput> {
        ensure_filtered("UPDATE", &input.filter, input.all_rows)?;
        let stmt = build_update(&input.table, &input.set, &input.filter)?;
        let pool = self.connection_manager.pool(input.db_path.as_deref()).await?;
        SchemaInspector::require_table(&pool, &input.table).await?;

        let summary = self
            .executor
            .execute_write(&pool, &stmt.sql, &stmt.params)
            .await?;

        info!(
            table = %input.table,
            rows_affected = summary.rows_affected,
            execution_time_ms = summary.execution_time_ms,
            "Updated rows"
        );

        Ok(WriteOutput {
            rows_affected: summary.rows_affected,
            execution_time_ms: summary.execution_time_ms,
        })
    }

    pub async fn delete(&self, input: DeleteInput) -> DbResult<WriteOutput> {
        ensure_filtered("DELETE", &input.filter, input.all_rows)?;
        let stmt = build_delete(&input.table, &input.filter)?;
        let pool = self.connection_manager.pool(input.db_path.as_deref()).await?;
        SchemaInspector::require_table(&pool, &input.table).await?;

        // Bound statements never take the raw multi-statement path, even
        // when the filter is empty.
        let summary = self.executor.execute_batch(&pool, &[stmt]).await?;

        info!(
            table = %input.table,
            rows_affected = summary.rows_affected,
            execution_time_ms = summary.execution_time_ms,
            "Deleted rows"
        );

        Ok(WriteOutput {
            rows_affected: summary.rows_affected,
            execution_time_ms: summary.execution_time_ms,
        })
    }
}
