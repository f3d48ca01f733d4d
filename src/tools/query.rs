//! Query execution tool.
//!
//! This module implements the `query` MCP tool. Free-form SQL is passed
//! through with parameter binding: row-returning statements come back as
//! rows, anything else reports the number of affected rows. In read-only mode
//! only row-returning statements are accepted.

use crate::db::{ConnectionManager, QueryExecutor};
use crate::error::DbResult;
use crate::models::{ColumnMetadata, QueryParam, QueryRequest, QueryResult, WriteSummary};
use crate::tools::format::{OutputFormat, format_as_markdown, format_as_table};
use crate::tools::sql_validator::{self, ExecutionMode};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::info;

/// Default value for decode_binary field.
fn default_decode_binary() -> bool {
    true
}

/// Input for the query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct QueryInput {
    /// SQL to execute. Use ? (or ?1, ?2, ...) placeholders for values
    pub sql: String,
    /// Positional parameters bound to the placeholders
    #[serde(default)]
    pub params: Vec<QueryParam>,
    /// Path of the SQLite database file. Default: the server's configured database
    #[serde(default)]
    pub db_path: Option<String>,
    /// Output format for row results: "json" returns structured rows, "table" an ASCII table, "markdown" a Markdown table
    #[serde(default)]
    pub format: OutputFormat,
    /// If true (default), BLOB values are returned as UTF-8 text when valid (fallback to base64). If false, always base64.
    #[serde(default = "default_decode_binary")]
    pub decode_binary: bool,
}

/// Output from the query tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct QueryOutput {
    /// Column metadata in result order. Present for row-returning statements.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ColumnMetadata>,
    /// Result rows as column → value maps. Present for row-returning statements in json format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<serde_json::Map<String, JsonValue>>>,
    /// Pre-formatted output when format is table or markdown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
    /// Number of rows returned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    /// Number of rows changed by a write statement
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
    /// Statement execution time in milliseconds
    pub execution_time_ms: u64,
}

impl QueryOutput {
    /// Create output from a row result with the specified format.
    pub fn from_result(result: QueryResult, format: OutputFormat) -> Self {
        let row_count = result.row_count();
        let execution_time_ms = result.execution_time_ms;

        let (rows, formatted) = match format {
            OutputFormat::Json => (Some(result.rows), None),
            OutputFormat::Table => (
                None,
                Some(format_as_table(&result.columns, &result.rows, execution_time_ms)),
            ),
            OutputFormat::Markdown => (
                None,
                Some(format_as_markdown(&result.columns, &result.rows)),
            ),
        };

        Self {
            columns: result.columns,
            rows,
            formatted,
            row_count: Some(row_count),
            rows_affected: None,
            execution_time_ms,
        }
    }

    /// Create output from a write summary.
    pub fn from_write(summary: WriteSummary) -> Self {
        Self {
            columns: Vec::new(),
            rows: None,
            formatted: None,
            row_count: None,
            rows_affected: Some(summary.rows_affected),
            execution_time_ms: summary.execution_time_ms,
        }
    }
}

/// Handler for query execution.
pub struct QueryToolHandler {
    connection_manager: Arc<ConnectionManager>,
    executor: QueryExecutor,
}

impl QueryToolHandler {
    /// Create a new query tool handler.
    pub fn new(connection_manager: Arc<ConnectionManager>) -> Self {
        Self {
            connection_manager,
            executor: QueryExecutor::new(),
        }
    }

    /// Handle the query tool call.
    pub async fn query(&self, input: QueryInput) -> DbResult<QueryOutput> {
        sql_validator::reject_transaction_control(&input.sql)?;
        if self.connection_manager.is_read_only() {
            sql_validator::validate_readonly(&input.sql)?;
        }
        let mode = sql_validator::execution_mode(&input.sql)?;

        let pool = self.connection_manager.pool(input.db_path.as_deref()).await?;

        match mode {
            ExecutionMode::Rows => {
                let request = QueryRequest {
                    sql: input.sql,
                    params: input.params,
                    decode_binary: input.decode_binary,
                };
                let result = self.executor.execute_query(&pool, &request).await?;

                info!(
                    row_count = result.row_count(),
                    execution_time_ms = result.execution_time_ms,
                    "Query executed"
                );

                Ok(QueryOutput::from_result(result, input.format))
            }
            ExecutionMode::Write => {
                let summary = self
                    .executor
                    .execute_write(&pool, &input.sql, &input.params)
                    .await?;

                info!(
                    rows_affected = summary.rows_affected,
                    execution_time_ms = summary.execution_time_ms,
                    "Statement executed"
                );

                Ok(QueryOutput::from_write(summary))
            }
        }
    }
}
