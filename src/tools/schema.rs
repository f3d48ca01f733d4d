//! Schema introspection tools.
//!
//! This module implements the `list_tables`, `describe_table` and
//! `connect_database` MCP tools.

use crate::db::ConnectionManager;
use crate::db::schema::SchemaInspector;
use crate::error::DbResult;
use crate::models::{ColumnDefinition, ForeignKey, IndexInfo, TableInfo, TableSchema};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

fn default_true() -> bool {
    true
}

/// Input for the list_tables tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListTablesInput {
    /// Include views in the result. Default: true
    #[serde(default = "default_true")]
    pub include_views: bool,
    /// Path of the SQLite database file. Default: the server's configured database
    #[serde(default)]
    pub db_path: Option<String>,
}

/// Output from the list_tables tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListTablesOutput {
    /// Tables and views, sorted by name
    pub tables: Vec<TableInfo>,
    /// Total number of tables/views returned
    pub count: usize,
}

/// Input for the describe_table tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DescribeTableInput {
    /// Name of the table or view to describe (case-insensitive)
    pub table: String,
    /// Path of the SQLite database file. Default: the server's configured database
    #[serde(default)]
    pub db_path: Option<String>,
}

/// Output from the describe_table tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DescribeTableOutput {
    /// Name of the described table, as stored in the schema
    pub table_name: String,
    /// Column definitions in declaration order
    pub columns: Vec<ColumnOutput>,
    /// Column names that form the primary key, in key order
    pub primary_key: Vec<String>,
    /// Foreign key relationships to other tables
    pub foreign_keys: Vec<ForeignKey>,
    /// Index definitions on the table
    pub indexes: Vec<IndexInfo>,
    /// Number of rows currently in the table
    pub row_count: u64,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
#[schemars(inline)]
pub struct ForeignKeyRef {
    pub table: String,
    pub column: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ColumnOutput {
    pub name: String,
    /// Declared type (may be empty: SQLite allows untyped columns)
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    /// Default expression as written in the schema
    #[serde(rename = "default", skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    pub primary_key: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKeyRef>,
}

impl From<ColumnDefinition> for ColumnOutput {
    fn from(col: ColumnDefinition) -> Self {
        Self {
            name: col.name,
            data_type: col.data_type,
            nullable: col.nullable,
            default_value: col.default_value,
            primary_key: col.primary_key,
            foreign_key: None, // Set in From<TableSchema>
        }
    }
}

impl From<TableSchema> for DescribeTableOutput {
    fn from(schema: TableSchema) -> Self {
        let fk_map: HashMap<&str, ForeignKeyRef> = schema
            .foreign_keys
            .iter()
            .map(|fk| {
                (
                    fk.column.as_str(),
                    ForeignKeyRef {
                        table: fk.references_table.clone(),
                        column: fk.references_column.clone(),
                    },
                )
            })
            .collect();

        let columns: Vec<ColumnOutput> = schema
            .columns
            .into_iter()
            .map(|col| {
                let foreign_key = fk_map.get(col.name.as_str()).cloned();
                ColumnOutput {
                    foreign_key,
                    ..col.into()
                }
            })
            .collect();

        Self {
            table_name: schema.table_name,
            columns,
            primary_key: schema.primary_key,
            foreign_keys: schema.foreign_keys,
            indexes: schema.indexes,
            row_count: schema.row_count,
        }
    }
}

/// Input for the connect_database tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ConnectDatabaseInput {
    /// Path of the SQLite database file to open. Missing files are created (with parent directories) unless the server runs with --no-create or --read-only
    pub db_path: String,
}

/// Output from the connect_database tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ConnectDatabaseOutput {
    /// Path of the opened database
    pub db_path: String,
    /// Names of the tables in the database
    pub tables: Vec<String>,
    /// Version of the SQLite library
    pub sqlite_version: String,
    /// True if the database was opened read-only
    pub read_only: bool,
}

pub struct SchemaToolHandler {
    connection_manager: Arc<ConnectionManager>,
}

impl SchemaToolHandler {
    pub fn new(connection_manager: Arc<ConnectionManager>) -> Self {
        Self { connection_manager }
    }

    pub async fn list_tables(&self, input: ListTablesInput) -> DbResult<ListTablesOutput> {
        let pool = self.connection_manager.pool(input.db_path.as_deref()).await?;
        let tables = SchemaInspector::list_tables(&pool, input.include_views).await?;
        let count = tables.len();

        info!(db_path = ?input.db_path, count = count, "Listed tables");

        Ok(ListTablesOutput { tables, count })
    }

    pub async fn describe_table(&self, input: DescribeTableInput) -> DbResult<DescribeTableOutput> {
        let pool = self.connection_manager.pool(input.db_path.as_deref()).await?;
        let schema = SchemaInspector::describe_table(&pool, &input.table).await?;

        info!(
            table = %schema.table_name,
            columns = schema.columns.len(),
            row_count = schema.row_count,
            "Described table"
        );

        Ok(schema.into())
    }

    /// Open (or create) a database file and report what it contains.
    pub async fn connect_database(
        &self,
        input: ConnectDatabaseInput,
    ) -> DbResult<ConnectDatabaseOutput> {
        let path = self.connection_manager.resolve(Some(&input.db_path))?;
        let pool = self.connection_manager.pool_for_path(&path).await?;

        let tables: Vec<String> = SchemaInspector::list_tables(&pool, false)
            .await?
            .into_iter()
            .map(|t: TableInfo| t.name)
            .collect();
        let sqlite_version = ConnectionManager::sqlite_version(&pool).await?;

        info!(
            db_path = %path.display(),
            tables = tables.len(),
            sqlite_version = %sqlite_version,
            "Connected to database"
        );

        Ok(ConnectDatabaseOutput {
            db_path: path.display().to_string(),
            tables,
            sqlite_version,
            read_only: self.connection_manager.is_read_only(),
        })
    }
}
