//! Data models for the SQLite MCP Server.
//!
//! This module re-exports all model types used throughout the application.

pub mod query;
pub mod schema;

// Re-export commonly used types
pub use query::{ColumnMetadata, QueryParam, QueryRequest, QueryResult, WriteSummary};
pub use schema::{
    ColumnDefinition, ColumnSpec, ForeignKey, ForeignKeyAction, IndexInfo, TableInfo,
    TableSchema, TableType,
};
