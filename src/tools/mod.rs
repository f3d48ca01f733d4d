//! MCP tool implementations.
//!
//! This module contains all tool handlers:
//! - `query`: Run free-form SQL with bound parameters
//! - `write`: `create_table`, `insert`, `update` and `delete`
//! - `schema`: `list_tables`, `describe_table` and `connect_database`
//! - `transfer`: CSV import and export
//! - `sample`: Sample data generation
//! - `lineage`: Field lineage recording and query analysis
//! - `sql_validator`: Statement classification for the `query` tool
//! - `format`: ASCII and Markdown table rendering

pub mod format;
pub mod lineage;
pub mod query;
pub mod sample;
pub mod schema;
pub mod sql_validator;
pub mod transfer;
pub mod write;

pub use format::OutputFormat;
pub use lineage::{
    AddFieldLineageInput, AddFieldLineageOutput, AnalyzeQueryLineageInput,
    AnalyzeQueryLineageOutput, LineageToolHandler, TraceFieldLineageInput,
    TraceFieldLineageOutput,
};
pub use query::{QueryInput, QueryOutput, QueryToolHandler};
pub use sample::{GenerateSampleDataInput, GenerateSampleDataOutput, SampleDataToolHandler};
pub use schema::{
    ConnectDatabaseInput, ConnectDatabaseOutput, DescribeTableInput, DescribeTableOutput,
    ListTablesInput, ListTablesOutput, SchemaToolHandler,
};
pub use transfer::{
    ExportCsvInput, ExportCsvOutput, ImportCsvInput, ImportCsvOutput, TransferToolHandler,
};
pub use write::{
    CreateTableInput, CreateTableOutput, DeleteInput, InsertInput, InsertOutput, UpdateInput,
    WriteOutput, WriteToolHandler,
};
