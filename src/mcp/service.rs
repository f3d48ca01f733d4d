//! MCP service implementation using rmcp.
//!
//! This module defines the SqliteService struct with all database tools
//! exposed via the MCP protocol using the rmcp framework's macros. Every tool
//! forwards to the matching [`Dispatcher`] method.

use crate::db::ConnectionManager;
use crate::lineage::FieldTracker;
use crate::mcp::dispatch::Dispatcher;
use crate::tools::{
    AddFieldLineageInput, AddFieldLineageOutput, AnalyzeQueryLineageInput,
    AnalyzeQueryLineageOutput, ConnectDatabaseInput, ConnectDatabaseOutput, CreateTableInput,
    CreateTableOutput, DeleteInput, DescribeTableInput, DescribeTableOutput, ExportCsvInput,
    ExportCsvOutput, GenerateSampleDataInput, GenerateSampleDataOutput, ImportCsvInput,
    ImportCsvOutput, InsertInput, InsertOutput, ListTablesInput, ListTablesOutput, QueryInput,
    QueryOutput, TraceFieldLineageInput, TraceFieldLineageOutput, UpdateInput, WriteOutput,
};
use rmcp::Json;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct SqliteService {
    /// Shared dispatcher holding one handler per tool family
    dispatcher: Arc<Dispatcher>,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
}

impl SqliteService {
    /// Create a new SqliteService with a fresh lineage store.
    pub fn new(connection_manager: Arc<ConnectionManager>) -> Self {
        Self::with_tracker(connection_manager, FieldTracker::new())
    }

    pub fn with_tracker(connection_manager: Arc<ConnectionManager>, tracker: FieldTracker) -> Self {
        Self {
            dispatcher: Arc::new(Dispatcher::new(connection_manager, tracker)),
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl SqliteService {
    #[tool(
        description = "Execute any SQL statement with optional positional parameters (? placeholders).\nRow-returning statements (SELECT, WITH, VALUES, PRAGMA, EXPLAIN, ... RETURNING) return columns and rows; other statements return rows_affected.\nOutput format: \"json\" (default) returns structured rows, \"table\" an ASCII table, \"markdown\" a Markdown table.\nIn read-only mode only row-returning statements are accepted."
    )]
    async fn query(
        &self,
        Parameters(input): Parameters<QueryInput>,
    ) -> Result<Json<QueryOutput>, McpError> {
        self.dispatcher
            .query(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Create a table from column definitions (name, type, primary_key, not_null, unique, default).\nNames are quoted safely. Set if_not_exists to make the call idempotent; created is false when the table already existed."
    )]
    async fn create_table(
        &self,
        Parameters(input): Parameters<CreateTableInput>,
    ) -> Result<Json<CreateTableOutput>, McpError> {
        self.dispatcher
            .create_table(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Insert one or more rows given as column → value objects. All rows must use the same columns.\nAll rows are inserted in a single transaction: either every row is inserted or none."
    )]
    async fn insert(
        &self,
        Parameters(input): Parameters<InsertInput>,
    ) -> Result<Json<InsertOutput>, McpError> {
        self.dispatcher
            .insert(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Update rows matching an equality filter (conditions AND-ed; null matches NULL).\nAn empty filter is refused unless all_rows is true."
    )]
    async fn update(
        &self,
        Parameters(input): Parameters<UpdateInput>,
    ) -> Result<Json<WriteOutput>, McpError> {
        self.dispatcher
            .update(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Delete rows matching an equality filter (conditions AND-ed; null matches NULL).\nAn empty filter is refused unless all_rows is true."
    )]
    async fn delete(
        &self,
        Parameters(input): Parameters<DeleteInput>,
    ) -> Result<Json<WriteOutput>, McpError> {
        self.dispatcher
            .delete(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "List tables (and views, unless include_views is false) with their on-disk size when SQLite reports it."
    )]
    async fn list_tables(
        &self,
        Parameters(input): Parameters<ListTablesInput>,
    ) -> Result<Json<ListTablesOutput>, McpError> {
        self.dispatcher
            .list_tables(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Get detailed schema information for a table.\nReturns columns, primary key, foreign keys, indexes and the current row count."
    )]
    async fn describe_table(
        &self,
        Parameters(input): Parameters<DescribeTableInput>,
    ) -> Result<Json<DescribeTableOutput>, McpError> {
        self.dispatcher
            .describe_table(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Open (or create) a SQLite database file and list its tables.\nOther tools reach it by passing the same db_path."
    )]
    async fn connect_database(
        &self,
        Parameters(input): Parameters<ConnectDatabaseInput>,
    ) -> Result<Json<ConnectDatabaseOutput>, McpError> {
        self.dispatcher
            .connect_database(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Import a CSV file with a header row into a table.\nThe delimiter (comma, semicolon, tab or pipe) is detected from the header; column types are inferred as INTEGER, REAL or TEXT. Empty fields become NULL."
    )]
    async fn import_csv(
        &self,
        Parameters(input): Parameters<ImportCsvInput>,
    ) -> Result<Json<ImportCsvOutput>, McpError> {
        self.dispatcher
            .import_csv(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(description = "Export every row of a table to a CSV file with a header row.")]
    async fn export_csv(
        &self,
        Parameters(input): Parameters<ExportCsvInput>,
    ) -> Result<Json<ExportCsvOutput>, McpError> {
        self.dispatcher
            .export_csv(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Insert generated sample rows into a table (default 10, max 10000).\nValues follow each column's declared type and name (name, email, phone, address, company, city, country, title, description)."
    )]
    async fn generate_sample_data(
        &self,
        Parameters(input): Parameters<GenerateSampleDataInput>,
    ) -> Result<Json<GenerateSampleDataOutput>, McpError> {
        self.dispatcher
            .generate_sample_data(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Record where a field's values come from: source tables and fields paired by position, plus an optional join condition."
    )]
    async fn add_field_lineage(
        &self,
        Parameters(input): Parameters<AddFieldLineageInput>,
    ) -> Result<Json<AddFieldLineageOutput>, McpError> {
        self.dispatcher
            .add_field_lineage(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(description = "Show the recorded lineage of a field and its data flow edges.")]
    async fn trace_field_lineage(
        &self,
        Parameters(input): Parameters<TraceFieldLineageInput>,
    ) -> Result<Json<TraceFieldLineageOutput>, McpError> {
        self.dispatcher
            .trace_field_lineage(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Find the tables and selected fields of a SQL query and report which fields have recorded lineage. The query is not executed."
    )]
    async fn analyze_query_lineage(
        &self,
        Parameters(input): Parameters<AnalyzeQueryLineageInput>,
    ) -> Result<Json<AnalyzeQueryLineageOutput>, McpError> {
        self.dispatcher
            .analyze_query_lineage(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }
}

#[tool_handler]
impl ServerHandler for SqliteService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "sqlite-mcp-server".to_owned(),
                title: Some("SQLite MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Tools for querying and managing local SQLite databases.\n\
                \n\
                ## Workflow\n\
                1. Call `list_tables` and `describe_table` to learn the schema\n\
                2. Read with `query`; modify with `create_table`, `insert`, `update`, `delete` or `query`\n\
                3. Every tool accepts an optional `db_path`; omit it to use the server's default database\n\
                \n\
                ## Notes\n\
                - Each call runs on its own; multi-row writes are applied in one transaction\n\
                - `update` and `delete` need a `filter` unless `all_rows` is true\n\
                - In read-only mode mutating tools are refused and `query` only accepts row-returning SQL\n\
                - Lineage records are kept in memory until the server exits"
                    .to_string(),
            ),
        }
    }
}
