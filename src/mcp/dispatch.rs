//! Tool dispatch table.
//!
//! [`ToolKind`] is the closed set of registered tools. [`Dispatcher`] owns one
//! handler per tool family and exposes a typed method per tool, plus
//! [`Dispatcher::call`] for dispatching by name with JSON arguments.

use crate::db::ConnectionManager;
use crate::error::{DbError, DbResult};
use crate::lineage::FieldTracker;
use crate::tools::{
    AddFieldLineageInput, AddFieldLineageOutput, AnalyzeQueryLineageInput,
    AnalyzeQueryLineageOutput, ConnectDatabaseInput, ConnectDatabaseOutput, CreateTableInput,
    CreateTableOutput, DeleteInput, DescribeTableInput, DescribeTableOutput, ExportCsvInput,
    ExportCsvOutput, GenerateSampleDataInput, GenerateSampleDataOutput, ImportCsvInput,
    ImportCsvOutput, InsertInput, InsertOutput, LineageToolHandler, ListTablesInput,
    ListTablesOutput, QueryInput, QueryOutput, QueryToolHandler, SampleDataToolHandler,
    SchemaToolHandler, TraceFieldLineageInput, TraceFieldLineageOutput, TransferToolHandler,
    UpdateInput, WriteOutput, WriteToolHandler,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// A registered tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Query,
    CreateTable,
    Insert,
    Update,
    Delete,
    ListTables,
    DescribeTable,
    ConnectDatabase,
    ImportCsv,
    ExportCsv,
    GenerateSampleData,
    AddFieldLineage,
    TraceFieldLineage,
    AnalyzeQueryLineage,
}

impl ToolKind {
    pub const ALL: [ToolKind; 14] = [
        Self::Query,
        Self::CreateTable,
        Self::Insert,
        Self::Update,
        Self::Delete,
        Self::ListTables,
        Self::DescribeTable,
        Self::ConnectDatabase,
        Self::ImportCsv,
        Self::ExportCsv,
        Self::GenerateSampleData,
        Self::AddFieldLineage,
        Self::TraceFieldLineage,
        Self::AnalyzeQueryLineage,
    ];

    /// Tool name as registered with MCP.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::CreateTable => "create_table",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::ListTables => "list_tables",
            Self::DescribeTable => "describe_table",
            Self::ConnectDatabase => "connect_database",
            Self::ImportCsv => "import_csv",
            Self::ExportCsv => "export_csv",
            Self::GenerateSampleData => "generate_sample_data",
            Self::AddFieldLineage => "add_field_lineage",
            Self::TraceFieldLineage => "trace_field_lineage",
            Self::AnalyzeQueryLineage => "analyze_query_lineage",
        }
    }

    /// Whether the tool always modifies the database.
    ///
    /// `query` is not listed: whether it writes depends on its SQL, which the
    /// query handler classifies itself.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::CreateTable
                | Self::Insert
                | Self::Update
                | Self::Delete
                | Self::ImportCsv
                | Self::GenerateSampleData
        )
    }

    fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(ToolKind::as_str).collect()
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolKind {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| DbError::unsupported_operation(s, &Self::names()))
    }
}

/// Routes tool calls to their handlers.
pub struct Dispatcher {
    connection_manager: Arc<ConnectionManager>,
    query: QueryToolHandler,
    write: WriteToolHandler,
    schema: SchemaToolHandler,
    transfer: TransferToolHandler,
    sample: SampleDataToolHandler,
    lineage: LineageToolHandler,
}

impl Dispatcher {
    pub fn new(connection_manager: Arc<ConnectionManager>, tracker: FieldTracker) -> Self {
        Self {
            query: QueryToolHandler::new(connection_manager.clone()),
            write: WriteToolHandler::new(connection_manager.clone()),
            schema: SchemaToolHandler::new(connection_manager.clone()),
            transfer: TransferToolHandler::new(connection_manager.clone()),
            sample: SampleDataToolHandler::new(connection_manager.clone()),
            lineage: LineageToolHandler::new(tracker),
            connection_manager,
        }
    }

    /// Refuse mutating tools when the server runs read-only.
    fn ensure_writable(&self, kind: ToolKind) -> DbResult<()> {
        if kind.is_mutating() && self.connection_manager.is_read_only() {
            return Err(DbError::permission(
                kind.as_str(),
                "The server runs in read-only mode. Restart it without --read-only to modify data",
            ));
        }
        Ok(())
    }

    /// Dispatch a call by tool name with JSON arguments.
    ///
    /// Unknown names fail with an unsupported-operation error. `null`
    /// arguments are treated as an empty object.
    pub async fn call(&self, name: &str, args: JsonValue) -> DbResult<JsonValue> {
        let kind: ToolKind = name.parse()?;
        debug!(tool = %kind, "Dispatching tool call");

        match kind {
            ToolKind::Query => to_json(self.query(parse_args(kind, args)?).await?),
            ToolKind::CreateTable => to_json(self.create_table(parse_args(kind, args)?).await?),
            ToolKind::Insert => to_json(self.insert(parse_args(kind, args)?).await?),
            ToolKind::Update => to_json(self.update(parse_args(kind, args)?).await?),
            ToolKind::Delete => to_json(self.delete(parse_args(kind, args)?).await?),
            ToolKind::ListTables => to_json(self.list_tables(parse_args(kind, args)?).await?),
            ToolKind::DescribeTable => {
                to_json(self.describe_table(parse_args(kind, args)?).await?)
            }
            ToolKind::ConnectDatabase => {
                to_json(self.connect_database(parse_args(kind, args)?).await?)
            }
            ToolKind::ImportCsv => to_json(self.import_csv(parse_args(kind, args)?).await?),
            ToolKind::ExportCsv => to_json(self.export_csv(parse_args(kind, args)?).await?),
            ToolKind::GenerateSampleData => {
                to_json(self.generate_sample_data(parse_args(kind, args)?).await?)
            }
            ToolKind::AddFieldLineage => {
                to_json(self.add_field_lineage(parse_args(kind, args)?).await?)
            }
            ToolKind::TraceFieldLineage => {
                to_json(self.trace_field_lineage(parse_args(kind, args)?).await?)
            }
            ToolKind::AnalyzeQueryLineage => {
                to_json(self.analyze_query_lineage(parse_args(kind, args)?).await?)
            }
        }
    }

    pub async fn query(&self, input: QueryInput) -> DbResult<QueryOutput> {
        self.query.query(input).await
    }

    pub async fn create_table(&self, input: CreateTableInput) -> DbResult<CreateTableOutput> {
        self.ensure_writable(ToolKind::CreateTable)?;
        self.write.create_table(input).await
    }

    pub async fn insert(&self, input: InsertInput) -> DbResult<InsertOutput> {
        self.ensure_writable(ToolKind::Insert)?;
        self.write.insert(input).await
    }

    pub async fn update(&self, input: UpdateInput) -> DbResult<WriteOutput> {
        self.ensure_writable(ToolKind::Update)?;
        self.write.update(input).await
    }

    pub async fn delete(&self, input: DeleteInput) -> DbResult<WriteOutput> {
        self.ensure_writable(ToolKind::Delete)?;
        self.write.delete(input).await
    }

    pub async fn list_tables(&self, input: ListTablesInput) -> DbResult<ListTablesOutput> {
        self.schema.list_tables(input).await
    }

    pub async fn describe_table(&self, input: DescribeTableInput) -> DbResult<DescribeTableOutput> {
        self.schema.describe_table(input).await
    }

    pub async fn connect_database(
        &self,
        input: ConnectDatabaseInput,
    ) -> DbResult<ConnectDatabaseOutput> {
        self.schema.connect_database(input).await
    }

    pub async fn import_csv(&self, input: ImportCsvInput) -> DbResult<ImportCsvOutput> {
        self.ensure_writable(ToolKind::ImportCsv)?;
        self.transfer.import_csv(input).await
    }

    pub async fn export_csv(&self, input: ExportCsvInput) -> DbResult<ExportCsvOutput> {
        self.transfer.export_csv(input).await
    }

    pub async fn generate_sample_data(
        &self,
        input: GenerateSampleDataInput,
    ) -> DbResult<GenerateSampleDataOutput> {
        self.ensure_writable(ToolKind::GenerateSampleData)?;
        self.sample.generate_sample_data(input).await
    }

    pub async fn add_field_lineage(
        &self,
        input: AddFieldLineageInput,
    ) -> DbResult<AddFieldLineageOutput> {
        self.lineage.add_field_lineage(input).await
    }

    pub async fn trace_field_lineage(
        &self,
        input: TraceFieldLineageInput,
    ) -> DbResult<TraceFieldLineageOutput> {
        self.lineage.trace_field_lineage(input).await
    }

    pub async fn analyze_query_lineage(
        &self,
        input: AnalyzeQueryLineageInput,
    ) -> DbResult<AnalyzeQueryLineageOutput> {
        self.lineage.analyze_query_lineage(input).await
    }
}

fn parse_args<T: DeserializeOwned>(kind: ToolKind, args: JsonValue) -> DbResult<T> {
    let args = if args.is_null() {
        JsonValue::Object(serde_json::Map::new())
    } else {
        args
    };
    serde_json::from_value(args)
        .map_err(|e| DbError::invalid_input(format!("Invalid arguments for '{}': {}", kind, e)))
}

fn to_json<T: Serialize>(output: T) -> DbResult<JsonValue> {
    serde_json::to_value(output)
        .map_err(|e| DbError::internal(format!("Failed to serialize tool output: {}", e)))
}
