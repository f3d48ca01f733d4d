//! CSV import and export tools.
//!
//! This module implements the `import_csv` and `export_csv` MCP tools.

use crate::db::schema::SchemaInspector;
use crate::db::statement::{build_create_table, insert_sql, quote_ident};
use crate::db::{BoundStatement, ConnectionManager, QueryExecutor};
use crate::error::{DbError, DbResult};
use crate::models::{ColumnSpec, QueryParam, QueryRequest};
use crate::tools::format::format_value;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, info};

/// Delimiters considered when sniffing a CSV header, in order of preference.
const DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

fn default_true() -> bool {
    true
}

/// Input for the import_csv tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ImportCsvInput {
    /// Path of the CSV file to read. The first line must be a header row
    pub csv_path: String,
    /// Target table
    pub table: String,
    /// Create the table from the CSV header if it does not exist. Default: true
    #[serde(default = "default_true")]
    pub create_table: bool,
    /// Path of the SQLite database file. Default: the server's configured database
    #[serde(default)]
    pub db_path: Option<String>,
}

/// A CSV column and the SQLite type inferred from its values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct ImportedColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

/// Output from the import_csv tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ImportCsvOutput {
    pub table: String,
    /// Number of data rows inserted
    pub rows_imported: u64,
    /// Header columns with their inferred types
    pub columns: Vec<ImportedColumn>,
    /// Detected field delimiter
    pub delimiter: String,
}

/// Input for the export_csv tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExportCsvInput {
    /// Table or view to export
    pub table: String,
    /// Path of the CSV file to write. An existing file is overwritten
    pub output_path: String,
    /// Path of the SQLite database file. Default: the server's configured database
    #[serde(default)]
    pub db_path: Option<String>,
}

/// Output from the export_csv tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ExportCsvOutput {
    pub table: String,
    /// Number of data rows written (the header is not counted)
    pub rows_exported: usize,
    pub output_path: String,
}

/// Pick the delimiter that occurs most often in the header line.
fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or_default();
    DELIMITERS
        .iter()
        .copied()
        .map(|d| (d, header.bytes().filter(|b| *b == d).count()))
        // max_by_key keeps the last maximum; reverse so earlier candidates win ties
        .rev()
        .max_by_key(|(_, count)| *count)
        .filter(|(_, count)| *count > 0)
        .map(|(d, _)| d)
        .unwrap_or(b',')
}

/// Infer a column type from its values. Empty fields are ignored.
fn infer_type<'a>(values: impl Iterator<Item = &'a str>) -> &'static str {
    let mut all_integer = true;
    let mut all_real = true;
    let mut seen = false;

    for value in values.map(str::trim).filter(|v| !v.is_empty()) {
        seen = true;
        if value.parse::<i64>().is_err() {
            all_integer = false;
        }
        if parse_real(value).is_none() {
            all_real = false;
            break;
        }
    }

    match (seen, all_integer, all_real) {
        (true, true, _) => "INTEGER",
        (true, false, true) => "REAL",
        _ => "TEXT",
    }
}

/// Finite decimal number. Rejects `NaN` and `inf` spellings, which SQLite
/// would store as NULL or lose on export.
fn parse_real(value: &str) -> Option<f64> {
    if value
        .chars()
        .any(|c| c.is_ascii_alphabetic() && !c.eq_ignore_ascii_case(&'e'))
    {
        return None;
    }
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn field_to_param(field: &str, data_type: &str) -> QueryParam {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return QueryParam::Null;
    }
    match data_type {
        "INTEGER" => trimmed
            .parse()
            .map(QueryParam::Int)
            .unwrap_or_else(|_| QueryParam::String(field.to_string())),
        "REAL" => parse_real(trimmed)
            .map(QueryParam::Float)
            .unwrap_or_else(|| QueryParam::String(field.to_string())),
        _ => QueryParam::String(field.to_string()),
    }
}

/// CSV rendering of a result cell: NULL is an empty field, booleans are 1/0.
fn csv_field(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::Bool(b) => String::from(if *b { "1" } else { "0" }),
        other => format_value(other),
    }
}

fn delimiter_name(delimiter: u8) -> String {
    match delimiter {
        b'\t' => "\\t".to_string(),
        d => char::from(d).to_string(),
    }
}

pub struct TransferToolHandler {
    connection_manager: Arc<ConnectionManager>,
    executor: QueryExecutor,
}

impl TransferToolHandler {
    pub fn new(connection_manager: Arc<ConnectionManager>) -> Self {
        Self {
            connection_manager,
            executor: QueryExecutor::new(),
        }
    }

    /// Import a CSV file. Table creation and all inserts share one transaction.
    pub async fn import_csv(&self, input: ImportCsvInput) -> DbResult<ImportCsvOutput> {
        let text = tokio::fs::read_to_string(&input.csv_path)
            .await
            .map_err(|e| DbError::io(&input.csv_path, e.to_string()))?;

        let delimiter = sniff_delimiter(&text);
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let records = reader.records().collect::<Result<Vec<_>, _>>()?;

        if headers.is_empty() || records.is_empty() {
            return Err(DbError::invalid_input(format!(
                "CSV file '{}' is empty: expected a header row and at least one data row",
                input.csv_path
            )));
        }

        let columns: Vec<ImportedColumn> = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| ImportedColumn {
                name: name.clone(),
                data_type: infer_type(records.iter().filter_map(|r| r.get(idx))).to_string(),
            })
            .collect();

        debug!(
            csv_path = %input.csv_path,
            delimiter = %delimiter_name(delimiter),
            rows = records.len(),
            "Parsed CSV file"
        );

        let pool = self.connection_manager.pool(input.db_path.as_deref()).await?;

        let mut statements = Vec::with_capacity(records.len() + 1);
        if input.create_table {
            let specs: Vec<ColumnSpec> = columns
                .iter()
                .map(|c| ColumnSpec::new(&c.name, &c.data_type))
                .collect();
            statements.push(BoundStatement::new(
                build_create_table(&input.table, &specs, true)?,
                Vec::new(),
            ));
        } else {
            SchemaInspector::require_table(&pool, &input.table).await?;
        }

        let sql = insert_sql(&input.table, &headers)?;
        for record in &records {
            let params = columns
                .iter()
                .enumerate()
                .map(|(idx, col)| field_to_param(record.get(idx).unwrap_or_default(), &col.data_type))
                .collect();
            statements.push(BoundStatement::new(sql.clone(), params));
        }

        let summary = self.executor.execute_batch(&pool, &statements).await?;

        info!(
            table = %input.table,
            csv_path = %input.csv_path,
            rows_imported = records.len(),
            execution_time_ms = summary.execution_time_ms,
            "Imported CSV"
        );

        Ok(ImportCsvOutput {
            table: input.table,
            rows_imported: records.len() as u64,
            columns,
            delimiter: delimiter_name(delimiter),
        })
    }

    /// Export every row of a table to a CSV file with a header row.
    pub async fn export_csv(&self, input: ExportCsvInput) -> DbResult<ExportCsvOutput> {
        let pool = self.connection_manager.pool(input.db_path.as_deref()).await?;
        let table = SchemaInspector::require_table(&pool, &input.table).await?;

        let request = QueryRequest::new(format!("SELECT * FROM {}", quote_ident(&table)?));
        let result = self.executor.execute_query(&pool, &request).await?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(result.columns.iter().map(|c| c.name.as_str()))?;
        for row in &result.rows {
            writer.write_record(result.columns.iter().map(|c| {
                csv_field(row.get(&c.name).unwrap_or(&JsonValue::Null))
            }))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| DbError::internal(format!("Failed to flush CSV output: {}", e)))?;

        tokio::fs::write(&input.output_path, bytes)
            .await
            .map_err(|e| DbError::io(&input.output_path, e.to_string()))?;

        info!(
            table = %table,
            output_path = %input.output_path,
            rows_exported = result.row_count(),
            "Exported CSV"
        );

        Ok(ExportCsvOutput {
            table,
            rows_exported: result.row_count(),
            output_path: input.output_path,
        })
    }
}
