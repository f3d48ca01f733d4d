//! Query-related data models.
//!
//! This module defines types for SQL statement requests and results.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A parameter value for parameterized statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum QueryParam {
    /// NULL value
    Null,
    /// Boolean value (stored as 0/1)
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Arrays and objects, stored as JSON text
    Json(JsonValue),
}

impl QueryParam {
    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Json(_) => "json",
        }
    }

    /// Render this value as a SQL literal.
    ///
    /// Only used where SQLite does not accept bound parameters (column
    /// `DEFAULT` clauses in `CREATE TABLE`).
    pub fn to_sql_literal(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Bool(v) => String::from(if *v { "1" } else { "0" }),
            Self::Int(v) => v.to_string(),
            Self::Float(v) if v.is_finite() => v.to_string(),
            Self::Float(_) => "NULL".to_string(),
            Self::String(v) => quote_literal(v),
            Self::Json(v) => quote_literal(&v.to_string()),
        }
    }
}

fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub sql: String,
    #[serde(default)]
    pub params: Vec<QueryParam>,
    /// Default: true
    #[serde(default = "default_decode_binary")]
    pub decode_binary: bool,
}

fn default_decode_binary() -> bool {
    true
}

impl QueryRequest {
    /// Create a new query request with default options.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            decode_binary: true,
        }
    }

    /// Add a parameter to this query.
    pub fn with_param(mut self, param: QueryParam) -> Self {
        self.params.push(param);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ColumnMetadata {
    pub name: String,
    /// SQLite type name reported by the driver (e.g. "INTEGER", "TEXT"; "NULL" for untyped expressions)
    pub type_name: String,
}

impl ColumnMetadata {
    /// Create new column metadata.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Get the number of rows in the result.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Check if the result is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Outcome of a mutating statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteSummary {
    pub rows_affected: u64,
    /// Rowid of the most recent successful INSERT on the connection
    pub last_insert_rowid: i64,
    pub execution_time_ms: u64,
}

impl WriteSummary {
    /// Fold the outcome of one more statement into this summary.
    pub fn absorb(&mut self, rows_affected: u64, last_insert_rowid: i64) {
        self.rows_affected += rows_affected;
        if rows_affected > 0 {
            self.last_insert_rowid = last_insert_rowid;
        }
    }
}
