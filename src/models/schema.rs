//! Schema-related data models.
//!
//! This module defines types for schema introspection and table creation.

use crate::models::QueryParam;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TableInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub table_type: TableType,
    /// Bytes on disk (data + indexes). Only present when SQLite was built with dbstat.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_size_formatted: Option<String>,
}

impl TableInfo {
    /// Create a new table info.
    pub fn new(name: impl Into<String>, table_type: TableType) -> Self {
        Self {
            name: name.into(),
            table_type,
            total_size: None,
            total_size_formatted: None,
        }
    }

    /// Set the total size in bytes (data + indexes).
    pub fn with_total_size(mut self, total_size: u64) -> Self {
        self.total_size = Some(total_size);
        self.total_size_formatted = Some(format_size(total_size));
        self
    }
}

/// Format bytes as human-readable size string.
///
/// Uses binary units (1 KB = 1024 bytes) via the `humansize` WINDOWS preset.
///
/// # Examples
///
/// ```
/// use sqlite_mcp_server::models::schema::format_size;
///
/// assert_eq!(format_size(512), "512 B");
/// assert_eq!(format_size(1024), "1 kB");
/// ```
pub fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::WINDOWS)
}

/// Type of schema object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TableType {
    Table,
    View,
}

impl TableType {
    /// Parse the `type` column of `sqlite_master`.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("view") {
            Self::View
        } else {
            Self::Table
        }
    }
}

impl std::fmt::Display for TableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::View => write!(f, "view"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TableSchema {
    pub table_name: String,
    /// Columns in declaration order
    pub columns: Vec<ColumnDefinition>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKey>,
    pub indexes: Vec<IndexInfo>,
    pub row_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ColumnDefinition {
    pub name: String,
    /// Declared type, as written in CREATE TABLE (may be empty)
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    /// Default expression as SQL text (e.g. `'draft'`, `0`, `CURRENT_TIMESTAMP`)
    #[serde(rename = "default", skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    pub primary_key: bool,
}

impl ColumnDefinition {
    /// Create a new column definition.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
            default_value: None,
            primary_key: false,
        }
    }

    /// Set whether this is a primary key column.
    pub fn with_primary_key(mut self, is_pk: bool) -> Self {
        self.primary_key = is_pk;
        self
    }

    /// Set the default expression.
    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }

    /// True for `INTEGER PRIMARY KEY` columns, which alias the rowid and are
    /// assigned automatically on insert.
    pub fn is_rowid_alias(&self) -> bool {
        self.primary_key && self.data_type.eq_ignore_ascii_case("integer")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ForeignKey {
    pub column: String,
    pub references_table: String,
    pub references_column: String,
    pub on_delete: ForeignKeyAction,
    pub on_update: ForeignKeyAction,
}

impl ForeignKey {
    /// Create a new foreign key.
    pub fn new(
        column: impl Into<String>,
        references_table: impl Into<String>,
        references_column: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            references_table: references_table.into(),
            references_column: references_column.into(),
            on_delete: ForeignKeyAction::NoAction,
            on_update: ForeignKeyAction::NoAction,
        }
    }

    /// Set the on delete action.
    pub fn with_on_delete(mut self, action: ForeignKeyAction) -> Self {
        self.on_delete = action;
        self
    }

    /// Set the on update action.
    pub fn with_on_update(mut self, action: ForeignKeyAction) -> Self {
        self.on_update = action;
        self
    }
}

/// Foreign key referential action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ForeignKeyAction {
    #[default]
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ForeignKeyAction {
    /// Parse from the `on_delete`/`on_update` columns of `PRAGMA foreign_key_list`.
    pub fn parse(s: &str) -> Self {
        let upper = s.to_uppercase();
        match upper.as_str() {
            "CASCADE" => Self::Cascade,
            "SET NULL" => Self::SetNull,
            "SET DEFAULT" => Self::SetDefault,
            "RESTRICT" => Self::Restrict,
            _ => Self::NoAction,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IndexInfo {
    pub name: String,
    pub columns: Vec<String>,
    pub is_unique: bool,
    pub is_primary: bool,
}

impl IndexInfo {
    /// Create a new index info.
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            is_unique: false,
            is_primary: false,
        }
    }

    /// Set whether this is a unique index.
    pub fn with_unique(mut self, is_unique: bool) -> Self {
        self.is_unique = is_unique;
        self
    }

    /// Set whether this is the primary key index.
    pub fn with_primary(mut self, is_primary: bool) -> Self {
        self.is_primary = is_primary;
        if is_primary {
            self.is_unique = true;
        }
        self
    }
}

/// Column specification for `create_table`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ColumnSpec {
    /// Column name
    pub name: String,
    /// SQLite type, e.g. "INTEGER", "TEXT", "REAL", "BLOB", "VARCHAR(255)". Default: no declared type
    #[serde(rename = "type", default)]
    pub data_type: Option<String>,
    /// Part of the primary key. Several flagged columns form a composite key
    #[serde(default)]
    pub primary_key: bool,
    /// Add a NOT NULL constraint
    #[serde(default)]
    pub not_null: bool,
    /// Add a UNIQUE constraint
    #[serde(default)]
    pub unique: bool,
    /// Default value for the column
    #[serde(default)]
    pub default: Option<QueryParam>,
}

impl ColumnSpec {
    /// Create a column spec with a declared type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: Some(data_type.into()),
            primary_key: false,
            not_null: false,
            unique: false,
            default: None,
        }
    }

    /// Mark as (part of) the primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Add a NOT NULL constraint.
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Add a UNIQUE constraint.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Set a default value.
    pub fn with_default(mut self, value: QueryParam) -> Self {
        self.default = Some(value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_type_parsing() {
        assert_eq!(TableType::parse("table"), TableType::Table);
        assert_eq!(TableType::parse("view"), TableType::View);
        assert_eq!(TableType::parse("VIEW"), TableType::View);
    }

    #[test]
    fn test_foreign_key_action_parsing() {
        assert_eq!(ForeignKeyAction::parse("CASCADE"), ForeignKeyAction::Cascade);
        assert_eq!(ForeignKeyAction::parse("set null"), ForeignKeyAction::SetNull);
        assert_eq!(ForeignKeyAction::parse("NO ACTION"), ForeignKeyAction::NoAction);
    }

    #[test]
    fn test_rowid_alias() {
        let col = ColumnDefinition::new("id", "INTEGER", true).with_primary_key(true);
        assert!(col.is_rowid_alias());
        let col = ColumnDefinition::new("id", "BIGINT", true).with_primary_key(true);
        assert!(!col.is_rowid_alias());
        let col = ColumnDefinition::new("n", "integer", true);
        assert!(!col.is_rowid_alias());
    }

    #[test]
    fn test_table_info_size_formatting() {
        let info = TableInfo::new("users", TableType::Table).with_total_size(4096);
        assert_eq!(info.total_size, Some(4096));
        assert_eq!(info.total_size_formatted.as_deref(), Some("4 kB"));
    }

    #[test]
    fn test_column_spec_deserialization() {
        let json = r#"{"name": "status", "type": "TEXT", "not_null": true, "default": "draft"}"#;
        let spec: ColumnSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.data_type.as_deref(), Some("TEXT"));
        assert!(spec.not_null);
        assert!(!spec.primary_key);
        assert_eq!(spec.default, Some(QueryParam::String("draft".to_string())));
    }
}
