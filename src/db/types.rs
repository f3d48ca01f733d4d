//! SQLite type mappings.
//!
//! This module maps SQLite values onto JSON.
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. `StorageClass` reads the storage class of the value actually stored in a
//!    cell (SQLite is dynamically typed, so a column declared INTEGER may still
//!    hold TEXT)
//! 2. `TypeCategory` classifies a column's declared type by SQLite affinity
//!    rules, which only refines the result (BOOLEAN columns decode to `bool`)
//!
//! The same affinity classification drives sample data generation and CSV type
//! inference.

use crate::models::ColumnMetadata;
use serde_json::Value as JsonValue;
use sqlx::sqlite::{SqliteRow, SqliteValueRef};
use sqlx::{Column, Decode, Row, Sqlite, TypeInfo, ValueRef};

// =============================================================================
// Type Classification
// =============================================================================

/// Storage class of a single SQLite value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Null,
    Integer,
    Real,
    Text,
    Blob,
}

impl StorageClass {
    /// Map a driver type name onto a storage class.
    pub fn from_type_name(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "NULL" => Self::Null,
            "INTEGER" | "BOOLEAN" => Self::Integer,
            "REAL" => Self::Real,
            "BLOB" => Self::Blob,
            _ => Self::Text,
        }
    }
}

/// Logical category for a declared column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Boolean,
    Integer,
    Float,
    Numeric,
    Text,
    Binary,
}

/// Classify a declared column type following SQLite's affinity rules.
///
/// Rule order matters: `FLOATING POINT` contains "INT" and gets INTEGER
/// affinity in SQLite as well.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    let lower = type_name.trim().to_lowercase();

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }
    if lower.contains("int") {
        return TypeCategory::Integer;
    }
    if lower.contains("char") || lower.contains("clob") || lower.contains("text") {
        return TypeCategory::Text;
    }
    if lower.is_empty() || lower.contains("blob") {
        return TypeCategory::Binary;
    }
    if lower.contains("real") || lower.contains("floa") || lower.contains("doub") {
        return TypeCategory::Float;
    }
    TypeCategory::Numeric
}

// =============================================================================
// Binary Encoding
// =============================================================================

/// Decode binary data to JSON value.
///
/// If `decode_binary` is true, attempts to decode as UTF-8 text first.
/// Falls back to base64 encoding if not valid UTF-8 or if `decode_binary` is false.
pub fn decode_binary_value(bytes: &[u8], decode_binary: bool) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    if decode_binary {
        match std::str::from_utf8(bytes) {
            Ok(s) => JsonValue::String(s.to_string()),
            Err(_) => JsonValue::String(STANDARD.encode(bytes)),
        }
    } else {
        JsonValue::String(STANDARD.encode(bytes))
    }
}

// =============================================================================
// Row to JSON Trait
// =============================================================================

/// Trait for converting database rows to JSON maps.
pub trait RowToJson {
    fn to_json_map_with_options(&self, decode_binary: bool) -> serde_json::Map<String, JsonValue>;
    fn get_column_metadata(&self) -> Vec<ColumnMetadata>;
}

impl RowToJson for SqliteRow {
    fn to_json_map_with_options(&self, decode_binary: bool) -> serde_json::Map<String, JsonValue> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let declared = categorize_type(col.type_info().name());
                let value = match self.try_get_raw(idx) {
                    Ok(raw) => decode_value(raw, declared, decode_binary),
                    Err(e) => {
                        tracing::error!(column = %col.name(), error = %e, "Failed to read column");
                        JsonValue::Null
                    }
                };
                (col.name().to_string(), value)
            })
            .collect()
    }

    fn get_column_metadata(&self) -> Vec<ColumnMetadata> {
        self.columns()
            .iter()
            .map(|col| ColumnMetadata::new(col.name(), col.type_info().name()))
            .collect()
    }
}

/// Decode one cell by its storage class.
fn decode_value(value: SqliteValueRef<'_>, declared: TypeCategory, decode_binary: bool) -> JsonValue {
    if value.is_null() {
        return JsonValue::Null;
    }
    let class = StorageClass::from_type_name(value.type_info().name());

    match class {
        StorageClass::Null => JsonValue::Null,
        StorageClass::Integer => match <i64 as Decode<Sqlite>>::decode(value) {
            Ok(v) if declared == TypeCategory::Boolean && (v == 0 || v == 1) => {
                JsonValue::Bool(v == 1)
            }
            Ok(v) => JsonValue::Number(v.into()),
            Err(e) => decode_failed("INTEGER", e),
        },
        StorageClass::Real => match <f64 as Decode<Sqlite>>::decode(value) {
            Ok(v) => serde_json::Number::from_f64(v)
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::String(v.to_string())),
            Err(e) => decode_failed("REAL", e),
        },
        StorageClass::Text => match <String as Decode<Sqlite>>::decode(value) {
            Ok(v) => JsonValue::String(v),
            Err(e) => decode_failed("TEXT", e),
        },
        StorageClass::Blob => match <Vec<u8> as Decode<Sqlite>>::decode(value) {
            Ok(v) => decode_binary_value(&v, decode_binary),
            Err(e) => decode_failed("BLOB", e),
        },
    }
}

fn decode_failed(class: &str, error: sqlx::error::BoxDynError) -> JsonValue {
    tracing::error!(storage_class = class, error = %error, "Failed to decode value");
    JsonValue::Null
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_type_affinity() {
        assert_eq!(categorize_type("INTEGER"), TypeCategory::Integer);
        assert_eq!(categorize_type("BIGINT"), TypeCategory::Integer);
        assert_eq!(categorize_type("VARCHAR(255)"), TypeCategory::Text);
        assert_eq!(categorize_type("CLOB"), TypeCategory::Text);
        assert_eq!(categorize_type("BLOB"), TypeCategory::Binary);
        assert_eq!(categorize_type(""), TypeCategory::Binary);
        assert_eq!(categorize_type("DOUBLE PRECISION"), TypeCategory::Float);
        assert_eq!(categorize_type("DECIMAL(10,2)"), TypeCategory::Numeric);
        assert_eq!(categorize_type("DATETIME"), TypeCategory::Numeric);
        assert_eq!(categorize_type("boolean"), TypeCategory::Boolean);
    }

    #[test]
    fn test_floating_point_has_integer_affinity() {
        assert_eq!(categorize_type("FLOATING POINT"), TypeCategory::Integer);
    }

    #[test]
    fn test_storage_class_from_type_name() {
        assert_eq!(StorageClass::from_type_name("INTEGER"), StorageClass::Integer);
        assert_eq!(StorageClass::from_type_name("REAL"), StorageClass::Real);
        assert_eq!(StorageClass::from_type_name("TEXT"), StorageClass::Text);
        assert_eq!(StorageClass::from_type_name("BLOB"), StorageClass::Blob);
        assert_eq!(StorageClass::from_type_name("NULL"), StorageClass::Null);
    }

    #[test]
    fn test_decode_binary_value_with_valid_utf8() {
        let bytes = b"hello world";
        let result = decode_binary_value(bytes, true);
        assert_eq!(result, JsonValue::String("hello world".to_string()));

        let result = decode_binary_value(bytes, false);
        assert_eq!(result, JsonValue::String("aGVsbG8gd29ybGQ=".to_string()));
    }

    #[test]
    fn test_decode_binary_value_with_invalid_utf8() {
        let bytes: &[u8] = &[0xFF, 0xFE, 0x00, 0x01];
        let result = decode_binary_value(bytes, true);
        assert_eq!(result, JsonValue::String("//4AAQ==".to_string()));

        let result = decode_binary_value(bytes, false);
        assert_eq!(result, JsonValue::String("//4AAQ==".to_string()));
    }

    #[test]
    fn test_decode_binary_value_empty() {
        let bytes: &[u8] = &[];
        assert_eq!(decode_binary_value(bytes, true), JsonValue::String(String::new()));
    }
}
