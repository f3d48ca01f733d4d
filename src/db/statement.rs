//! Safe SQL statement building for the structured write tools.
//!
//! Identifiers are always double-quoted and values always bound as
//! parameters; the only values rendered as literals are column `DEFAULT`s,
//! which SQLite does not accept as bound parameters.

use crate::db::executor::BoundStatement;
use crate::error::{DbError, DbResult};
use crate::models::{ColumnSpec, QueryParam};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Column → value mapping used for `set` and `filter` arguments.
pub type ValueMap = BTreeMap<String, QueryParam>;

/// Declared type names: words, optionally followed by a `(n)` or `(p, s)` size.
static TYPE_NAME_RE: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_]*( [A-Za-z][A-Za-z0-9_]*)*( ?\(\s*[+-]?\d+\s*(,\s*[+-]?\d+\s*)?\))?$")
});

/// Quote an identifier for SQLite, doubling embedded quotes.
pub fn quote_ident(name: &str) -> DbResult<String> {
    if name.is_empty() {
        return Err(DbError::invalid_input("Identifier cannot be empty"));
    }
    if name.contains('\0') {
        return Err(DbError::invalid_input(format!(
            "Identifier '{}' contains a NUL character",
            name.escape_default()
        )));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

fn validate_type_name(type_name: &str) -> DbResult<()> {
    let re = TYPE_NAME_RE
        .as_ref()
        .map_err(|e| DbError::internal(format!("Invalid type name pattern: {}", e)))?;
    if re.is_match(type_name.trim()) {
        Ok(())
    } else {
        Err(DbError::invalid_input(format!(
            "Invalid column type '{}'. Use a SQLite type name such as INTEGER, TEXT, REAL, BLOB or VARCHAR(255)",
            type_name
        )))
    }
}

/// Build a `CREATE TABLE` statement.
///
/// A single primary key column is declared inline (so `INTEGER PRIMARY KEY`
/// keeps its rowid alias semantics); several become a table-level constraint.
pub fn build_create_table(table: &str, columns: &[ColumnSpec], if_not_exists: bool) -> DbResult<String> {
    if columns.is_empty() {
        return Err(DbError::invalid_input(format!(
            "Table '{}' needs at least one column",
            table
        )));
    }

    let mut seen = std::collections::HashSet::new();
    for col in columns {
        if !seen.insert(col.name.to_lowercase()) {
            return Err(DbError::invalid_input(format!(
                "Duplicate column name '{}'",
                col.name
            )));
        }
    }

    let pk_columns: Vec<&ColumnSpec> = columns.iter().filter(|c| c.primary_key).collect();
    let inline_pk = pk_columns.len() == 1;

    let mut defs = Vec::with_capacity(columns.len() + 1);
    for col in columns {
        let mut def = quote_ident(&col.name)?;
        if let Some(type_name) = col.data_type.as_deref().filter(|t| !t.trim().is_empty()) {
            validate_type_name(type_name)?;
            def.push(' ');
            def.push_str(type_name.trim());
        }
        if col.primary_key && inline_pk {
            def.push_str(" PRIMARY KEY");
        }
        if col.not_null {
            def.push_str(" NOT NULL");
        }
        if col.unique {
            def.push_str(" UNIQUE");
        }
        if let Some(default) = &col.default {
            def.push_str(" DEFAULT ");
            def.push_str(&default.to_sql_literal());
        }
        defs.push(def);
    }

    if pk_columns.len() > 1 {
        let names = pk_columns
            .iter()
            .map(|c| quote_ident(&c.name))
            .collect::<DbResult<Vec<_>>>()?;
        defs.push(format!("PRIMARY KEY ({})", names.join(", ")));
    }

    Ok(format!(
        "CREATE TABLE {}{} ({})",
        if if_not_exists { "IF NOT EXISTS " } else { "" },
        quote_ident(table)?,
        defs.join(", ")
    ))
}

/// Build one `INSERT` statement per row.
///
/// Every row must carry the same set of columns so the batch is a uniform
/// multi-row insert.
pub fn build_inserts(
    table: &str,
    rows: &[serde_json::Map<String, serde_json::Value>],
) -> DbResult<Vec<BoundStatement>> {
    let first = rows
        .first()
        .ok_or_else(|| DbError::invalid_input("rows must contain at least one row"))?;
    if first.is_empty() {
        return Err(DbError::invalid_input(
            "Each row must contain at least one column",
        ));
    }

    let columns: Vec<&String> = first.keys().collect();
    let sql = insert_sql(table, &columns)?;

    rows.iter()
        .enumerate()
        .map(|(idx, row)| {
            if row.len() != columns.len() || !columns.iter().all(|c| row.contains_key(*c)) {
                return Err(DbError::invalid_input(format!(
                    "Row {} has different columns than row 0; all rows must use the same keys",
                    idx
                )));
            }
            let params = columns
                .iter()
                .map(|c| crate::db::params::json_to_param(&row[*c]))
                .collect();
            Ok(BoundStatement::new(sql.clone(), params))
        })
        .collect()
}

/// `INSERT INTO "t" ("a", "b") VALUES (?, ?)`
pub fn insert_sql<S: AsRef<str>>(table: &str, columns: &[S]) -> DbResult<String> {
    let names = columns
        .iter()
        .map(|c| quote_ident(c.as_ref()))
        .collect::<DbResult<Vec<_>>>()?;
    let placeholders = vec!["?"; names.len()].join(", ");
    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table)?,
        names.join(", "),
        placeholders
    ))
}

/// Build an `UPDATE` statement.
pub fn build_update(table: &str, set: &ValueMap, filter: &ValueMap) -> DbResult<BoundStatement> {
    if set.is_empty() {
        return Err(DbError::invalid_input("set must name at least one column"));
    }

    let mut params = Vec::with_capacity(set.len() + filter.len());
    let mut assignments = Vec::with_capacity(set.len());
    for (column, value) in set {
        assignments.push(format!("{} = ?", quote_ident(column)?));
        params.push(value.clone());
    }

    let mut sql = format!("UPDATE {} SET {}", quote_ident(table)?, assignments.join(", "));
    sql.push_str(&where_clause(filter, &mut params)?);
    Ok(BoundStatement::new(sql, params))
}

/// Build a `DELETE` statement.
pub fn build_delete(table: &str, filter: &ValueMap) -> DbResult<BoundStatement> {
    let mut params = Vec::with_capacity(filter.len());
    let mut sql = format!("DELETE FROM {}", quote_ident(table)?);
    sql.push_str(&where_clause(filter, &mut params)?);
    Ok(BoundStatement::new(sql, params))
}

/// AND-ed equality predicates; a null value matches with `IS NULL`.
fn where_clause(filter: &ValueMap, params: &mut Vec<QueryParam>) -> DbResult<String> {
    if filter.is_empty() {
        return Ok(String::new());
    }
    let mut predicates = Vec::with_capacity(filter.len());
    for (column, value) in filter {
        let ident = quote_ident(column)?;
        if value.is_null() {
            predicates.push(format!("{} IS NULL", ident));
        } else {
            predicates.push(format!("{} = ?", ident));
            params.push(value.clone());
        }
    }
    Ok(format!(" WHERE {}", predicates.join(" AND ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users").unwrap(), "\"users\"");
        assert_eq!(quote_ident("we\"ird").unwrap(), "\"we\"\"ird\"");
        assert!(quote_ident("").is_err());
        assert!(quote_ident("a\0b").is_err());
    }

    #[test]
    fn test_create_table_inline_primary_key() {
        let columns = vec![
            ColumnSpec::new("id", "INTEGER").primary_key(),
            ColumnSpec::new("email", "TEXT").not_null().unique(),
            ColumnSpec::new("status", "VARCHAR(16)").with_default(QueryParam::String("new".into())),
        ];
        let sql = build_create_table("users", &columns, false).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE \"users\" (\"id\" INTEGER PRIMARY KEY, \"email\" TEXT NOT NULL UNIQUE, \"status\" VARCHAR(16) DEFAULT 'new')"
        );
    }

    #[test]
    fn test_create_table_composite_primary_key() {
        let columns = vec![
            ColumnSpec::new("a", "INTEGER").primary_key(),
            ColumnSpec::new("b", "INTEGER").primary_key(),
        ];
        let sql = build_create_table("pairs", &columns, true).unwrap();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"pairs\""));
        assert!(sql.ends_with("PRIMARY KEY (\"a\", \"b\"))"));
        assert!(!sql.contains("INTEGER PRIMARY KEY"));
    }

    #[test]
    fn test_create_table_rejects_injected_type() {
        let columns = vec![ColumnSpec::new("x", "TEXT); DROP TABLE users; --")];
        assert!(build_create_table("t", &columns, false).is_err());
    }

    #[test]
    fn test_create_table_accepts_multiword_types() {
        let columns = vec![
            ColumnSpec::new("a", "DOUBLE PRECISION"),
            ColumnSpec::new("b", "DECIMAL(10, 2)"),
            ColumnSpec::new("c", "UNSIGNED BIG INT"),
        ];
        assert!(build_create_table("t", &columns, false).is_ok());
    }

    #[test]
    fn test_create_table_rejects_duplicate_columns() {
        let columns = vec![ColumnSpec::new("a", "TEXT"), ColumnSpec::new("A", "TEXT")];
        assert!(build_create_table("t", &columns, false).is_err());
    }

    #[test]
    fn test_build_inserts_uniform_rows() {
        let rows = vec![
            json!({"name": "a", "age": 1}).as_object().unwrap().clone(),
            json!({"age": 2, "name": "b"}).as_object().unwrap().clone(),
        ];
        let stmts = build_inserts("people", &rows).unwrap();
        assert_eq!(stmts.len(), 2);
        assert_eq!(
            stmts[0].sql,
            "INSERT INTO \"people\" (\"name\", \"age\") VALUES (?, ?)"
        );
        assert_eq!(
            stmts[1].params,
            vec![QueryParam::String("b".into()), QueryParam::Int(2)]
        );
    }

    #[test]
    fn test_build_inserts_rejects_mismatched_rows() {
        let rows = vec![
            json!({"name": "a"}).as_object().unwrap().clone(),
            json!({"nick": "b"}).as_object().unwrap().clone(),
        ];
        assert!(build_inserts("people", &rows).is_err());
        assert!(build_inserts("people", &[]).is_err());
    }

    #[test]
    fn test_build_update_with_null_filter() {
        let set = ValueMap::from([("status".to_string(), QueryParam::String("done".into()))]);
        let filter = ValueMap::from([
            ("deleted_at".to_string(), QueryParam::Null),
            ("id".to_string(), QueryParam::Int(3)),
        ]);
        let stmt = build_update("tasks", &set, &filter).unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE \"tasks\" SET \"status\" = ? WHERE \"deleted_at\" IS NULL AND \"id\" = ?"
        );
        assert_eq!(
            stmt.params,
            vec![QueryParam::String("done".into()), QueryParam::Int(3)]
        );
    }

    #[test]
    fn test_build_delete_without_filter() {
        let stmt = build_delete("tasks", &ValueMap::new()).unwrap();
        assert_eq!(stmt.sql, "DELETE FROM \"tasks\"");
        assert!(stmt.params.is_empty());
    }
}
