//! Schema introspection module.
//!
//! This module provides SQLite schema introspection through `sqlite_master`
//! and the table-valued pragma functions.
//!
//! # Architecture
//!
//! SQL queries are organized in the `queries` submodule as constants. The
//! pragma functions (`pragma_table_info(?)` and friends) accept the table name
//! as a bound parameter, so no identifier is ever spliced into introspection
//! SQL.

use crate::db::statement::quote_ident;
use crate::error::{DbError, DbResult};
use crate::models::{
    ColumnDefinition, ForeignKey, ForeignKeyAction, IndexInfo, TableInfo, TableSchema, TableType,
};
use sqlx::{Row, SqlitePool};
use tracing::debug;

/// Schema inspector for database introspection.
pub struct SchemaInspector;

impl SchemaInspector {
    /// List all tables (and optionally views) in the database.
    pub async fn list_tables(pool: &SqlitePool, include_views: bool) -> DbResult<Vec<TableInfo>> {
        let query = if include_views {
            queries::LIST_TABLES_WITH_VIEWS
        } else {
            queries::LIST_TABLES_NO_VIEWS
        };

        let rows = sqlx::query(query).fetch_all(pool).await?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row.try_get("name")?;
            let type_str: String = row.try_get("type")?;
            let table_type = TableType::parse(&type_str);
            let mut table = TableInfo::new(&name, table_type);

            if table_type == TableType::Table {
                if let Some(size) = fetch_table_size(pool, &name).await {
                    table = table.with_total_size(size);
                }
            }

            tables.push(table);
        }

        debug!(count = tables.len(), "Listed SQLite tables");
        Ok(tables)
    }

    /// Resolve a table or view name case-insensitively to its stored name.
    pub async fn find_table(pool: &SqlitePool, table_name: &str) -> DbResult<Option<String>> {
        let name = sqlx::query_scalar::<_, String>(queries::FIND_TABLE)
            .bind(table_name)
            .fetch_optional(pool)
            .await?;
        Ok(name)
    }

    /// Fail with a schema error unless the table or view exists.
    pub async fn require_table(pool: &SqlitePool, table_name: &str) -> DbResult<String> {
        Self::find_table(pool, table_name)
            .await?
            .ok_or_else(|| table_not_found(table_name))
    }

    /// Describe a table's schema.
    pub async fn describe_table(pool: &SqlitePool, table_name: &str) -> DbResult<TableSchema> {
        let table_name = Self::require_table(pool, table_name).await?;
        let columns = Self::columns(pool, &table_name).await?;

        let primary_key = fetch_primary_key(pool, &table_name).await?;
        let foreign_keys = fetch_foreign_keys(pool, &table_name).await;
        let indexes = fetch_indexes(pool, &table_name).await;
        let row_count = Self::row_count(pool, &table_name).await?;

        Ok(TableSchema {
            table_name,
            columns,
            primary_key,
            foreign_keys,
            indexes,
            row_count,
        })
    }

    /// Columns of a table in declaration order.
    pub async fn columns(pool: &SqlitePool, table_name: &str) -> DbResult<Vec<ColumnDefinition>> {
        let rows = sqlx::query(queries::TABLE_INFO)
            .bind(table_name)
            .fetch_all(pool)
            .await?;

        if rows.is_empty() {
            return Err(table_not_found(table_name));
        }

        rows.iter()
            .map(|row| {
                let name: String = row.try_get("name")?;
                let data_type: Option<String> = row.try_get("type")?;
                let notnull: i64 = row.try_get("notnull")?;
                let default_value: Option<String> = row.try_get("dflt_value").ok().flatten();
                let pk: i64 = row.try_get("pk")?;

                let mut col = ColumnDefinition::new(name, data_type.unwrap_or_default(), notnull == 0)
                    .with_primary_key(pk > 0);
                if let Some(def) = default_value {
                    col = col.with_default(def);
                }
                Ok::<_, DbError>(col)
            })
            .collect()
    }

    /// Number of rows in a table.
    pub async fn row_count(pool: &SqlitePool, table_name: &str) -> DbResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table_name)?);
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(pool).await?;
        Ok(count.max(0) as u64)
    }
}

fn table_not_found(table_name: &str) -> DbError {
    DbError::schema(format!("Table '{}' not found", table_name), table_name)
}

// =============================================================================
// SQL Query Templates
// =============================================================================

mod queries {
    pub const LIST_TABLES_WITH_VIEWS: &str = r#"
        SELECT name, type FROM sqlite_master
        WHERE type IN ('table', 'view')
        AND name NOT LIKE 'sqlite_%'
        ORDER BY name
        "#;

    pub const LIST_TABLES_NO_VIEWS: &str = r#"
        SELECT name, type FROM sqlite_master
        WHERE type = 'table'
        AND name NOT LIKE 'sqlite_%'
        ORDER BY name
        "#;

    pub const FIND_TABLE: &str = r#"
        SELECT name FROM sqlite_master
        WHERE type IN ('table', 'view')
        AND name = ? COLLATE NOCASE
        LIMIT 1
        "#;

    pub const TABLE_INFO: &str =
        "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?) ORDER BY cid";

    pub const PRIMARY_KEY: &str =
        "SELECT name FROM pragma_table_info(?) WHERE pk > 0 ORDER BY pk";

    pub const FOREIGN_KEYS: &str = r#"
        SELECT "from", "table", "to", on_update, on_delete
        FROM pragma_foreign_key_list(?)
        ORDER BY id, seq
        "#;

    pub const INDEX_LIST: &str =
        "SELECT name, \"unique\", origin FROM pragma_index_list(?) ORDER BY seq";

    pub const INDEX_INFO: &str = "SELECT name FROM pragma_index_info(?) ORDER BY seqno";

    /// Only available when SQLite is compiled with SQLITE_ENABLE_DBSTAT_VTAB.
    pub const TABLE_SIZE: &str = "SELECT SUM(pgsize) AS size_bytes FROM dbstat WHERE name = ?";
}

async fn fetch_table_size(pool: &SqlitePool, table_name: &str) -> Option<u64> {
    sqlx::query(queries::TABLE_SIZE)
        .bind(table_name)
        .fetch_one(pool)
        .await
        .ok()
        .and_then(|row| row.try_get::<Option<i64>, _>("size_bytes").ok().flatten())
        .map(|size| size.max(0) as u64)
}

async fn fetch_primary_key(pool: &SqlitePool, table_name: &str) -> DbResult<Vec<String>> {
    let names = sqlx::query_scalar::<_, String>(queries::PRIMARY_KEY)
        .bind(table_name)
        .fetch_all(pool)
        .await?;
    Ok(names)
}

async fn fetch_foreign_keys(pool: &SqlitePool, table_name: &str) -> Vec<ForeignKey> {
    let rows = sqlx::query(queries::FOREIGN_KEYS)
        .bind(table_name)
        .fetch_all(pool)
        .await
        .unwrap_or_default();

    rows.iter()
        .filter_map(|row| {
            let column: String = row.try_get("from").ok()?;
            let ref_table: String = row.try_get("table").ok()?;
            // "to" is NULL when the reference targets the parent's primary key implicitly
            let ref_column: Option<String> = row.try_get("to").ok().flatten();
            let on_delete: String = row.try_get("on_delete").unwrap_or_default();
            let on_update: String = row.try_get("on_update").unwrap_or_default();

            Some(
                ForeignKey::new(column, ref_table, ref_column.unwrap_or_default())
                    .with_on_delete(ForeignKeyAction::parse(&on_delete))
                    .with_on_update(ForeignKeyAction::parse(&on_update)),
            )
        })
        .collect()
}

async fn fetch_indexes(pool: &SqlitePool, table_name: &str) -> Vec<IndexInfo> {
    let idx_list = sqlx::query(queries::INDEX_LIST)
        .bind(table_name)
        .fetch_all(pool)
        .await
        .unwrap_or_default();

    let mut indexes = Vec::new();
    for idx_row in &idx_list {
        let Ok(name) = idx_row.try_get::<String, _>("name") else {
            continue;
        };
        let is_unique: i64 = idx_row.try_get("unique").unwrap_or_default();
        let origin: String = idx_row.try_get("origin").unwrap_or_default();

        let columns = fetch_index_columns(pool, &name).await;
        if !columns.is_empty() {
            indexes.push(
                IndexInfo::new(name, columns)
                    .with_unique(is_unique != 0)
                    .with_primary(origin == "pk"),
            );
        }
    }
    indexes
}

async fn fetch_index_columns(pool: &SqlitePool, index_name: &str) -> Vec<String> {
    // Expression indexes report NULL column names
    sqlx::query_scalar::<_, Option<String>>(queries::INDEX_INFO)
        .bind(index_name)
        .fetch_all(pool)
        .await
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Executor;

    async fn fixture() -> SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        pool.execute(
            r#"
            CREATE TABLE authors (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
            CREATE TABLE books (
                id INTEGER PRIMARY KEY,
                author_id INTEGER REFERENCES authors(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                status TEXT DEFAULT 'draft'
            );
            CREATE UNIQUE INDEX books_title ON books(title);
            CREATE VIEW book_titles AS SELECT title FROM books;
            INSERT INTO authors (name) VALUES ('Le Guin'), ('Borges');
            "#,
        )
        .await
        .unwrap();
        pool
    }

    #[tokio::test]
    async fn test_list_tables_with_and_without_views() {
        let pool = fixture().await;

        let all = SchemaInspector::list_tables(&pool, true).await.unwrap();
        let names: Vec<_> = all.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["authors", "book_titles", "books"]);
        assert_eq!(all[1].table_type, TableType::View);

        let tables = SchemaInspector::list_tables(&pool, false).await.unwrap();
        assert_eq!(tables.len(), 2);
    }

    #[tokio::test]
    async fn test_describe_table() {
        let pool = fixture().await;
        let schema = SchemaInspector::describe_table(&pool, "BOOKS").await.unwrap();

        assert_eq!(schema.table_name, "books");
        assert_eq!(schema.primary_key, vec!["id"]);
        assert_eq!(schema.row_count, 0);

        let names: Vec<_> = schema.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "author_id", "title", "status"]);
        assert!(!schema.columns[2].nullable);
        assert_eq!(schema.columns[3].default_value.as_deref(), Some("'draft'"));

        assert_eq!(schema.foreign_keys.len(), 1);
        assert_eq!(schema.foreign_keys[0].references_table, "authors");
        assert_eq!(schema.foreign_keys[0].on_delete, ForeignKeyAction::Cascade);

        let idx = schema.indexes.iter().find(|i| i.name == "books_title").unwrap();
        assert!(idx.is_unique);
        assert_eq!(idx.columns, vec!["title"]);
    }

    #[tokio::test]
    async fn test_describe_missing_table() {
        let pool = fixture().await;
        let result = SchemaInspector::describe_table(&pool, "nope").await;
        assert!(matches!(result, Err(DbError::Schema { .. })));
    }

    #[tokio::test]
    async fn test_row_count() {
        let pool = fixture().await;
        assert_eq!(SchemaInspector::row_count(&pool, "authors").await.unwrap(), 2);
    }
}
