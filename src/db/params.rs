//! Parameter binding utilities for database queries.
//!
//! This module binds `QueryParam` values to SQLite query objects. Every
//! statement that carries caller-supplied values goes through here.

use crate::models::QueryParam;
use sqlx::Sqlite;
use sqlx::sqlite::SqliteArguments;

pub(crate) type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Bind a parameter to a SQLite query.
pub(crate) fn bind_param<'q>(query: SqliteQuery<'q>, param: &'q QueryParam) -> SqliteQuery<'q> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        // SQLite doesn't have native JSON type, store as string
        QueryParam::Json(v) => query.bind(v.to_string()),
    }
}

/// Bind all parameters in order.
pub(crate) fn bind_all<'q>(mut query: SqliteQuery<'q>, params: &'q [QueryParam]) -> SqliteQuery<'q> {
    for param in params {
        query = bind_param(query, param);
    }
    query
}

/// Convert a JSON argument value into a bindable parameter.
///
/// Structured tools receive row values as plain JSON; integers that fit in
/// `i64` stay integers, other numbers become floats.
pub fn json_to_param(value: &serde_json::Value) -> QueryParam {
    use serde_json::Value;
    match value {
        Value::Null => QueryParam::Null,
        Value::Bool(b) => QueryParam::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => QueryParam::Int(i),
            None => QueryParam::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => QueryParam::String(s.clone()),
        other => QueryParam::Json(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_to_param() {
        assert_eq!(json_to_param(&json!(null)), QueryParam::Null);
        assert_eq!(json_to_param(&json!(7)), QueryParam::Int(7));
        assert_eq!(json_to_param(&json!(2.5)), QueryParam::Float(2.5));
        assert_eq!(json_to_param(&json!("a")), QueryParam::String("a".to_string()));
        assert_eq!(
            json_to_param(&json!([1, 2])),
            QueryParam::Json(json!([1, 2]))
        );
    }
}
