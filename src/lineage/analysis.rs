//! Lightweight lineage analysis of SELECT statements.
//!
//! This is a pattern match over the SQL text, not a parse: it finds the
//! tables named after FROM/JOIN and the comma-separated select list of the
//! first SELECT.

use crate::error::{DbError, DbResult};
use regex::Regex;
use schemars::JsonSchema;
use serde::Serialize;
use std::sync::LazyLock;

static TABLE_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r#"(?i)\b(?:FROM|JOIN)\s+["`\[]?(\w+)"#));

static SELECT_LIST_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?is)\bSELECT\s+(.*?)\s+FROM\b"));

fn compiled(re: &'static LazyLock<Result<Regex, regex::Error>>) -> DbResult<&'static Regex> {
    re.as_ref()
        .map_err(|e| DbError::internal(format!("Invalid lineage pattern: {}", e)))
}

/// Tables and selected fields found in a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, JsonSchema)]
pub struct QueryAnalysis {
    /// Tables named after FROM or JOIN, in order of appearance, without duplicates
    pub tables: Vec<String>,
    /// Entries of the select list as written
    pub fields: Vec<String>,
}

impl QueryAnalysis {
    /// Selected column names with any table prefix, alias or `*` removed.
    pub fn field_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter_map(|f| {
                let expr = f.split_whitespace().next()?;
                let name = expr.rsplit('.').next()?.trim_matches(|c| c == '"' || c == '`');
                (!name.is_empty() && name != "*").then(|| name.to_string())
            })
            .collect()
    }
}

/// Extract tables and select-list fields from SQL text.
///
/// # Examples
///
/// ```
/// use sqlite_mcp_server::lineage::analyze_query;
///
/// let analysis = analyze_query("SELECT o.total, c.name FROM orders o JOIN customers c ON o.cid = c.id").unwrap();
/// assert_eq!(analysis.tables, vec!["orders", "customers"]);
/// assert_eq!(analysis.fields, vec!["o.total", "c.name"]);
/// ```
pub fn analyze_query(sql: &str) -> DbResult<QueryAnalysis> {
    if sql.trim().is_empty() {
        return Err(DbError::invalid_input("sql cannot be empty"));
    }

    let mut tables: Vec<String> = Vec::new();
    for caps in compiled(&TABLE_RE)?.captures_iter(sql) {
        let table = caps[1].to_string();
        if !tables.iter().any(|t| t.eq_ignore_ascii_case(&table)) {
            tables.push(table);
        }
    }

    let fields = compiled(&SELECT_LIST_RE)?
        .captures(sql)
        .map(|caps| {
            let list = caps[1].trim();
            let list = strip_keyword(list, "DISTINCT").unwrap_or(list);
            list.split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(QueryAnalysis { tables, fields })
}

/// Strip a leading keyword followed by whitespace.
fn strip_keyword<'a>(s: &'a str, keyword: &str) -> Option<&'a str> {
    let head = s.get(..keyword.len())?;
    let rest = &s[keyword.len()..];
    (head.eq_ignore_ascii_case(keyword) && rest.starts_with(char::is_whitespace))
        .then(|| rest.trim_start())
}
