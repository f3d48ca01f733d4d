//! SQL statement classification.
//!
//! The `query` tool uses this module to decide:
//! - whether a statement returns rows (fetched and serialized) or is a write
//!   (executed, reporting `rows_affected`)
//! - in read-only mode, whether a statement may run at all
//! - whether the SQL tries to control transactions, which is refused in every mode
//!
//! Uses [sqlparser](https://docs.rs/sqlparser/) with the SQLite dialect. SQLite
//! accepts some syntax sqlparser does not; those statements fall back to a
//! leading-keyword check, and in read-only mode the connection itself is
//! opened read-only so SQLite remains the final guard.

use crate::error::{DbError, DbResult};
use sqlparser::ast::Statement;
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;
use tracing::debug;

/// Type of SQL statement detected by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlStatementType {
    /// SELECT, VALUES, WITH ... SELECT, EXPLAIN, PRAGMA
    Select,
    /// INSERT, UPDATE, DELETE, REPLACE
    DmlWrite,
    /// CREATE, DROP, ALTER
    Ddl,
    /// BEGIN, COMMIT, ROLLBACK, SAVEPOINT, RELEASE
    Transaction,
    /// VACUUM, ANALYZE, ATTACH, DETACH, REINDEX
    Administrative,
    /// Unknown or unparseable statement
    Unknown,
}

/// How the `query` tool should run a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Fetch and serialize rows
    Rows,
    /// Execute and report `rows_affected`
    Write,
}

/// Error messages for each statement type category.
mod error_messages {
    pub const DML_WRITE: &str =
        "Write operations are not allowed: the server runs in read-only mode.";
    pub const DDL: &str = "Schema modifications are not allowed: the server runs in read-only mode.";
    pub const TRANSACTION: &str =
        "Transaction control is not allowed: each tool call runs in its own transaction.";
    pub const ADMINISTRATIVE: &str =
        "Administrative statements are not allowed: the server runs in read-only mode.";
    pub const UNKNOWN: &str =
        "Unrecognized SQL statement. Only SELECT, WITH, VALUES, EXPLAIN and PRAGMA are allowed in read-only mode.";
}

/// Leading keywords of statements that return rows.
const ROW_KEYWORDS: &[&str] = &["SELECT", "WITH", "VALUES", "EXPLAIN", "PRAGMA"];

/// Leading keywords of transaction-control statements.
const TRANSACTION_KEYWORDS: &[&str] = &["BEGIN", "COMMIT", "END", "ROLLBACK", "SAVEPOINT", "RELEASE"];

/// Parse SQL into statements, or `None` if sqlparser cannot handle it.
fn parse(sql: &str) -> DbResult<Option<Vec<Statement>>> {
    if is_blank(sql) {
        return Err(DbError::invalid_input("Empty SQL statement"));
    }
    match Parser::parse_sql(&SQLiteDialect {}, sql) {
        Ok(statements) if !statements.is_empty() => Ok(Some(statements)),
        Ok(_) => Err(DbError::invalid_input("Empty SQL statement")),
        Err(e) => {
            debug!(error = %e, "sqlparser could not parse statement, using keyword fallback");
            Ok(None)
        }
    }
}

fn is_blank(sql: &str) -> bool {
    sql.chars().all(|c| c.is_whitespace() || c == ';')
}

/// First keyword of the SQL text, skipping leading comments.
fn leading_keyword(sql: &str) -> String {
    let mut rest = sql.trim_start();
    loop {
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.split_once('\n').map(|(_, r)| r).unwrap_or("").trim_start();
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/").map(|(_, r)| r).unwrap_or("").trim_start();
        } else {
            break;
        }
    }
    rest.chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Decide whether the `query` tool fetches rows or executes a write.
///
/// A script is treated as row-returning if any of its statements returns
/// rows; SQLite still executes every statement in order.
pub fn execution_mode(sql: &str) -> DbResult<ExecutionMode> {
    let returns_rows = match parse(sql)? {
        Some(statements) => statements.iter().any(returns_rows),
        None => ROW_KEYWORDS.contains(&leading_keyword(sql).as_str()),
    };
    Ok(if returns_rows {
        ExecutionMode::Rows
    } else {
        ExecutionMode::Write
    })
}

fn returns_rows(stmt: &Statement) -> bool {
    match classify_statement(stmt).0 {
        SqlStatementType::Select => true,
        // INSERT/UPDATE/DELETE ... RETURNING
        SqlStatementType::DmlWrite => stmt.to_string().to_uppercase().contains(" RETURNING "),
        _ => false,
    }
}

/// Validate SQL for read-only execution.
///
/// Returns `Ok(())` if every statement is row-returning and side-effect free,
/// or `Err(DbError::Permission)` naming the first offending statement.
///
/// # Examples
///
/// ```
/// use sqlite_mcp_server::tools::sql_validator::validate_readonly;
///
/// assert!(validate_readonly("SELECT * FROM users").is_ok());
/// assert!(validate_readonly("INSERT INTO users VALUES (1)").is_err());
/// ```
pub fn validate_readonly(sql: &str) -> DbResult<()> {
    match parse(sql)? {
        Some(statements) => statements.iter().try_for_each(validate_statement),
        None => {
            let keyword = leading_keyword(sql);
            if ROW_KEYWORDS.contains(&keyword.as_str()) {
                Ok(())
            } else {
                Err(DbError::permission(
                    if keyword.is_empty() { "Unknown".to_string() } else { keyword },
                    error_messages::UNKNOWN,
                ))
            }
        }
    }
}

/// Validate a single parsed statement.
fn validate_statement(stmt: &Statement) -> DbResult<()> {
    let (stmt_type, operation_name) = classify_statement(stmt);

    let reason = match stmt_type {
        SqlStatementType::Select => return Ok(()),
        SqlStatementType::DmlWrite => error_messages::DML_WRITE,
        SqlStatementType::Ddl => error_messages::DDL,
        SqlStatementType::Transaction => error_messages::TRANSACTION,
        SqlStatementType::Administrative => error_messages::ADMINISTRATIVE,
        SqlStatementType::Unknown => error_messages::UNKNOWN,
    };
    Err(DbError::permission(operation_name, reason))
}

/// Refuse transaction control in any mode.
///
/// Tool calls share one connection per file, so a `BEGIN` left open by one
/// call would swallow every later call into the same transaction.
pub fn reject_transaction_control(sql: &str) -> DbResult<()> {
    match parse(sql)? {
        Some(statements) => statements.iter().try_for_each(|stmt| match classify_statement(stmt) {
            (SqlStatementType::Transaction, operation) => {
                Err(DbError::permission(operation, error_messages::TRANSACTION))
            }
            _ => Ok(()),
        }),
        None => {
            let keyword = leading_keyword(sql);
            if TRANSACTION_KEYWORDS.contains(&keyword.as_str()) {
                Err(DbError::permission(keyword, error_messages::TRANSACTION))
            } else {
                Ok(())
            }
        }
    }
}

/// Classify a parsed statement into a statement type.
pub fn classify_statement(stmt: &Statement) -> (SqlStatementType, &'static str) {
    match stmt {
        Statement::Query(_) => (SqlStatementType::Select, "SELECT"),
        Statement::Pragma { .. } => (SqlStatementType::Select, "PRAGMA"),
        Statement::ExplainTable { .. } => (SqlStatementType::Select, "EXPLAIN"),
        // EXPLAIN only describes the plan; SQLite never runs the inner statement
        Statement::Explain { .. } => (SqlStatementType::Select, "EXPLAIN"),

        Statement::Insert(_) => (SqlStatementType::DmlWrite, "INSERT"),
        Statement::Update { .. } => (SqlStatementType::DmlWrite, "UPDATE"),
        Statement::Delete(_) => (SqlStatementType::DmlWrite, "DELETE"),

        Statement::CreateTable { .. } => (SqlStatementType::Ddl, "CREATE TABLE"),
        Statement::CreateView { .. } => (SqlStatementType::Ddl, "CREATE VIEW"),
        Statement::CreateIndex(_) => (SqlStatementType::Ddl, "CREATE INDEX"),
        Statement::CreateTrigger { .. } => (SqlStatementType::Ddl, "CREATE TRIGGER"),
        Statement::CreateVirtualTable { .. } => (SqlStatementType::Ddl, "CREATE VIRTUAL TABLE"),
        Statement::AlterTable { .. } => (SqlStatementType::Ddl, "ALTER TABLE"),
        Statement::Drop { .. } => (SqlStatementType::Ddl, "DROP"),
        Statement::DropTrigger { .. } => (SqlStatementType::Ddl, "DROP TRIGGER"),

        Statement::StartTransaction { .. } => (SqlStatementType::Transaction, "BEGIN"),
        Statement::Commit { .. } => (SqlStatementType::Transaction, "COMMIT"),
        Statement::Rollback { .. } => (SqlStatementType::Transaction, "ROLLBACK"),
        Statement::Savepoint { .. } => (SqlStatementType::Transaction, "SAVEPOINT"),
        Statement::ReleaseSavepoint { .. } => (SqlStatementType::Transaction, "RELEASE SAVEPOINT"),

        Statement::AttachDatabase { .. } => (SqlStatementType::Administrative, "ATTACH"),
        Statement::Analyze { .. } => (SqlStatementType::Administrative, "ANALYZE"),
        Statement::Vacuum { .. } => (SqlStatementType::Administrative, "VACUUM"),

        _ => (SqlStatementType::Unknown, "Unknown"),
    }
}
