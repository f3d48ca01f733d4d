//! Sample data generation tool.
//!
//! Values are generated from each column's declared type (by SQLite affinity)
//! and refined by hints in the column name, so a TEXT column called `email`
//! gets something that looks like an email address.

use crate::db::schema::SchemaInspector;
use crate::db::statement::{insert_sql, quote_ident};
use crate::db::types::{TypeCategory, categorize_type};
use crate::db::{BoundStatement, ConnectionManager, QueryExecutor};
use crate::error::{DbError, DbResult};
use crate::models::{ColumnDefinition, QueryParam};
use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Upper bound on rows generated by a single call.
pub const MAX_SAMPLE_ROWS: u32 = 10_000;

fn default_num_rows() -> u32 {
    10
}

/// Input for the generate_sample_data tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GenerateSampleDataInput {
    /// Table to populate
    pub table: String,
    /// Number of rows to generate (1 to 10000). Default: 10
    #[serde(default = "default_num_rows")]
    pub num_rows: u32,
    /// Path of the SQLite database file. Default: the server's configured database
    #[serde(default)]
    pub db_path: Option<String>,
}

/// Output from the generate_sample_data tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct GenerateSampleDataOutput {
    pub table: String,
    pub rows_inserted: u64,
    /// Columns that received generated values. INTEGER PRIMARY KEY columns are left to SQLite
    pub columns: Vec<String>,
    pub execution_time_ms: u64,
}

const FIRST_NAMES: &[&str] = &[
    "Ada", "Alan", "Barbara", "Claude", "Dennis", "Edsger", "Frances", "Grace", "Hedy", "John",
    "Katherine", "Ken", "Linus", "Margaret", "Niklaus", "Radia", "Sophie", "Tim",
];
const LAST_NAMES: &[&str] = &[
    "Allen", "Backus", "Berners-Lee", "Dijkstra", "Hamilton", "Hopper", "Johnson", "Kernighan",
    "Knuth", "Lamarr", "Liskov", "Lovelace", "Perlman", "Ritchie", "Shannon", "Thompson", "Turing",
    "Wirth",
];
const STREETS: &[&str] = &[
    "Oak Street", "Maple Avenue", "Cedar Lane", "Elm Road", "Pine Court", "Birch Way", "Main Street",
];
const CITIES: &[&str] = &[
    "Amsterdam", "Berlin", "Boston", "Kyoto", "Lisbon", "Montreal", "Nairobi", "Oslo", "Porto",
    "Santiago", "Seattle", "Sydney",
];
const COUNTRIES: &[&str] = &[
    "Argentina", "Australia", "Canada", "Chile", "Germany", "Japan", "Kenya", "Netherlands",
    "Norway", "Portugal", "United States",
];
const COMPANY_SUFFIXES: &[&str] = &["Inc", "LLC", "Group", "Labs", "Systems", "and Sons"];
const JOB_TITLES: &[&str] = &[
    "Software Engineer", "Data Analyst", "Product Manager", "Designer", "Accountant",
    "Operations Lead", "Support Specialist", "Research Scientist",
];
const LOREM: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do",
    "eiusmod", "tempor", "incididunt", "ut", "labore", "et", "dolore", "magna", "aliqua",
];

fn pick<'a, R: Rng + ?Sized>(rng: &mut R, items: &'a [&'a str]) -> &'a str {
    items.choose(rng).copied().unwrap_or_default()
}

/// Capitalized sentence of lorem words, at most `max_chars` long.
fn sentence<R: Rng + ?Sized>(rng: &mut R, max_chars: usize) -> String {
    let mut text = String::new();
    loop {
        let word = pick(rng, LOREM);
        if !text.is_empty() && text.len() + word.len() + 2 > max_chars {
            break;
        }
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(word);
    }
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => format!("{}{}.", first.to_uppercase(), chars.as_str()),
        None => text,
    }
}

fn text_by_name<R: Rng + ?Sized>(rng: &mut R, column: &str) -> String {
    let column = column.to_lowercase();
    if column.contains("name") {
        format!("{} {}", pick(rng, FIRST_NAMES), pick(rng, LAST_NAMES))
    } else if column.contains("email") {
        format!(
            "{}.{}{}@example.com",
            pick(rng, FIRST_NAMES).to_lowercase(),
            pick(rng, LAST_NAMES).to_lowercase(),
            rng.gen_range(1..10_000)
        )
    } else if column.contains("phone") {
        format!(
            "+1-555-{:03}-{:04}",
            rng.gen_range(100..1000),
            rng.gen_range(0..10_000)
        )
    } else if column.contains("address") {
        format!("{} {}", rng.gen_range(1..2000), pick(rng, STREETS))
    } else if column.contains("company") {
        format!("{} {}", pick(rng, LAST_NAMES), pick(rng, COMPANY_SUFFIXES))
    } else if column.contains("city") {
        pick(rng, CITIES).to_string()
    } else if column.contains("country") {
        pick(rng, COUNTRIES).to_string()
    } else if column.contains("title") {
        pick(rng, JOB_TITLES).to_string()
    } else if column.contains("description") {
        sentence(rng, 100)
    } else {
        sentence(rng, 50)
    }
}

/// ISO-8601 timestamp within roughly the last ten years.
fn timestamp<R: Rng + ?Sized>(rng: &mut R) -> String {
    let seconds_back = rng.gen_range(0..315_360_000_i64);
    DateTime::from_timestamp(Utc::now().timestamp() - seconds_back, 0)
        .unwrap_or_default()
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string()
}

/// Generate one value for a column.
pub fn generate_value<R: Rng + ?Sized>(rng: &mut R, column: &ColumnDefinition) -> QueryParam {
    let declared = column.data_type.to_lowercase();
    match categorize_type(&column.data_type) {
        TypeCategory::Boolean => QueryParam::Int(rng.gen_range(0..=1)),
        TypeCategory::Integer => QueryParam::Int(rng.gen_range(1..=1000)),
        TypeCategory::Float => QueryParam::Float(round2(rng.gen_range(1.0..1000.0))),
        TypeCategory::Numeric if declared.contains("date") || declared.contains("time") => {
            QueryParam::String(timestamp(rng))
        }
        TypeCategory::Numeric => QueryParam::Float(round2(rng.gen_range(1.0..1000.0))),
        TypeCategory::Text | TypeCategory::Binary => {
            QueryParam::String(text_by_name(rng, &column.name))
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Columns that receive generated values: everything except a lone
/// `INTEGER PRIMARY KEY`, which SQLite fills from the rowid.
fn generated_columns(columns: Vec<ColumnDefinition>) -> Vec<ColumnDefinition> {
    let single_pk = columns.iter().filter(|c| c.primary_key).count() == 1;
    columns
        .into_iter()
        .filter(|c| !(single_pk && c.is_rowid_alias()))
        .collect()
}

/// Generate `num_rows` rows of values for `columns`.
pub fn generate_rows<R: Rng + ?Sized>(
    rng: &mut R,
    columns: &[ColumnDefinition],
    num_rows: u32,
) -> Vec<Vec<QueryParam>> {
    (0..num_rows)
        .map(|_| columns.iter().map(|c| generate_value(rng, c)).collect())
        .collect()
}

pub struct SampleDataToolHandler {
    connection_manager: Arc<ConnectionManager>,
    executor: QueryExecutor,
}

impl SampleDataToolHandler {
    pub fn new(connection_manager: Arc<ConnectionManager>) -> Self {
        Self {
            connection_manager,
            executor: QueryExecutor::new(),
        }
    }

    /// Generate rows and insert them in one transaction.
    pub async fn generate_sample_data(
        &self,
        input: GenerateSampleDataInput,
    ) -> DbResult<GenerateSampleDataOutput> {
        if input.num_rows == 0 || input.num_rows > MAX_SAMPLE_ROWS {
            return Err(DbError::invalid_input(format!(
                "num_rows must be between 1 and {}, got {}",
                MAX_SAMPLE_ROWS, input.num_rows
            )));
        }

        let pool = self.connection_manager.pool(input.db_path.as_deref()).await?;
        let table = SchemaInspector::require_table(&pool, &input.table).await?;
        let columns = generated_columns(SchemaInspector::columns(&pool, &table).await?);
        let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();

        let sql = if names.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote_ident(&table)?)
        } else {
            insert_sql(&table, &names)?
        };

        // ThreadRng is not Send; keep it out of scope across awaits
        let rows = {
            let mut rng = rand::thread_rng();
            generate_rows(&mut rng, &columns, input.num_rows)
        };
        let statements: Vec<BoundStatement> = rows
            .into_iter()
            .map(|params| BoundStatement::new(sql.clone(), params))
            .collect();

        let summary = self.executor.execute_batch(&pool, &statements).await?;

        info!(
            table = %table,
            rows_inserted = summary.rows_affected,
            execution_time_ms = summary.execution_time_ms,
            "Generated sample data"
        );

        Ok(GenerateSampleDataOutput {
            table,
            rows_inserted: summary.rows_affected,
            columns: names,
            execution_time_ms: summary.execution_time_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OpenOptions;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_generate_value_by_type() {
        let mut rng = rng();
        let int_col = ColumnDefinition::new("qty", "INTEGER", true);
        match generate_value(&mut rng, &int_col) {
            QueryParam::Int(v) => assert!((1..=1000).contains(&v)),
            other => panic!("expected int, got {:?}", other),
        }

        let bool_col = ColumnDefinition::new("active", "BOOLEAN", true);
        assert!(matches!(
            generate_value(&mut rng, &bool_col),
            QueryParam::Int(0) | QueryParam::Int(1)
        ));

        let date_col = ColumnDefinition::new("created", "DATETIME", true);
        match generate_value(&mut rng, &date_col) {
            QueryParam::String(s) => assert_eq!(s.len(), "2024-01-01T00:00:00".len()),
            other => panic!("expected timestamp, got {:?}", other),
        }
    }

    #[test]
    fn test_text_hints() {
        let mut rng = rng();
        assert!(text_by_name(&mut rng, "Email").ends_with("@example.com"));
        assert!(text_by_name(&mut rng, "phone").starts_with("+1-555-"));
        assert!(text_by_name(&mut rng, "full_name").contains(' '));
        assert!(CITIES.contains(&text_by_name(&mut rng, "city").as_str()));
        assert!(text_by_name(&mut rng, "notes").len() <= 50);
    }

    #[test]
    fn test_rowid_alias_is_skipped() {
        let columns = vec![
            ColumnDefinition::new("id", "INTEGER", true).with_primary_key(true),
            ColumnDefinition::new("name", "TEXT", true),
        ];
        let kept = generated_columns(columns);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "name");

        // Composite keys are not rowid aliases
        let columns = vec![
            ColumnDefinition::new("a", "INTEGER", false).with_primary_key(true),
            ColumnDefinition::new("b", "INTEGER", false).with_primary_key(true),
        ];
        assert_eq!(generated_columns(columns).len(), 2);
    }

    #[tokio::test]
    async fn test_generate_sample_data_inserts_rows() {
        let dir = tempfile::tempdir().unwrap();
        let manager = Arc::new(ConnectionManager::new(
            dir.path().join("test.db"),
            OpenOptions::default(),
        ));
        let pool = manager.pool(None).await.unwrap();
        sqlx::query(
            "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT, email TEXT, balance REAL, joined DATE)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let handler = SampleDataToolHandler::new(manager);
        let output = handler
            .generate_sample_data(GenerateSampleDataInput {
                table: "customers".to_string(),
                num_rows: 25,
                db_path: None,
            })
            .await
            .unwrap();
        assert_eq!(output.rows_inserted, 25);
        assert_eq!(output.columns, vec!["name", "email", "balance", "joined"]);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 25);
    }

    #[tokio::test]
    async fn test_num_rows_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConnectionManager::new(dir.path().join("test.db"), OpenOptions::default());
        let handler = SampleDataToolHandler::new(Arc::new(manager));

        let err = handler
            .generate_sample_data(GenerateSampleDataInput {
                table: "t".to_string(),
                num_rows: MAX_SAMPLE_ROWS + 1,
                db_path: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
    }
}
