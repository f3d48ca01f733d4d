//! In-memory field lineage tracking.
//!
//! Lineage records describe where the values of a `table.field` come from.
//! They live for the lifetime of the process and are not persisted.

pub mod analysis;

pub use analysis::{QueryAnalysis, analyze_query};

use crate::error::{DbError, DbResult};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Sources of one target field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldLineage {
    pub target_table: String,
    pub target_field: String,
    /// Source tables, parallel to `source_fields`
    pub source_tables: Vec<String>,
    pub source_fields: Vec<String>,
    /// Free-text description of how the sources are joined
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_condition: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// One `source → target` edge of a lineage record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct DataFlowEdge {
    pub from: String,
    pub to: String,
}

impl FieldLineage {
    /// Build a lineage record, checking that sources pair up.
    pub fn new(
        target_table: impl Into<String>,
        target_field: impl Into<String>,
        source_tables: Vec<String>,
        source_fields: Vec<String>,
        join_condition: Option<String>,
    ) -> DbResult<Self> {
        let target_table = target_table.into();
        let target_field = target_field.into();

        if target_table.trim().is_empty() || target_field.trim().is_empty() {
            return Err(DbError::invalid_input(
                "target_table and target_field cannot be empty",
            ));
        }
        if source_tables.is_empty() {
            return Err(DbError::invalid_input(
                "At least one source table and field is required",
            ));
        }
        if source_tables.len() != source_fields.len() {
            return Err(DbError::invalid_input(format!(
                "source_tables has {} entries but source_fields has {}; they are paired by position",
                source_tables.len(),
                source_fields.len()
            )));
        }

        Ok(Self {
            target_table,
            target_field,
            source_tables,
            source_fields,
            join_condition: join_condition.filter(|c| !c.trim().is_empty()),
            recorded_at: Utc::now(),
        })
    }

    /// `source_table.source_field → target_table.target_field` edges.
    pub fn data_flow(&self) -> Vec<DataFlowEdge> {
        let to = format!("{}.{}", self.target_table, self.target_field);
        self.source_tables
            .iter()
            .zip(&self.source_fields)
            .map(|(table, field)| DataFlowEdge {
                from: format!("{}.{}", table, field),
                to: to.clone(),
            })
            .collect()
    }
}

fn lineage_key(table: &str, field: &str) -> String {
    format!("{}.{}", table.to_lowercase(), field.to_lowercase())
}

/// Shared store of lineage records keyed by `table.field`, case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct FieldTracker {
    records: Arc<RwLock<HashMap<String, FieldLineage>>>,
}

impl FieldTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record, replacing any previous record for the same field.
    pub async fn add(&self, lineage: FieldLineage) -> Option<FieldLineage> {
        let key = lineage_key(&lineage.target_table, &lineage.target_field);
        debug!(key = %key, sources = lineage.source_tables.len(), "Recording field lineage");
        let mut records = self.records.write().await;
        records.insert(key, lineage)
    }

    pub async fn get(&self, table: &str, field: &str) -> Option<FieldLineage> {
        let records = self.records.read().await;
        records.get(&lineage_key(table, field)).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.records.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn revenue() -> FieldLineage {
        FieldLineage::new(
            "report",
            "revenue",
            vec!["orders".to_string(), "refunds".to_string()],
            vec!["total".to_string(), "amount".to_string()],
            Some("orders.id = refunds.order_id".to_string()),
        )
        .unwrap()
    }

    #[test]
    fn test_new_validates_sources() {
        assert!(FieldLineage::new("t", "f", vec![], vec![], None).is_err());
        assert!(
            FieldLineage::new("t", "f", vec!["a".into()], vec!["x".into(), "y".into()], None)
                .is_err()
        );
        assert!(FieldLineage::new("", "f", vec!["a".into()], vec!["x".into()], None).is_err());
    }

    #[test]
    fn test_blank_join_condition_is_dropped() {
        let lineage =
            FieldLineage::new("t", "f", vec!["a".into()], vec!["x".into()], Some("  ".into()))
                .unwrap();
        assert!(lineage.join_condition.is_none());
    }

    #[test]
    fn test_data_flow() {
        let edges = revenue().data_flow();
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].from, "orders.total");
        assert_eq!(edges[1].from, "refunds.amount");
        assert_eq!(edges[1].to, "report.revenue");
    }

    #[tokio::test]
    async fn test_tracker_is_case_insensitive() {
        let tracker = FieldTracker::new();
        assert!(tracker.add(revenue()).await.is_none());

        let found = tracker.get("REPORT", "Revenue").await.unwrap();
        assert_eq!(found.source_tables, vec!["orders", "refunds"]);
        assert!(tracker.get("report", "cost").await.is_none());

        // Re-adding replaces
        assert!(tracker.add(revenue()).await.is_some());
        assert_eq!(tracker.len().await, 1);

        tracker.clear().await;
        assert!(tracker.is_empty().await);
    }
}
