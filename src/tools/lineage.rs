//! Field lineage tools.
//!
//! This module implements the `add_field_lineage`, `trace_field_lineage` and
//! `analyze_query_lineage` MCP tools on top of [`FieldTracker`].

use crate::error::DbResult;
use crate::lineage::{DataFlowEdge, FieldLineage, FieldTracker, analyze_query};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Input for the add_field_lineage tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AddFieldLineageInput {
    pub target_table: String,
    pub target_field: String,
    /// Source tables, paired by position with source_fields
    pub source_tables: Vec<String>,
    /// Source fields, paired by position with source_tables
    pub source_fields: Vec<String>,
    /// Optional description of how the sources are joined
    #[serde(default)]
    pub join_condition: Option<String>,
}

/// Output from the add_field_lineage tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct AddFieldLineageOutput {
    pub lineage: FieldLineage,
    /// True if an earlier record for the same field was replaced
    pub replaced: bool,
}

/// Input for the trace_field_lineage tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TraceFieldLineageInput {
    pub table: String,
    pub field: String,
}

/// Output from the trace_field_lineage tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TraceFieldLineageOutput {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineage: Option<FieldLineage>,
    /// source → target edges of the record
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub data_flow: Vec<DataFlowEdge>,
}

/// Input for the analyze_query_lineage tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AnalyzeQueryLineageInput {
    /// SQL query to analyze. It is not executed
    pub sql: String,
}

/// Output from the analyze_query_lineage tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct AnalyzeQueryLineageOutput {
    /// Tables named after FROM or JOIN
    pub tables: Vec<String>,
    /// Select-list entries as written
    pub fields: Vec<String>,
    /// `table.field` pairs with recorded lineage
    pub tracked_fields: Vec<String>,
}

pub struct LineageToolHandler {
    tracker: FieldTracker,
}

impl LineageToolHandler {
    pub fn new(tracker: FieldTracker) -> Self {
        Self { tracker }
    }

    pub async fn add_field_lineage(
        &self,
        input: AddFieldLineageInput,
    ) -> DbResult<AddFieldLineageOutput> {
        let lineage = FieldLineage::new(
            input.target_table,
            input.target_field,
            input.source_tables,
            input.source_fields,
            input.join_condition,
        )?;
        let replaced = self.tracker.add(lineage.clone()).await.is_some();

        info!(
            table = %lineage.target_table,
            field = %lineage.target_field,
            sources = lineage.source_tables.len(),
            replaced = replaced,
            "Added field lineage"
        );

        Ok(AddFieldLineageOutput { lineage, replaced })
    }

    pub async fn trace_field_lineage(
        &self,
        input: TraceFieldLineageInput,
    ) -> DbResult<TraceFieldLineageOutput> {
        let lineage = self.tracker.get(&input.table, &input.field).await;
        let data_flow = lineage
            .as_ref()
            .map(FieldLineage::data_flow)
            .unwrap_or_default();

        info!(
            table = %input.table,
            field = %input.field,
            found = lineage.is_some(),
            "Traced field lineage"
        );

        Ok(TraceFieldLineageOutput {
            found: lineage.is_some(),
            lineage,
            data_flow,
        })
    }

    pub async fn analyze_query_lineage(
        &self,
        input: AnalyzeQueryLineageInput,
    ) -> DbResult<AnalyzeQueryLineageOutput> {
        let analysis = analyze_query(&input.sql)?;

        let mut tracked_fields = Vec::new();
        for table in &analysis.tables {
            for field in analysis.field_names() {
                if let Some(lineage) = self.tracker.get(table, &field).await {
                    tracked_fields.push(format!(
                        "{}.{}",
                        lineage.target_table, lineage.target_field
                    ));
                }
            }
        }

        info!(
            tables = analysis.tables.len(),
            fields = analysis.fields.len(),
            tracked = tracked_fields.len(),
            "Analyzed query lineage"
        );

        Ok(AnalyzeQueryLineageOutput {
            tables: analysis.tables,
            fields: analysis.fields,
            tracked_fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> LineageToolHandler {
        LineageToolHandler::new(FieldTracker::new())
    }

    fn add_input() -> AddFieldLineageInput {
        serde_json::from_value(serde_json::json!({
            "target_table": "customer_summary",
            "target_field": "total_spent",
            "source_tables": ["orders"],
            "source_fields": ["amount"],
            "join_condition": "orders.customer_id = customer_summary.id"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_add_then_trace() {
        let handler = handler();
        let added = handler.add_field_lineage(add_input()).await.unwrap();
        assert!(!added.replaced);

        let traced = handler
            .trace_field_lineage(TraceFieldLineageInput {
                table: "Customer_Summary".to_string(),
                field: "TOTAL_SPENT".to_string(),
            })
            .await
            .unwrap();
        assert!(traced.found);
        assert_eq!(traced.data_flow.len(), 1);
        assert_eq!(traced.data_flow[0].from, "orders.amount");
        assert_eq!(traced.data_flow[0].to, "customer_summary.total_spent");
    }

    #[tokio::test]
    async fn test_trace_unknown_field() {
        let traced = handler()
            .trace_field_lineage(TraceFieldLineageInput {
                table: "t".to_string(),
                field: "f".to_string(),
            })
            .await
            .unwrap();
        assert!(!traced.found);

        let json = serde_json::to_value(&traced).unwrap();
        assert_eq!(json, serde_json::json!({"found": false}));
    }

    #[tokio::test]
    async fn test_analyze_reports_tracked_fields() {
        let handler = handler();
        handler.add_field_lineage(add_input()).await.unwrap();

        let output = handler
            .analyze_query_lineage(AnalyzeQueryLineageInput {
                sql: "SELECT s.total_spent, s.id FROM customer_summary s".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(output.tables, vec!["customer_summary"]);
        assert_eq!(output.tracked_fields, vec!["customer_summary.total_spent"]);
    }
}
