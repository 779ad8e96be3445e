use datafusion::execution::context::SQLOptions;
use datafusion_physical_plan::{collect, ExecutionPlan};
use provider::{batches_to_rows, Row};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::store::SpanStore;

/// Rows of an ad-hoc query, normalized to JSON
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub row_count: usize,
    /// More rows existed than the configured cap
    pub truncated: bool,
}

fn read_only_options() -> SQLOptions {
    SQLOptions::new()
        .with_allow_ddl(false)
        .with_allow_dml(false)
        .with_allow_statements(false)
}

impl SpanStore {
    /// Run caller-supplied SQL against the store
    ///
    /// In read-only mode DDL, DML and session statements are rejected at
    /// planning time. The result is capped at `query.adhoc_row_limit` rows.
    pub async fn execute_adhoc(&self, query: &str) -> Result<QueryResult> {
        let query = query.trim();
        if query.is_empty() {
            return Err(StoreError::InvalidArgument(
                "query must not be empty".to_string(),
            ));
        }

        let row_limit = self.query.adhoc_row_limit;
        let read_only = self.query.adhoc_read_only;
        info!(read_only, row_limit, "Executing ad-hoc query");
        debug!(sql = query, "Ad-hoc query text");

        self.run("adhoc_query", async {
            let df = if read_only {
                self.ctx.sql_with_options(query, read_only_options()).await?
            } else {
                self.ctx.sql(query).await?
            };

            let columns: Vec<String> = df
                .schema()
                .fields()
                .iter()
                .map(|field| field.name().clone())
                .collect();

            // One extra row tells us whether the cap was hit
            let df = df.limit(0, Some(row_limit.saturating_add(1)))?;
            let plan = df.create_physical_plan().await?;
            let batches = collect(Arc::clone(&plan), self.ctx.task_ctx()).await?;
            let stats = plan_stats(&plan);
            debug!(
                nodes = stats.nodes,
                output_rows = ?stats.output_rows,
                elapsed_compute_ns = stats.elapsed_compute_ns,
                bytes_scanned = stats.bytes_scanned,
                "Ad-hoc query executed"
            );

            let mut rows = batches_to_rows(&batches)?;
            let truncated = rows.len() > row_limit;
            rows.truncate(row_limit);

            Ok(QueryResult {
                columns,
                row_count: rows.len(),
                rows,
                truncated,
            })
        })
        .await
    }
}

/// Execution figures gathered from an executed plan
#[derive(Debug, Default, PartialEq)]
struct PlanStats {
    nodes: usize,
    /// Rows emitted by the root node
    output_rows: Option<usize>,
    elapsed_compute_ns: usize,
    bytes_scanned: usize,
}

fn plan_stats(plan: &Arc<dyn ExecutionPlan>) -> PlanStats {
    let mut stats = PlanStats {
        output_rows: plan.metrics().and_then(|m| m.output_rows()),
        ..Default::default()
    };
    accumulate(plan, &mut stats);
    stats
}

fn accumulate(plan: &Arc<dyn ExecutionPlan>, stats: &mut PlanStats) {
    stats.nodes += 1;
    if let Some(metrics) = plan.metrics() {
        stats.elapsed_compute_ns += metrics.elapsed_compute().unwrap_or(0);
        stats.bytes_scanned += metrics
            .sum_by_name("bytes_scanned")
            .map(|v| v.as_usize())
            .unwrap_or(0);
    }
    for child in plan.children() {
        accumulate(child, stats);
    }
}
