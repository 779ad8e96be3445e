use chrono::{DateTime, NaiveDate, NaiveDateTime};
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::scalar::ScalarValue;
use provider::format_timestamp_nanos;
use serde::{Deserialize, Serialize};
use storage::schema::TIMESTAMP_TZ;
use tracing::{debug, warn};

use crate::columns;
use crate::error::{Result, StoreError};
use crate::store::SpanStore;

/// Sorts root spans (null or empty parent) first, then by start time and span id
const ROOT_ORDER: &str = "CASE WHEN parent_span_id IS NULL OR parent_span_id = '' THEN 0 ELSE 1 END, \
     start_time_unix_nano, span_id";

/// Trace list request: pagination plus optional filters
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TraceQuery {
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub limit: Option<u64>,
    /// Exact service name
    #[serde(default)]
    pub service: Option<String>,
    /// Substring of the span name
    #[serde(default)]
    pub operation: Option<String>,
    /// Lower bound on span start
    #[serde(default)]
    pub start_time: Option<String>,
    /// Upper bound on span end
    #[serde(default)]
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceSummary {
    pub trace_id: String,
    pub span_count: u64,
    pub start_time: String,
    pub end_time: String,
    pub duration_ms: f64,
    pub root_operation: String,
    pub root_service: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
    pub total: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(offset: u64, limit: u64, total: u64) -> Self {
        Self {
            offset,
            limit,
            total,
            has_next: offset.saturating_add(limit) < total,
            has_prev: offset > 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TracePage {
    pub traces: Vec<TraceSummary>,
    pub pagination: Pagination,
}

/// SQL and bound parameters for one trace list request
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SearchPlan {
    pub page_sql: String,
    pub count_sql: String,
    pub params: Vec<ScalarValue>,
    pub offset: u64,
    pub limit: u64,
}

/// Parse a time filter into nanoseconds since the epoch
///
/// Accepts integer nanoseconds, RFC 3339, `YYYY-MM-DDTHH:MM:SS[.fff]` and
/// `YYYY-MM-DD` (both read as UTC). Returns `None` for anything else.
pub fn parse_time_bound(value: &str) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if value.bytes().all(|b| b.is_ascii_digit()) {
        return value.parse().ok();
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return dt.timestamp_nanos_opt();
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return dt.and_utc().timestamp_nanos_opt();
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|dt| dt.and_utc().timestamp_nanos_opt())
}

/// The filter value as sent, unless it is blank
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn timestamp_param(nanos: i64) -> ScalarValue {
    ScalarValue::TimestampNanosecond(Some(nanos), Some(TIMESTAMP_TZ.into()))
}

/// Build the page and count queries for a trace list request
///
/// Each filter adds one predicate with one placeholder. A trace matches when
/// one of its spans satisfies every predicate; summaries cover all its spans.
pub(crate) fn build_search(query: &TraceQuery, default_limit: u64, max_limit: u64) -> Result<SearchPlan> {
    let limit = match query.limit {
        None => default_limit,
        Some(0) => {
            return Err(StoreError::InvalidArgument(
                "limit must be greater than zero".to_string(),
            ))
        }
        Some(limit) => limit.min(max_limit),
    };

    let mut predicates = Vec::new();
    let mut params = Vec::new();

    if let Some(service) = non_empty(&query.service) {
        params.push(ScalarValue::Utf8(Some(service.to_string())));
        predicates.push(format!("service_name = ${}", params.len()));
    }

    if let Some(operation) = non_empty(&query.operation) {
        // Literal substring, no wildcard characters
        params.push(ScalarValue::Utf8(Some(operation.to_string())));
        predicates.push(format!("strpos(name, ${}) > 0", params.len()));
    }

    if let Some(start) = non_empty(&query.start_time) {
        match parse_time_bound(start) {
            Some(nanos) => {
                params.push(timestamp_param(nanos));
                predicates.push(format!("start_time_unix_nano >= ${}", params.len()));
            }
            None => warn!(start_time = start, "Ignoring unparsable start_time filter"),
        }
    }

    if let Some(end) = non_empty(&query.end_time) {
        match parse_time_bound(end) {
            Some(nanos) => {
                params.push(timestamp_param(nanos));
                predicates.push(format!("end_time_unix_nano <= ${}", params.len()));
            }
            None => warn!(end_time = end, "Ignoring unparsable end_time filter"),
        }
    }

    let (match_clause, count_where) = if predicates.is_empty() {
        (String::new(), String::new())
    } else {
        let conditions = predicates.join(" AND ");
        (
            format!(
                "WHERE trace_id IN (SELECT trace_id FROM spans WHERE {})\n",
                conditions
            ),
            format!(" WHERE {}", conditions),
        )
    };

    let page_sql = format!(
        "SELECT trace_id,\n\
         \x20      COUNT(*) AS span_count,\n\
         \x20      MIN(start_time_unix_nano) AS trace_start,\n\
         \x20      MAX(end_time_unix_nano) AS trace_end,\n\
         \x20      first_value(name ORDER BY {order}) AS root_operation,\n\
         \x20      first_value(service_name ORDER BY {order}) AS root_service\n\
         FROM spans\n\
         {match_clause}\
         GROUP BY trace_id\n\
         ORDER BY trace_start DESC, trace_id ASC\n\
         LIMIT {limit} OFFSET {offset}",
        order = ROOT_ORDER,
        match_clause = match_clause,
        limit = limit,
        offset = query.offset,
    );

    let count_sql = format!(
        "SELECT COUNT(DISTINCT trace_id) AS total FROM spans{}",
        count_where
    );

    Ok(SearchPlan {
        page_sql,
        count_sql,
        params,
        offset: query.offset,
        limit,
    })
}

fn summaries(batches: &[RecordBatch]) -> Result<Vec<TraceSummary>> {
    let mut traces = Vec::new();

    for batch in batches {
        let trace_ids = columns::strings(batch, "trace_id")?;
        let counts = columns::int64s(batch, "span_count")?;
        let starts = columns::timestamps(batch, "trace_start")?;
        let ends = columns::timestamps(batch, "trace_end")?;
        let operations = columns::strings(batch, "root_operation")?;
        let services = columns::strings(batch, "root_service")?;

        for row in 0..batch.num_rows() {
            traces.push(TraceSummary {
                trace_id: trace_ids.value(row).to_string(),
                span_count: counts[row].max(0) as u64,
                start_time: format_timestamp_nanos(starts[row]),
                end_time: format_timestamp_nanos(ends[row]),
                duration_ms: (ends[row] - starts[row]) as f64 / 1e6,
                root_operation: columns::optional_string(&operations, row).unwrap_or_default(),
                root_service: columns::optional_string(&services, row).unwrap_or_default(),
            });
        }
    }

    Ok(traces)
}

fn total(batches: &[RecordBatch]) -> Result<u64> {
    let mut total = 0;
    for batch in batches {
        total += columns::int64s(batch, "total")?
            .into_iter()
            .map(|n| n.max(0) as u64)
            .sum::<u64>();
    }
    Ok(total)
}

impl SpanStore {
    /// One page of trace summaries plus the total number of matching traces
    pub async fn search_traces(&self, query: &TraceQuery) -> Result<TracePage> {
        let plan = build_search(
            query,
            self.query.default_page_limit,
            self.query.max_page_limit,
        )?;
        debug!(sql = %plan.page_sql, params = plan.params.len(), "Searching traces");

        self.run("search_traces", async {
            let page = self
                .ctx
                .sql(&plan.page_sql)
                .await?
                .with_param_values(plan.params.clone())?
                .collect()
                .await?;

            let counted = self
                .ctx
                .sql(&plan.count_sql)
                .await?
                .with_param_values(plan.params.clone())?
                .collect()
                .await?;

            Ok(TracePage {
                traces: summaries(&page)?,
                pagination: Pagination::new(plan.offset, plan.limit, total(&counted)?),
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::open_store;
    use crate::test_support::{request, span, span_id, trace_id, T0};
    use config::Config;
    use object_store::memory::InMemory;
    use std::sync::Arc;

    fn query() -> TraceQuery {
        TraceQuery::default()
    }

    #[test]
    fn test_parse_time_bound() {
        assert_eq!(parse_time_bound("1700000000000000000"), Some(1_700_000_000_000_000_000));
        assert_eq!(
            parse_time_bound("2023-11-14T22:13:20Z"),
            Some(1_700_000_000_000_000_000)
        );
        assert_eq!(
            parse_time_bound("2023-11-15T00:13:20+02:00"),
            Some(1_700_000_000_000_000_000)
        );
        assert_eq!(
            parse_time_bound("2023-11-14T22:13:20.5"),
            Some(1_700_000_000_500_000_000)
        );
        assert_eq!(parse_time_bound("1970-01-02"), Some(86_400_000_000_000));
        assert_eq!(parse_time_bound("yesterday"), None);
        assert_eq!(parse_time_bound(""), None);
    }

    #[test]
    fn test_limit_handling() {
        assert_eq!(build_search(&query(), 20, 100).unwrap().limit, 20);

        let q = TraceQuery {
            limit: Some(5000),
            ..query()
        };
        assert_eq!(build_search(&q, 20, 100).unwrap().limit, 100);

        let q = TraceQuery {
            limit: Some(0),
            ..query()
        };
        assert!(matches!(
            build_search(&q, 20, 100),
            Err(StoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_one_predicate_per_filter() {
        let q = TraceQuery {
            offset: 40,
            limit: Some(10),
            service: Some("checkout".into()),
            operation: Some("pay".into()),
            start_time: Some("2023-11-14T22:13:20Z".into()),
            end_time: Some("1700000001000000000".into()),
        };
        let plan = build_search(&q, 20, 100).unwrap();

        assert_eq!(
            plan.params,
            vec![
                ScalarValue::Utf8(Some("checkout".into())),
                ScalarValue::Utf8(Some("pay".into())),
                timestamp_param(1_700_000_000_000_000_000),
                timestamp_param(1_700_000_001_000_000_000),
            ]
        );
        assert!(plan.page_sql.contains(
            "WHERE service_name = $1 AND strpos(name, $2) > 0 AND start_time_unix_nano >= $3 AND end_time_unix_nano <= $4"
        ));
        assert!(plan.page_sql.ends_with("LIMIT 10 OFFSET 40"));
        assert_eq!(
            plan.count_sql,
            "SELECT COUNT(DISTINCT trace_id) AS total FROM spans \
             WHERE service_name = $1 AND strpos(name, $2) > 0 AND start_time_unix_nano >= $3 AND end_time_unix_nano <= $4"
        );
    }

    #[test]
    fn test_unparsable_and_empty_filters_dropped() {
        let q = TraceQuery {
            service: Some("".into()),
            start_time: Some("not a time".into()),
            end_time: Some("2023-11-14".into()),
            ..query()
        };
        let plan = build_search(&q, 20, 100).unwrap();
        assert_eq!(plan.params.len(), 1);
        assert!(plan.count_sql.ends_with("WHERE end_time_unix_nano <= $1"));
    }

    #[test]
    fn test_service_bound_as_sent() {
        let q = TraceQuery {
            service: Some(" checkout ".into()),
            operation: Some("   ".into()),
            ..query()
        };
        let plan = build_search(&q, 20, 100).unwrap();
        assert_eq!(plan.params, vec![ScalarValue::Utf8(Some(" checkout ".into()))]);
    }

    #[test]
    fn test_no_filters() {
        let plan = build_search(&query(), 20, 100).unwrap();
        assert!(plan.params.is_empty());
        assert!(!plan.page_sql.contains("WHERE"));
        assert_eq!(plan.count_sql, "SELECT COUNT(DISTINCT trace_id) AS total FROM spans");
    }

    #[test]
    fn test_pagination_flags() {
        assert_eq!(Pagination::new(0, 10, 25), Pagination { offset: 0, limit: 10, total: 25, has_next: true, has_prev: false });
        assert!(!Pagination::new(20, 10, 25).has_next);
        assert!(Pagination::new(20, 10, 25).has_prev);
        assert!(!Pagination::new(0, 10, 10).has_next);
    }

    #[tokio::test]
    async fn test_search_empty_store() {
        let store = open_store(&Config::in_memory(), Arc::new(InMemory::new())).unwrap();
        let page = store.search_traces(&query()).await.unwrap();
        assert!(page.traces.is_empty());
        assert_eq!(page.pagination.total, 0);
        assert!(!page.pagination.has_next);
    }

    #[tokio::test]
    async fn test_search_summaries_and_filters() {
        let store = open_store(&Config::in_memory(), Arc::new(InMemory::new())).unwrap();
        let (t1, t2) = (trace_id('1'), trace_id('2'));
        let (a, b, c) = (span_id('a'), span_id('b'), span_id('c'));

        // Child before root in payload order
        store
            .ingest(&request(
                "checkout",
                vec![
                    span(&t1, &b, Some(&a), "db.query", 10, 60),
                    span(&t1, &a, None, "POST /pay", 0, 150),
                ],
            ))
            .await;
        store
            .ingest(&request("inventory", vec![span(&t2, &c, None, "GET /stock", 500, 520)]))
            .await;

        let page = store.search_traces(&query()).await.unwrap();
        assert_eq!(page.pagination.total, 2);
        // Latest start first
        assert_eq!(page.traces[0].trace_id, t2);
        let checkout = &page.traces[1];
        assert_eq!(checkout.span_count, 2);
        assert_eq!(checkout.root_operation, "POST /pay");
        assert_eq!(checkout.root_service, "checkout");
        assert_eq!(checkout.duration_ms, 150.0);
        assert_eq!(checkout.start_time, format_timestamp_nanos(T0 as i64));

        // Matching a child span selects the whole trace
        let q = TraceQuery {
            operation: Some("db.".into()),
            ..query()
        };
        let page = store.search_traces(&q).await.unwrap();
        assert_eq!(page.pagination.total, 1);
        assert_eq!(page.traces[0].span_count, 2);
        assert_eq!(page.traces[0].root_operation, "POST /pay");

        let q = TraceQuery {
            service: Some("inventory".into()),
            ..query()
        };
        let page = store.search_traces(&q).await.unwrap();
        assert_eq!(page.traces.len(), 1);
        assert_eq!(page.traces[0].trace_id, t2);

        let q = TraceQuery {
            start_time: Some((T0 + 400_000_000).to_string()),
            ..query()
        };
        let page = store.search_traces(&q).await.unwrap();
        assert_eq!(page.traces.len(), 1);
        assert_eq!(page.traces[0].trace_id, t2);
    }

    #[tokio::test]
    async fn test_filters_match_literally() {
        let store = open_store(&Config::in_memory(), Arc::new(InMemory::new())).unwrap();
        let t = trace_id('3');
        store
            .ingest(&request("checkout", vec![span(&t, &span_id('d'), None, "dbXquery", 0, 10)]))
            .await;

        let total = |operation: Option<&str>, service: Option<&str>| {
            let q = TraceQuery {
                operation: operation.map(str::to_string),
                service: service.map(str::to_string),
                ..query()
            };
            let store = &store;
            async move { store.search_traces(&q).await.unwrap().pagination.total }
        };

        assert_eq!(total(Some("db_query"), None).await, 0);
        assert_eq!(total(Some("%"), None).await, 0);
        assert_eq!(total(Some("100%"), None).await, 0);
        assert_eq!(total(Some("Xq"), None).await, 1);
        assert_eq!(total(None, Some(" checkout ")).await, 0);
        assert_eq!(total(None, Some("checkout")).await, 1);
    }

    #[tokio::test]
    async fn test_search_on_closed_store_fails() {
        let store = open_store(&Config::in_memory(), Arc::new(InMemory::new())).unwrap();
        store.close();
        assert!(matches!(
            store.search_traces(&query()).await,
            Err(StoreError::Closed)
        ));
        assert_eq!(
            store
                .metrics()
                .query_errors
                .with_label_values(&["search_traces"])
                .get(),
            1
        );
    }
}
