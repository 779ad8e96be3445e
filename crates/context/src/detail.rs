use datafusion::arrow::record_batch::RecordBatch;
use datafusion::scalar::ScalarValue;
use provider::format_timestamp_nanos;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::columns;
use crate::error::{Result, StoreError};
use crate::store::SpanStore;

const DETAIL_SQL: &str = "SELECT id, trace_id, span_id, parent_span_id, name, \
     start_time_unix_nano, end_time_unix_nano, kind, attributes, service_name, scope_name, events \
     FROM spans WHERE trace_id = $1 \
     ORDER BY start_time_unix_nano ASC, span_id ASC";

/// Attribute consulted when a span's own duration is zero
const DURATION_ATTRIBUTE: &str = "duration_ms";

/// A span as read back from the store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSpan {
    pub id: String,
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub name: String,
    pub start_nanos: i64,
    pub end_nanos: i64,
    pub kind: i32,
    pub attributes: Value,
    pub service_name: String,
    pub scope_name: Option<String>,
    pub events: Value,
}

impl StoredSpan {
    fn is_root(&self) -> bool {
        self.parent_span_id.as_deref().map_or(true, str::is_empty)
    }

    /// `end - start` in milliseconds, or the `duration_ms` attribute when that is zero
    fn duration_ms(&self) -> f64 {
        let computed = (self.end_nanos - self.start_nanos) as f64 / 1e6;
        if computed != 0.0 {
            return computed;
        }

        match self.attributes.get(DURATION_ATTRIBUTE) {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(computed),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(computed),
            _ => computed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpanDetail {
    pub id: String,
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub name: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_ms: f64,
    pub kind: i32,
    pub attributes: Value,
    pub service_name: String,
    pub scope_name: Option<String>,
    pub events: Value,
}

/// One trace with its spans in start order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceDetail {
    pub trace_id: String,
    pub found: bool,
    pub service_name: String,
    pub operation_name: String,
    pub span_count: usize,
    pub start_time: String,
    pub end_time: String,
    /// Sum of the span durations, not wall-clock time
    pub duration_ms: f64,
    /// Latest span end minus earliest span start
    pub elapsed_ms: f64,
    pub spans: Vec<SpanDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingTrace {
    pub trace_id: String,
    pub found: bool,
    pub spans: Vec<SpanDetail>,
}

/// Result of a trace lookup; an unknown trace id is not an error
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TraceLookup {
    Found(TraceDetail),
    Missing(MissingTrace),
}

impl TraceLookup {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Build the trace view from spans ordered by start time
pub fn assemble_trace(trace_id: &str, spans: Vec<StoredSpan>) -> TraceLookup {
    let Some(first) = spans.first() else {
        return TraceLookup::Missing(MissingTrace {
            trace_id: trace_id.to_string(),
            found: false,
            spans: Vec::new(),
        });
    };

    let root = spans.iter().find(|s| s.is_root()).unwrap_or(first);
    let service_name = root.service_name.clone();
    let operation_name = root.name.clone();

    let start = spans.iter().map(|s| s.start_nanos).min().unwrap_or(first.start_nanos);
    let end = spans.iter().map(|s| s.end_nanos).max().unwrap_or(first.end_nanos);

    let details: Vec<SpanDetail> = spans
        .into_iter()
        .map(|span| SpanDetail {
            duration_ms: span.duration_ms(),
            start_time: format_timestamp_nanos(span.start_nanos),
            end_time: format_timestamp_nanos(span.end_nanos),
            id: span.id,
            trace_id: span.trace_id,
            span_id: span.span_id,
            parent_span_id: span.parent_span_id,
            name: span.name,
            kind: span.kind,
            attributes: span.attributes,
            service_name: span.service_name,
            scope_name: span.scope_name,
            events: span.events,
        })
        .collect();

    TraceLookup::Found(TraceDetail {
        trace_id: trace_id.to_string(),
        found: true,
        service_name,
        operation_name,
        span_count: details.len(),
        start_time: format_timestamp_nanos(start),
        end_time: format_timestamp_nanos(end),
        duration_ms: details.iter().map(|s| s.duration_ms).sum(),
        elapsed_ms: (end - start) as f64 / 1e6,
        spans: details,
    })
}

fn parse_blob(value: &str) -> Result<Value> {
    serde_json::from_str(value).map_err(StoreError::from)
}

fn stored_spans(batches: &[RecordBatch]) -> Result<Vec<StoredSpan>> {
    let mut spans = Vec::new();

    for batch in batches {
        let ids = columns::strings(batch, "id")?;
        let trace_ids = columns::strings(batch, "trace_id")?;
        let span_ids = columns::strings(batch, "span_id")?;
        let parents = columns::strings(batch, "parent_span_id")?;
        let names = columns::strings(batch, "name")?;
        let starts = columns::timestamps(batch, "start_time_unix_nano")?;
        let ends = columns::timestamps(batch, "end_time_unix_nano")?;
        let kinds = columns::int32s(batch, "kind")?;
        let attributes = columns::strings(batch, "attributes")?;
        let services = columns::strings(batch, "service_name")?;
        let scopes = columns::strings(batch, "scope_name")?;
        let events = columns::strings(batch, "events")?;

        for row in 0..batch.num_rows() {
            spans.push(StoredSpan {
                id: ids.value(row).to_string(),
                trace_id: trace_ids.value(row).to_string(),
                span_id: span_ids.value(row).to_string(),
                parent_span_id: columns::optional_string(&parents, row),
                name: names.value(row).to_string(),
                start_nanos: starts[row],
                end_nanos: ends[row],
                kind: kinds[row],
                attributes: parse_blob(attributes.value(row))?,
                service_name: services.value(row).to_string(),
                scope_name: columns::optional_string(&scopes, row),
                events: parse_blob(events.value(row))?,
            });
        }
    }

    Ok(spans)
}

impl SpanStore {
    /// Every span of one trace, with per-span and trace-level durations
    pub async fn trace_detail(&self, trace_id: &str) -> Result<TraceLookup> {
        let trace_id = trace_id.trim();
        if trace_id.is_empty() {
            return Err(StoreError::InvalidArgument(
                "trace id must not be empty".to_string(),
            ));
        }

        self.run("trace_detail", async {
            let batches = self
                .ctx
                .sql(DETAIL_SQL)
                .await?
                .with_param_values(vec![ScalarValue::Utf8(Some(trace_id.to_string()))])?
                .collect()
                .await?;

            let spans = stored_spans(&batches)?;
            debug!(trace_id, spans = spans.len(), "Loaded trace");
            Ok(assemble_trace(trace_id, spans))
        })
        .await
    }
}
