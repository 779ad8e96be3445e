use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attributes::{flatten_attributes, Attributes};
use crate::model::{ExportTraceRequest, Span, SpanEvent};
use crate::naming::resolve_span_name;
use crate::{SERVICE_NAME_KEY, UNKNOWN_SERVICE};

/// One flat, immutable span row
#[derive(Debug, Clone, PartialEq)]
pub struct SpanRecord {
    pub trace_id: String,
    pub span_id: String,
    /// `None` for root spans
    pub parent_span_id: Option<String>,
    /// Name after placeholder resolution
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub kind: i32,
    pub attributes: Attributes,
    /// Shared by every span of the owning resource
    pub resource_attributes: Arc<Attributes>,
    pub service_name: String,
    pub scope_name: Option<String>,
    pub events: Vec<EventRecord>,
}

impl SpanRecord {
    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub time: DateTime<Utc>,
    pub name: String,
    pub attributes: Attributes,
}

/// Display form of `service.name`, or `"unknown"`
pub fn service_name(resource_attributes: &Attributes) -> String {
    resource_attributes
        .get(SERVICE_NAME_KEY)
        .map(|v| v.to_string())
        .unwrap_or_else(|| UNKNOWN_SERVICE.to_string())
}

/// Flatten a payload into span records, one per wire span, in payload order
pub fn transform_request(request: &ExportTraceRequest) -> Vec<SpanRecord> {
    let mut records = Vec::with_capacity(request.span_count());

    for resource_spans in &request.resource_spans {
        let resource_attributes = Arc::new(flatten_attributes(&resource_spans.resource.attributes));
        let service = service_name(&resource_attributes);

        for scope_spans in &resource_spans.scope_spans {
            let scope_name = scope_spans
                .scope
                .as_ref()
                .map(|scope| scope.name.as_str())
                .filter(|name| !name.is_empty());

            for span in &scope_spans.spans {
                records.push(transform_span(
                    span,
                    &resource_attributes,
                    &service,
                    scope_name,
                ));
            }
        }
    }

    records
}

fn transform_span(
    span: &Span,
    resource_attributes: &Arc<Attributes>,
    service: &str,
    scope_name: Option<&str>,
) -> SpanRecord {
    let attributes = flatten_attributes(&span.attributes);
    let name = resolve_span_name(&span.name, &attributes);

    SpanRecord {
        trace_id: span.trace_id.clone(),
        span_id: span.span_id.clone(),
        parent_span_id: span
            .parent_span_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(str::to_string),
        name,
        start_time: nanos_to_datetime(span.start_time_unix_nano),
        end_time: nanos_to_datetime(span.end_time_unix_nano),
        kind: span.kind,
        attributes,
        resource_attributes: Arc::clone(resource_attributes),
        service_name: service.to_string(),
        scope_name: scope_name.map(str::to_string),
        events: span.events.iter().map(transform_event).collect(),
    }
}

fn transform_event(event: &SpanEvent) -> EventRecord {
    EventRecord {
        time: nanos_to_datetime(event.time_unix_nano),
        name: event.name.clone(),
        attributes: flatten_attributes(&event.attributes),
    }
}

/// Nanoseconds since the epoch as UTC; saturates past year 2262
pub fn nanos_to_datetime(nanos: u64) -> DateTime<Utc> {
    DateTime::from_timestamp_nanos(i64::try_from(nanos).unwrap_or(i64::MAX))
}
