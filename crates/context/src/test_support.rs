// Payload builders shared by the store tests

use otlp::{ExportTraceRequest, KeyValue, Resource, ResourceSpans, ScopeSpans, Span};

pub(crate) const T0: u64 = 1_700_000_000_000_000_000;
pub(crate) const MS: u64 = 1_000_000;

pub(crate) fn span(trace: &str, id: &str, parent: Option<&str>, name: &str, start_ms: u64, end_ms: u64) -> Span {
    Span {
        trace_id: trace.to_string(),
        span_id: id.to_string(),
        parent_span_id: parent.map(str::to_string),
        name: name.to_string(),
        start_time_unix_nano: T0 + start_ms * MS,
        end_time_unix_nano: T0 + end_ms * MS,
        kind: 2,
        attributes: vec![],
        events: vec![],
    }
}

pub(crate) fn request(service: &str, spans: Vec<Span>) -> ExportTraceRequest {
    ExportTraceRequest {
        resource_spans: vec![ResourceSpans {
            resource: Resource {
                attributes: vec![KeyValue::string("service.name", service)],
            },
            scope_spans: vec![ScopeSpans { scope: None, spans }],
        }],
    }
}

/// Trace id made of one repeated hex digit
pub(crate) fn trace_id(digit: char) -> String {
    std::iter::repeat(digit).take(32).collect()
}

/// Span id made of one repeated hex digit
pub(crate) fn span_id(digit: char) -> String {
    std::iter::repeat(digit).take(16).collect()
}
