use config::Config;
use context::{open_store, SpanStore};
use object_store::memory::InMemory;
use otlp::{ExportTraceRequest, KeyValue, Resource, ResourceSpans, ScopeSpans, Span};
use std::path::PathBuf;
use std::sync::Arc;

/// Nanosecond epoch used as t0 by the test payloads
pub const T0: u64 = 1_700_000_000_000_000_000;

const MS: u64 = 1_000_000;

/// Open a store over a fresh in-memory object store
pub fn memory_store() -> anyhow::Result<SpanStore> {
    Ok(open_store(&Config::in_memory(), Arc::new(InMemory::new()))?)
}

/// Get the path to a payload under `crates/tests/payloads`
pub fn payload_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("payloads")
        .join(name)
}

/// Parse an OTLP/JSON payload
pub fn parse_payload(json: &str) -> anyhow::Result<ExportTraceRequest> {
    let request: ExportTraceRequest = serde_json::from_str(json)?;
    otlp::validate_request(&request)?;
    Ok(request)
}

/// Load and parse a payload from `crates/tests/payloads`
pub fn load_payload(name: &str) -> anyhow::Result<ExportTraceRequest> {
    let json = std::fs::read_to_string(payload_path(name))?;
    parse_payload(&json)
}

/// A span whose times are offsets in milliseconds from `T0`
pub fn span(trace_id: &str, span_id: &str, parent: Option<&str>, name: &str, start_ms: u64, end_ms: u64) -> Span {
    Span {
        trace_id: trace_id.to_string(),
        span_id: span_id.to_string(),
        parent_span_id: parent.map(str::to_string),
        name: name.to_string(),
        start_time_unix_nano: T0 + start_ms * MS,
        end_time_unix_nano: T0 + end_ms * MS,
        kind: 1,
        attributes: vec![],
        events: vec![],
    }
}

/// A single-resource, single-scope payload
pub fn payload(service: &str, spans: Vec<Span>) -> ExportTraceRequest {
    ExportTraceRequest {
        resource_spans: vec![ResourceSpans {
            resource: Resource {
                attributes: vec![KeyValue::string("service.name", service)],
            },
            scope_spans: vec![ScopeSpans { scope: None, spans }],
        }],
    }
}

/// Hex trace id for the n-th synthetic trace
pub fn trace_id(n: u64) -> String {
    format!("{:032x}", n + 1)
}

/// Hex span id for the n-th synthetic span
pub fn span_id(n: u64) -> String {
    format!("{:016x}", n + 1)
}
