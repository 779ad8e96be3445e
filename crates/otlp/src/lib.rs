//! # otlp
//!
//! OTLP/JSON trace payloads and their conversion into flat span records.
//!
//! The crate is pure: it performs no I/O and has no knowledge of the store.
//!
//! 1. **Model** (`model.rs`) - serde types for `ExportTraceServiceRequest` in OTLP/JSON form
//! 2. **Attributes** (`attributes.rs`) - tagged `AnyValue` → scalar flattening
//! 3. **Naming** (`naming.rs`) - `{placeholder}` substitution in span names
//! 4. **Transform** (`transform.rs`) - resource/scope/span hierarchy → `SpanRecord`s
//! 5. **Validate** (`validate.rs`) - identifier and kind checks applied at the ingestion boundary
pub mod attributes;
pub mod model;
pub mod naming;
pub mod transform;
pub mod validate;

pub use attributes::{flatten_attributes, AttributeValue, Attributes};
pub use model::{
    AnyValue, ExportTraceRequest, InstrumentationScope, KeyValue, Resource, ResourceSpans,
    ScopeSpans, Span, SpanEvent, SpanKind,
};
pub use naming::resolve_span_name;
pub use transform::{nanos_to_datetime, service_name, transform_request, EventRecord, SpanRecord};
pub use validate::{validate_request, PayloadError, SpanLocation};

/// Resource attribute holding the producing service's name
pub const SERVICE_NAME_KEY: &str = "service.name";

/// Service name used when a resource carries no `service.name`
pub const UNKNOWN_SERVICE: &str = "unknown";
