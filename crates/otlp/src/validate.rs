use thiserror::Error;

use crate::model::{ExportTraceRequest, Span, SpanKind};

const TRACE_ID_HEX_LEN: usize = 32;
const SPAN_ID_HEX_LEN: usize = 16;

/// A payload that must be rejected before it reaches the transform
#[derive(Debug, Error, PartialEq)]
pub enum PayloadError {
    #[error("{location}: traceId {value:?} is not 32 hex characters")]
    InvalidTraceId { location: SpanLocation, value: String },

    #[error("{location}: spanId {value:?} is not 16 hex characters")]
    InvalidSpanId { location: SpanLocation, value: String },

    #[error("{location}: parentSpanId {value:?} is not 16 hex characters")]
    InvalidParentSpanId { location: SpanLocation, value: String },

    #[error("{location}: span kind {kind} is out of range")]
    InvalidKind { location: SpanLocation, kind: i32 },
}

/// Position of a span inside a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanLocation {
    pub resource: usize,
    pub scope: usize,
    pub span: usize,
}

impl std::fmt::Display for SpanLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "resourceSpans[{}].scopeSpans[{}].spans[{}]",
            self.resource, self.scope, self.span
        )
    }
}

/// Check identifiers and kinds of every span; stops at the first violation
pub fn validate_request(request: &ExportTraceRequest) -> Result<(), PayloadError> {
    for (r, resource_spans) in request.resource_spans.iter().enumerate() {
        for (s, scope_spans) in resource_spans.scope_spans.iter().enumerate() {
            for (i, span) in scope_spans.spans.iter().enumerate() {
                let location = SpanLocation {
                    resource: r,
                    scope: s,
                    span: i,
                };
                validate_span(span, location)?;
            }
        }
    }
    Ok(())
}

fn validate_span(span: &Span, location: SpanLocation) -> Result<(), PayloadError> {
    if !is_hex_id(&span.trace_id, TRACE_ID_HEX_LEN) {
        return Err(PayloadError::InvalidTraceId {
            location,
            value: span.trace_id.clone(),
        });
    }
    if !is_hex_id(&span.span_id, SPAN_ID_HEX_LEN) {
        return Err(PayloadError::InvalidSpanId {
            location,
            value: span.span_id.clone(),
        });
    }
    if let Some(parent) = span.parent_span_id.as_deref().filter(|p| !p.is_empty()) {
        if !is_hex_id(parent, SPAN_ID_HEX_LEN) {
            return Err(PayloadError::InvalidParentSpanId {
                location,
                value: parent.to_string(),
            });
        }
    }
    if SpanKind::from_i32(span.kind).is_none() {
        return Err(PayloadError::InvalidKind {
            location,
            kind: span.kind,
        });
    }
    Ok(())
}

fn is_hex_id(value: &str, len: usize) -> bool {
    value.len() == len && hex::decode(value).is_ok()
}
