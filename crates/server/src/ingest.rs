use axum::http::{header, HeaderMap};
use bytes::Bytes;
use flate2::read::GzDecoder;
use otlp::{validate_request, ExportTraceRequest};
use std::io::Read;

use crate::error::{Result, ServerError};

const JSON: &str = "application/json";
const PROTOBUF: &str = "application/x-protobuf";

fn is_gzip(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|s| s.to_ascii_lowercase().contains("gzip"))
}

/// Media type without parameters, lowercased
fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(';').next())
        .map(|s| s.trim().to_ascii_lowercase())
}

/// Inflate a gzip body, refusing to produce more than `max_bytes`
fn gunzip(body: &[u8], max_bytes: usize) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(body)
        .take(max_bytes as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| ServerError::BadRequest(format!("gzip decode failed: {}", e)))?;

    if out.len() > max_bytes {
        return Err(ServerError::PayloadTooLarge(max_bytes));
    }
    Ok(out)
}

/// Decode, parse and validate an OTLP/JSON export request
///
/// A missing content type is read as JSON. Protobuf and any other media
/// type are rejected.
pub fn decode_request(headers: &HeaderMap, body: Bytes, max_bytes: usize) -> Result<ExportTraceRequest> {
    match content_type(headers).as_deref() {
        None | Some(JSON) => {}
        Some(PROTOBUF) => {
            return Err(ServerError::UnsupportedMediaType(
                "OTLP/protobuf is not supported, send OTLP/JSON".to_string(),
            ))
        }
        Some(other) => return Err(ServerError::UnsupportedMediaType(other.to_string())),
    }

    let raw = if is_gzip(headers) {
        Bytes::from(gunzip(&body, max_bytes)?)
    } else {
        body
    };

    let request: ExportTraceRequest = serde_json::from_slice(&raw)
        .map_err(|e| ServerError::BadRequest(format!("invalid OTLP/JSON: {}", e)))?;
    validate_request(&request)?;

    Ok(request)
}
