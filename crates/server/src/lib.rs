//! # tracestore-server
//!
//! HTTP surface of the span store.
//!
//! 1. **Ingest** (`ingest.rs`) - OTLP/JSON decoding (optionally gzip) and payload validation
//! 2. **HTTP** (`http.rs`) - router, trace query handlers, health and Prometheus metrics
//! 3. **Error** (`error.rs`) - boundary errors rendered as 4xx responses
pub mod error;
pub mod http;
pub mod ingest;

pub use error::{Result, ServerError};
pub use http::{create_router, AppState};
