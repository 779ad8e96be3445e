//! # context
//!
//! The span store: a DataFusion session over the segment table, a bounded
//! connection pool, and the read and write operations built on them.
//!
//! 1. **Store** (`store.rs`) - `SpanStore` composition, session setup, pooled execution
//! 2. **Writer** (`writer.rs`) - bulk writes that never fail the caller
//! 3. **Search** (`search.rs`) - filtered, paginated trace summaries
//! 4. **Detail** (`detail.rs`) - one trace with per-span and trace-level durations
//! 5. **Ad-hoc** (`adhoc.rs`) - caller-supplied SQL with normalized rows
pub mod adhoc;
mod columns;
pub mod detail;
pub mod envelope;
pub mod error;
pub mod metrics;
pub mod pool;
pub mod search;
pub mod store;
#[cfg(test)]
mod test_support;
pub mod writer;

pub use adhoc::QueryResult;
pub use detail::{assemble_trace, MissingTrace, SpanDetail, StoredSpan, TraceDetail, TraceLookup};
pub use envelope::Envelope;
pub use error::{Result, StoreError};
pub use metrics::StoreMetrics;
pub use pool::ConnectionPool;
pub use search::{parse_time_bound, Pagination, TracePage, TraceQuery, TraceSummary};
pub use store::{create_context, create_store, open_store, SpanStore};
pub use writer::WriteOutcome;
