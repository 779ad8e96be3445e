//! # storage
//!
//! Persistence of span records as immutable Parquet segments in an object store.
//!
//! 1. **Object store** (`object_store.rs`) - local, S3-compatible or in-memory backend
//! 2. **Schema** (`schema.rs`) - the fixed column list of the `spans` table
//! 3. **Encoder** (`encoder.rs`) - span records → Arrow record batch → Parquet bytes
//! 4. **Segments** (`segments.rs`) - segment naming, upload and discovery
pub mod encoder;
pub mod object_store;
pub mod schema;
pub mod segments;

pub use encoder::{encode_parquet, records_to_batch};
pub use self::object_store::create_object_store;
pub use schema::{spans_schema, SPAN_COLUMNS};
pub use segments::{DiscoveredSegment, SegmentStorage, WrittenSegment};
