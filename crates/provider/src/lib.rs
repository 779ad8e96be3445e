pub mod display;
pub mod rows;
pub mod table_provider;
pub mod udf;

pub use display::format_rows;
pub use rows::{batches_to_rows, format_timestamp_nanos, Row};
pub use table_provider::{register_spans_table, SpanTableProvider, SPANS_TABLE, STORE_URL};
pub use udf::register_udfs;
