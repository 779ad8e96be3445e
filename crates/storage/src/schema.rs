// Arrow schema of the `spans` table
//
// One row per span. Identifiers are lowercase hex strings, timestamps are
// nanosecond precision in UTC, and the attribute maps and events are JSON
// text so they can be read back by any client and probed with the
// attribute UDFs.

use datafusion::arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use std::sync::Arc;

pub const ID: &str = "id";
pub const TRACE_ID: &str = "trace_id";
pub const SPAN_ID: &str = "span_id";
pub const PARENT_SPAN_ID: &str = "parent_span_id";
pub const NAME: &str = "name";
pub const START_TIME: &str = "start_time_unix_nano";
pub const END_TIME: &str = "end_time_unix_nano";
pub const KIND: &str = "kind";
pub const ATTRIBUTES: &str = "attributes";
pub const RESOURCE_ATTRIBUTES: &str = "resource_attributes";
pub const SERVICE_NAME: &str = "service_name";
pub const SCOPE_NAME: &str = "scope_name";
pub const EVENTS: &str = "events";

/// Column order of every segment
pub const SPAN_COLUMNS: [&str; 13] = [
    ID,
    TRACE_ID,
    SPAN_ID,
    PARENT_SPAN_ID,
    NAME,
    START_TIME,
    END_TIME,
    KIND,
    ATTRIBUTES,
    RESOURCE_ATTRIBUTES,
    SERVICE_NAME,
    SCOPE_NAME,
    EVENTS,
];

/// Timezone attached to both timestamp columns
pub const TIMESTAMP_TZ: &str = "UTC";

pub fn timestamp_type() -> DataType {
    DataType::Timestamp(TimeUnit::Nanosecond, Some(TIMESTAMP_TZ.into()))
}

/// Creates the schema shared by all span segments
pub fn spans_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        // Row id generated by the writer (UUID v4)
        Field::new(ID, DataType::Utf8, false),
        Field::new(TRACE_ID, DataType::Utf8, false),
        Field::new(SPAN_ID, DataType::Utf8, false),
        // Null for root spans
        Field::new(PARENT_SPAN_ID, DataType::Utf8, true),
        Field::new(NAME, DataType::Utf8, false),
        Field::new(START_TIME, timestamp_type(), false),
        Field::new(END_TIME, timestamp_type(), false),
        Field::new(KIND, DataType::Int32, false),
        // JSON objects of flattened attributes
        Field::new(ATTRIBUTES, DataType::Utf8, false),
        Field::new(RESOURCE_ATTRIBUTES, DataType::Utf8, false),
        Field::new(SERVICE_NAME, DataType::Utf8, false),
        Field::new(SCOPE_NAME, DataType::Utf8, true),
        // JSON array of {time, name, attributes}
        Field::new(EVENTS, DataType::Utf8, false),
    ]))
}
