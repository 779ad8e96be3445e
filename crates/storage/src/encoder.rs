use bytes::Bytes;
use datafusion::arrow::array::{ArrayRef, Int32Array, StringArray, TimestampNanosecondArray};
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::error::{DataFusionError, Result};
use datafusion::parquet::arrow::ArrowWriter;
use datafusion::parquet::basic::{Compression, ZstdLevel};
use datafusion::parquet::file::properties::WriterProperties;
use otlp::SpanRecord;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::schema::{spans_schema, TIMESTAMP_TZ};

/// Build one record batch in the fixed column order, generating a row id per span
pub fn records_to_batch(records: &[SpanRecord]) -> Result<RecordBatch> {
    let mut attributes = Vec::with_capacity(records.len());
    let mut resource_attributes: Vec<String> = Vec::with_capacity(records.len());
    let mut events = Vec::with_capacity(records.len());

    for (i, record) in records.iter().enumerate() {
        attributes.push(to_json(&record.attributes)?);
        events.push(to_json(&record.events)?);

        // Spans of one resource share their attribute map; serialize it once
        let shared = i > 0
            && Arc::ptr_eq(
                &records[i - 1].resource_attributes,
                &record.resource_attributes,
            );
        let resource_json = if shared {
            resource_attributes[i - 1].clone()
        } else {
            to_json(record.resource_attributes.as_ref())?
        };
        resource_attributes.push(resource_json);
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|_| Uuid::new_v4().to_string()),
        )),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.trace_id.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.span_id.as_str()),
        )),
        Arc::new(
            records
                .iter()
                .map(|r| r.parent_span_id.as_deref())
                .collect::<StringArray>(),
        ),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.name.as_str()),
        )),
        Arc::new(timestamps(records.iter().map(|r| &r.start_time))),
        Arc::new(timestamps(records.iter().map(|r| &r.end_time))),
        Arc::new(Int32Array::from_iter_values(records.iter().map(|r| r.kind))),
        Arc::new(StringArray::from_iter_values(attributes)),
        Arc::new(StringArray::from_iter_values(resource_attributes)),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.service_name.as_str()),
        )),
        Arc::new(
            records
                .iter()
                .map(|r| r.scope_name.as_deref())
                .collect::<StringArray>(),
        ),
        Arc::new(StringArray::from_iter_values(events)),
    ];

    Ok(RecordBatch::try_new(spans_schema(), columns)?)
}

/// Serialize a batch as a single zstd-compressed Parquet file
pub fn encode_parquet(batch: &RecordBatch) -> Result<Bytes> {
    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::default()))
        .build();

    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;

    Ok(Bytes::from(buffer))
}

fn timestamps<'a>(
    times: impl Iterator<Item = &'a chrono::DateTime<chrono::Utc>>,
) -> TimestampNanosecondArray {
    TimestampNanosecondArray::from_iter_values(
        times.map(|t| t.timestamp_nanos_opt().unwrap_or(i64::MAX)),
    )
    .with_timezone(TIMESTAMP_TZ)
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| DataFusionError::External(Box::new(e)))
}
