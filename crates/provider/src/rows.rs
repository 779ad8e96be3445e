use chrono::{DateTime, SecondsFormat};
use datafusion::arrow::array::{Array, ArrayRef, AsArray};
use datafusion::arrow::compute::cast;
use datafusion::arrow::datatypes::{
    DataType, Date32Type, Float64Type, Int64Type, TimeUnit, TimestampNanosecondType, UInt64Type,
};
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::arrow::util::display::array_value_to_string;
use datafusion::error::Result;
use serde_json::{Map, Number, Value};

/// One result row keyed by column name
pub type Row = Map<String, Value>;

/// Render nanoseconds since the epoch as RFC 3339 in UTC (`...Z`)
pub fn format_timestamp_nanos(nanos: i64) -> String {
    DateTime::from_timestamp_nanos(nanos).to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Convert record batches into JSON rows
///
/// Timestamps become RFC 3339 strings, dates ISO dates, integers and floats
/// JSON numbers (non-finite floats become null), strings pass through
/// unchanged. Anything else is rendered with Arrow's display format.
pub fn batches_to_rows(batches: &[RecordBatch]) -> Result<Vec<Row>> {
    let total: usize = batches.iter().map(|b| b.num_rows()).sum();
    let mut rows = Vec::with_capacity(total);

    for batch in batches {
        let schema = batch.schema();
        let columns = batch
            .columns()
            .iter()
            .map(column_values)
            .collect::<Result<Vec<_>>>()?;

        for row_idx in 0..batch.num_rows() {
            let mut row = Map::with_capacity(columns.len());
            for (field, values) in schema.fields().iter().zip(&columns) {
                row.insert(field.name().clone(), values[row_idx].clone());
            }
            rows.push(row);
        }
    }

    Ok(rows)
}

/// Normalize one column into JSON values, one per row
fn column_values(column: &ArrayRef) -> Result<Vec<Value>> {
    let len = column.len();
    let null_or = |i: usize, value: Value| {
        if column.is_null(i) {
            Value::Null
        } else {
            value
        }
    };

    let values = match column.data_type() {
        DataType::Null => vec![Value::Null; len],
        DataType::Boolean => {
            let array = column.as_boolean();
            (0..len).map(|i| null_or(i, Value::Bool(array.value(i)))).collect()
        }
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32 => {
            let converted = cast(column, &DataType::Int64)?;
            let array = converted.as_primitive::<Int64Type>();
            (0..len).map(|i| null_or(i, Value::from(array.value(i)))).collect()
        }
        DataType::UInt64 => {
            let array = column.as_primitive::<UInt64Type>();
            (0..len).map(|i| null_or(i, Value::from(array.value(i)))).collect()
        }
        DataType::Float16
        | DataType::Float32
        | DataType::Float64
        | DataType::Decimal128(_, _)
        | DataType::Decimal256(_, _) => {
            let converted = cast(column, &DataType::Float64)?;
            let array = converted.as_primitive::<Float64Type>();
            (0..len)
                .map(|i| {
                    let number = Number::from_f64(array.value(i)).map(Value::Number);
                    null_or(i, number.unwrap_or(Value::Null))
                })
                .collect()
        }
        DataType::Timestamp(_, _) => {
            let converted = cast(column, &DataType::Timestamp(TimeUnit::Nanosecond, None))?;
            let array = converted.as_primitive::<TimestampNanosecondType>();
            (0..len)
                .map(|i| {
                    // Out-of-range values cast to null
                    if array.is_null(i) {
                        Value::Null
                    } else {
                        Value::String(format_timestamp_nanos(array.value(i)))
                    }
                })
                .collect()
        }
        DataType::Date32 | DataType::Date64 => {
            let converted = cast(column, &DataType::Date32)?;
            let array = converted.as_primitive::<Date32Type>();
            (0..len)
                .map(|i| {
                    let date = array.value_as_date(i).map(|d| Value::String(d.to_string()));
                    null_or(i, date.unwrap_or(Value::Null))
                })
                .collect()
        }
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => {
            let converted = cast(column, &DataType::Utf8)?;
            let array = converted.as_string::<i32>();
            (0..len)
                .map(|i| null_or(i, Value::String(array.value(i).to_string())))
                .collect()
        }
        _ => (0..len)
            .map(|i| -> Result<Value> {
                if column.is_null(i) {
                    Ok(Value::Null)
                } else {
                    Ok(Value::String(array_value_to_string(column, i)?))
                }
            })
            .collect::<Result<Vec<_>>>()?,
    };

    Ok(values)
}
