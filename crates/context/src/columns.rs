// Typed access to result columns by name
//
// Query results may carry view or large string types depending on the plan,
// so string columns are cast to Utf8 before use.

use datafusion::arrow::array::{Array, ArrayRef, AsArray, StringArray};
use datafusion::arrow::compute::cast;
use datafusion::arrow::datatypes::{DataType, Int32Type, Int64Type, TimeUnit, TimestampNanosecondType};
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::error::DataFusionError;

use crate::error::Result;

fn column(batch: &RecordBatch, name: &str) -> Result<ArrayRef> {
    batch.column_by_name(name).cloned().ok_or_else(|| {
        DataFusionError::Execution(format!("Result is missing column '{}'", name)).into()
    })
}

pub(crate) fn strings(batch: &RecordBatch, name: &str) -> Result<StringArray> {
    let array = cast(&column(batch, name)?, &DataType::Utf8)?;
    Ok(array.as_string::<i32>().clone())
}

pub(crate) fn optional_string(array: &StringArray, row: usize) -> Option<String> {
    (!array.is_null(row)).then(|| array.value(row).to_string())
}

pub(crate) fn int64s(batch: &RecordBatch, name: &str) -> Result<Vec<i64>> {
    let array = cast(&column(batch, name)?, &DataType::Int64)?;
    Ok(array.as_primitive::<Int64Type>().values().to_vec())
}

pub(crate) fn int32s(batch: &RecordBatch, name: &str) -> Result<Vec<i32>> {
    let array = cast(&column(batch, name)?, &DataType::Int32)?;
    Ok(array.as_primitive::<Int32Type>().values().to_vec())
}

/// Nanoseconds since the epoch, whatever the timestamp unit or timezone
pub(crate) fn timestamps(batch: &RecordBatch, name: &str) -> Result<Vec<i64>> {
    let array = cast(
        &column(batch, name)?,
        &DataType::Timestamp(TimeUnit::Nanosecond, None),
    )?;
    Ok(array
        .as_primitive::<TimestampNanosecondType>()
        .values()
        .to_vec())
}
