use datafusion::arrow::array::{
    Array, ArrayRef, AsArray, Float64Builder, StringArray, StringBuilder,
};
use datafusion::arrow::compute::cast;
use datafusion::arrow::datatypes::DataType;
use datafusion::error::{DataFusionError, Result};
use datafusion::logical_expr::{ColumnarValue, ScalarUDF, Volatility};
use datafusion::prelude::*;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::error;

/// Look up `key` in a JSON attribute object and return its display form
///
/// Takes two arguments:
/// - json: A JSON object column (e.g., `attributes` or `resource_attributes`)
/// - key: The attribute key
///
/// Strings are returned as is, numbers and booleans as their JSON text.
/// Returns null when the key is missing, the value is null, or the input is
/// not a JSON object.
///
/// This is a wrapper function that logs errors before returning them to DataFusion.
pub fn attr_str(args: &[ColumnarValue]) -> Result<ColumnarValue> {
    attr_str_impl(args).map_err(|e| {
        error!("attr_str UDF error: {}", e);
        e
    })
}

fn attr_str_impl(args: &[ColumnarValue]) -> Result<ColumnarValue> {
    let (objects, keys) = json_and_keys("attr_str", args)?;
    let objects = objects.as_string::<i32>();
    let keys = keys.as_string::<i32>();

    let mut builder = StringBuilder::with_capacity(objects.len(), objects.len() * 16);
    for row in 0..objects.len() {
        match lookup(objects, keys, row) {
            Some(Value::String(s)) => builder.append_value(s),
            Some(Value::Null) | None => builder.append_null(),
            Some(other) => builder.append_value(other.to_string()),
        }
    }

    Ok(ColumnarValue::Array(Arc::new(builder.finish()) as ArrayRef))
}

/// Look up `key` in a JSON attribute object and return it as a float
///
/// Numbers and numeric strings convert; anything else is null.
///
/// This is a wrapper function that logs errors before returning them to DataFusion.
pub fn attr_num(args: &[ColumnarValue]) -> Result<ColumnarValue> {
    attr_num_impl(args).map_err(|e| {
        error!("attr_num UDF error: {}", e);
        e
    })
}

fn attr_num_impl(args: &[ColumnarValue]) -> Result<ColumnarValue> {
    let (objects, keys) = json_and_keys("attr_num", args)?;
    let objects = objects.as_string::<i32>();
    let keys = keys.as_string::<i32>();

    let mut builder = Float64Builder::with_capacity(objects.len());
    for row in 0..objects.len() {
        let number = match lookup(objects, keys, row) {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        builder.append_option(number);
    }

    Ok(ColumnarValue::Array(Arc::new(builder.finish()) as ArrayRef))
}

/// Validate the (json, key) arguments and materialize both as Utf8 arrays
fn json_and_keys(name: &str, args: &[ColumnarValue]) -> Result<(ArrayRef, ArrayRef)> {
    if args.len() != 2 {
        return Err(DataFusionError::Execution(format!(
            "{} requires 2 arguments: (json, key)",
            name
        )));
    }

    let arrays = ColumnarValue::values_to_arrays(args)?;
    let objects = cast(&arrays[0], &DataType::Utf8)?;
    let keys = cast(&arrays[1], &DataType::Utf8)?;
    Ok((objects, keys))
}

fn lookup(objects: &StringArray, keys: &StringArray, row: usize) -> Option<Value> {
    if objects.is_null(row) || keys.is_null(row) {
        return None;
    }
    let mut object: Map<String, Value> = serde_json::from_str(objects.value(row)).ok()?;
    object.remove(keys.value(row))
}

fn create_udf_with(
    name: &str,
    return_type: DataType,
    func: fn(&[ColumnarValue]) -> Result<ColumnarValue>,
) -> ScalarUDF {
    use datafusion::logical_expr::{create_udf, ScalarFunctionImplementation};

    let func: ScalarFunctionImplementation = Arc::new(func);

    create_udf(
        name,
        vec![DataType::Utf8, DataType::Utf8],
        return_type,
        Volatility::Immutable,
        func,
    )
}

pub fn create_attr_str_udf() -> ScalarUDF {
    create_udf_with("attr_str", DataType::Utf8, attr_str)
}

pub fn create_attr_num_udf() -> ScalarUDF {
    create_udf_with("attr_num", DataType::Float64, attr_num)
}

/// Register all UDFs with the DataFusion context
pub fn register_udfs(ctx: &SessionContext) {
    ctx.register_udf(create_attr_str_udf());
    ctx.register_udf(create_attr_num_udf());
}
