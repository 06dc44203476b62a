//! Column decoding and parameter binding against the engine seam.
//!
//! Decoding maps the declared SQL type of a column to one of the seven
//! boundary variants; binding dispatches a typed value to the matching
//! positional setter. Both sides work on one value at a time so the handle
//! types can batch a whole row or parameter set per call.

use crate::engine::{EngineCursor, EnginePrepared, SqlType};
use crate::error::EngineError;
use crate::value::{RawValue, Value};

/// Decode one column of the cursor's current row into its boundary record.
///
/// Integer types carry their exact value only at scale zero; scaled integers
/// and NUMERIC/DECIMAL columns surface the engine's canonical decimal text
/// instead, so no precision is lost on the way across. NULL wins over the
/// declared type in every arm.
pub(crate) fn decode_column(
    cursor: &mut dyn EngineCursor,
    column: usize,
) -> Result<RawValue, EngineError> {
    let value = match cursor.column_type(column) {
        SqlType::Null => Value::Null,
        SqlType::TinyInt | SqlType::SmallInt | SqlType::Integer | SqlType::BigInt
            if cursor.scale(column) == 0 =>
        {
            let v = cursor.get_i64(column)?;
            if cursor.was_null() {
                Value::Null
            } else {
                Value::Int64(v)
            }
        }
        SqlType::TinyInt
        | SqlType::SmallInt
        | SqlType::Integer
        | SqlType::BigInt
        | SqlType::Numeric
        | SqlType::Decimal => match cursor.get_string(column)? {
            Some(text) => Value::Bytes(text),
            None => Value::Null,
        },
        SqlType::Float | SqlType::Double => {
            let v = cursor.get_f64(column)?;
            if cursor.was_null() {
                Value::Null
            } else {
                Value::Float64(v)
            }
        }
        SqlType::Bit | SqlType::Boolean => {
            let v = cursor.get_bool(column)?;
            if cursor.was_null() {
                Value::Null
            } else {
                Value::Bool(v)
            }
        }
        SqlType::Date | SqlType::Time | SqlType::Timestamp => {
            match cursor.get_timestamp(column)? {
                Some((seconds, nanos)) => Value::Time { seconds, nanos },
                None => Value::Null,
            }
        }
        _ => match cursor.get_bytes(column)? {
            Some(bytes) => Value::Bytes(bytes),
            None => Value::Null,
        },
    };
    Ok(RawValue::encode(&value))
}

/// Bind one typed value to the statement's 1-based parameter position.
pub(crate) fn bind_param(
    prepared: &mut dyn EnginePrepared,
    index: usize,
    value: &Value<'_>,
) -> Result<(), EngineError> {
    match *value {
        Value::Null => prepared.set_null(index),
        Value::Int64(v) => prepared.set_i64(index, v),
        Value::Float64(v) => prepared.set_f64(index, v),
        Value::Bool(v) => prepared.set_bool(index, v),
        Value::String(s) => prepared.set_string(index, s),
        Value::Bytes(b) => prepared.set_bytes(index, b),
        Value::Time { seconds, nanos } => prepared.set_timestamp(index, seconds, nanos),
    }
}

/// Read the generated key from a freshly returned generated-keys cursor.
///
/// The engine only materializes the key after the cursor is exhausted, so
/// walk past every row before reading column one. Non-numeric key columns
/// (string primary keys and the like) report zero.
pub(crate) fn generated_key(cursor: &mut dyn EngineCursor) -> Result<i64, EngineError> {
    if cursor.column_count() == 0 {
        return Ok(0);
    }
    while cursor.next()? {}
    if cursor.column_type(1).is_numeric_like() {
        cursor.get_i64(1)
    } else {
        Ok(0)
    }
}
