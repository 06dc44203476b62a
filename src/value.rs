//! Tagged value representation crossing the bridge boundary.
//!
//! [`Value`] is the typed Rust view; [`RawValue`] is the fixed-layout record
//! that actually crosses the C seam. A raw value is two integer slots plus a
//! tag, sixteen bytes total, so whole rows and parameter sets travel as
//! contiguous arrays.

use std::str::Utf8Error;

/// Discriminant for the seven boundary value variants.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTag {
    Null = 0,
    Int64 = 1,
    Float64 = 2,
    Bool = 3,
    String = 4,
    Bytes = 5,
    Time = 6,
}

/// Fixed-layout value record exchanged with C callers.
///
/// Slot meanings by tag:
/// - `Int64`: `slot` holds the value, `aux` unused.
/// - `Float64`: `slot` holds the IEEE-754 bit pattern (`f64::to_bits`).
/// - `Bool`: `slot` is 0 or 1.
/// - `String`/`Bytes`: `slot` is a pointer to the bytes, `aux` the byte
///   length. The referenced buffer is not owned by the record.
/// - `Time`: `slot` is whole seconds since the epoch, `aux` the nanosecond
///   part.
/// - `Null`: both slots zero.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawValue {
    pub slot: i64,
    pub aux: i32,
    pub tag: ValueTag,
}

/// A typed value bound to a parameter or decoded from a column.
///
/// `String` appears only on the bind path; decoded text arrives as `Bytes`
/// views of the engine's buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Null,
    Int64(i64),
    Float64(f64),
    Bool(bool),
    String(&'a str),
    Bytes(&'a [u8]),
    Time { seconds: i64, nanos: i32 },
}

impl From<i64> for Value<'_> {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value<'_> {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<bool> for Value<'_> {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl<'a> From<&'a str> for Value<'a> {
    fn from(v: &'a str) -> Self {
        Value::String(v)
    }
}

impl<'a> From<&'a [u8]> for Value<'a> {
    fn from(v: &'a [u8]) -> Self {
        Value::Bytes(v)
    }
}

impl RawValue {
    /// The all-zero NULL record.
    pub fn null() -> Self {
        Self {
            slot: 0,
            aux: 0,
            tag: ValueTag::Null,
        }
    }

    /// Encode a typed value into its boundary record.
    ///
    /// For `String` and `Bytes` the record borrows the referenced buffer by
    /// raw pointer; the caller must keep that buffer alive for as long as
    /// the record is in flight.
    pub fn encode(value: &Value<'_>) -> Self {
        match *value {
            Value::Null => Self::null(),
            Value::Int64(v) => Self {
                slot: v,
                aux: 0,
                tag: ValueTag::Int64,
            },
            Value::Float64(v) => Self {
                slot: v.to_bits() as i64,
                aux: 0,
                tag: ValueTag::Float64,
            },
            Value::Bool(v) => Self {
                slot: v as i64,
                aux: 0,
                tag: ValueTag::Bool,
            },
            Value::String(s) => Self {
                slot: s.as_ptr() as i64,
                aux: s.len() as i32,
                tag: ValueTag::String,
            },
            Value::Bytes(b) => Self {
                slot: b.as_ptr() as i64,
                aux: b.len() as i32,
                tag: ValueTag::Bytes,
            },
            Value::Time { seconds, nanos } => Self {
                slot: seconds,
                aux: nanos,
                tag: ValueTag::Time,
            },
        }
    }

    /// Reconstruct the typed value this record encodes.
    ///
    /// # Safety
    ///
    /// For `String` and `Bytes` records the slots must hold a pointer and
    /// length describing a readable buffer that outlives the returned
    /// lifetime `'a`. Records produced by [`RawValue::encode`] or by the
    /// fetch path satisfy this while the source buffer is alive.
    pub unsafe fn decode<'a>(&self) -> Result<Value<'a>, Utf8Error> {
        Ok(match self.tag {
            ValueTag::Null => Value::Null,
            ValueTag::Int64 => Value::Int64(self.slot),
            ValueTag::Float64 => Value::Float64(f64::from_bits(self.slot as u64)),
            ValueTag::Bool => Value::Bool(self.slot != 0),
            ValueTag::String => Value::String(std::str::from_utf8(self.view())?),
            ValueTag::Bytes => Value::Bytes(self.view()),
            ValueTag::Time => Value::Time {
                seconds: self.slot,
                nanos: self.aux,
            },
        })
    }

    /// # Safety
    ///
    /// `slot`/`aux` must describe a readable buffer outliving `'a`.
    unsafe fn view<'a>(&self) -> &'a [u8] {
        if self.slot == 0 || self.aux <= 0 {
            return &[];
        }
        std::slice::from_raw_parts(self.slot as *const u8, self.aux as usize)
    }
}
