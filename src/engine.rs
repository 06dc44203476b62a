//! Engine abstraction: the seam between the bridge and the database client.
//!
//! The bridge never talks to the network itself. Everything it needs from the
//! NuoDB client library is expressed through these traits, so the core can be
//! exercised against mocks and in-memory fakes, and a real client binding
//! plugs in at link time through `export_engine!`.
//!
//! All column and parameter indices on these traits are 1-based, matching the
//! client library's convention. The handle types translate from the 0-based
//! Rust surface.

use crate::error::EngineError;
use crate::params::ConnectOptions;

/// Declared SQL type of a result column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Null,
    Bit,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Double,
    Char,
    Varchar,
    LongVarchar,
    Date,
    Time,
    Timestamp,
    Blob,
    Clob,
    Numeric,
    Decimal,
    Boolean,
    Other,
}

impl SqlType {
    /// Whether a generated-key column of this type can be read as an i64.
    pub fn is_numeric_like(&self) -> bool {
        matches!(
            self,
            SqlType::TinyInt
                | SqlType::SmallInt
                | SqlType::Integer
                | SqlType::BigInt
                | SqlType::Float
                | SqlType::Double
                | SqlType::Numeric
                | SqlType::Decimal
        )
    }
}

/// Factory for engine connections.
#[cfg_attr(test, mockall::automock)]
pub trait Engine: Send {
    /// Open a connection to the database named in `options`.
    ///
    /// On failure the implementation must release anything it allocated;
    /// the bridge will not call `close` on a connection it never received.
    fn connect(&self, options: &ConnectOptions) -> Result<Box<dyn EngineConnection>, EngineError>;
}

/// A live database connection.
#[cfg_attr(test, mockall::automock)]
pub trait EngineConnection: Send {
    fn autocommit(&mut self) -> Result<bool, EngineError>;
    fn set_autocommit(&mut self, enabled: bool) -> Result<(), EngineError>;
    fn commit(&mut self) -> Result<(), EngineError>;
    fn rollback(&mut self) -> Result<(), EngineError>;

    /// Prepare `sql`, requesting generated-key reporting.
    ///
    /// On failure the implementation must release any partially built
    /// statement before returning.
    fn prepare(&mut self, sql: &str) -> Result<Box<dyn EnginePrepared>, EngineError>;

    fn close(&mut self) -> Result<(), EngineError>;
}

/// A prepared statement with positional parameters.
#[cfg_attr(test, mockall::automock)]
pub trait EnginePrepared: Send {
    fn parameter_count(&self) -> usize;

    fn set_null(&mut self, index: usize) -> Result<(), EngineError>;
    fn set_i64(&mut self, index: usize, value: i64) -> Result<(), EngineError>;
    fn set_f64(&mut self, index: usize, value: f64) -> Result<(), EngineError>;
    fn set_bool(&mut self, index: usize, value: bool) -> Result<(), EngineError>;
    fn set_string(&mut self, index: usize, value: &str) -> Result<(), EngineError>;
    fn set_bytes(&mut self, index: usize, value: &[u8]) -> Result<(), EngineError>;
    fn set_timestamp(&mut self, index: usize, seconds: i64, nanos: i32)
        -> Result<(), EngineError>;

    /// Bound the wall-clock time of subsequent executions, in microseconds.
    fn set_query_timeout_micros(&mut self, micros: i64) -> Result<(), EngineError>;

    /// Run the statement. Returns true when a result set is available.
    fn execute(&mut self) -> Result<bool, EngineError>;

    /// Rows affected by the last execution. May return the engine's -1
    /// sentinel when no rows matched.
    fn update_count(&mut self) -> Result<i64, EngineError>;

    fn result_set(&mut self) -> Result<Box<dyn EngineCursor>, EngineError>;
    fn generated_keys(&mut self) -> Result<Box<dyn EngineCursor>, EngineError>;

    fn close(&mut self) -> Result<(), EngineError>;
}

/// A forward-only cursor over a result set or generated-keys set.
///
/// Buffers returned by `column_label`, `get_string` and `get_bytes` stay
/// valid until the next cursor call or `close`, whichever comes first.
pub trait EngineCursor: Send {
    fn column_count(&self) -> usize;
    fn column_label(&self, column: usize) -> &[u8];
    fn column_type(&self, column: usize) -> SqlType;
    fn scale(&self, column: usize) -> i32;

    /// Advance to the next row. Returns false once the cursor is exhausted.
    fn next(&mut self) -> Result<bool, EngineError>;

    fn get_i64(&mut self, column: usize) -> Result<i64, EngineError>;
    fn get_f64(&mut self, column: usize) -> Result<f64, EngineError>;
    fn get_bool(&mut self, column: usize) -> Result<bool, EngineError>;
    fn get_string(&mut self, column: usize) -> Result<Option<&[u8]>, EngineError>;
    fn get_bytes(&mut self, column: usize) -> Result<Option<&[u8]>, EngineError>;
    fn get_timestamp(&mut self, column: usize) -> Result<Option<(i64, i32)>, EngineError>;

    /// Whether the most recent scalar `get_*` read a SQL NULL. The
    /// buffer-returning getters report NULL as `None` instead.
    fn was_null(&self) -> bool;

    fn close(&mut self) -> Result<(), EngineError>;
}
