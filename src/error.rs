//! Error types and the per-connection error channel.
//!
//! Every boundary operation reports failures twice: as a `Result` for Rust
//! callers and as a SQL code plus message retained on the connection's
//! [`ErrorChannel`], which is what the C surface exposes through
//! `nuodb_error`.

use std::ffi::CString;
use std::fmt;
use std::os::raw::c_char;
use std::sync::{Arc, Mutex};

use thiserror::Error;

/// A SQL error code as defined by the engine.
///
/// Codes are negative integers passed through from the engine unmodified;
/// zero means success. See the NuoDB SQL error code reference for the
/// canonical list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SqlCode(pub i32);

impl SqlCode {
    pub const SYNTAX_ERROR: SqlCode = SqlCode(-1);
    pub const CONVERSION_ERROR: SqlCode = SqlCode(-8);
    pub const CONNECTION_ERROR: SqlCode = SqlCode(-10);
    pub const APPLICATION_ERROR: SqlCode = SqlCode(-12);
    pub const INVALID_UTF8: SqlCode = SqlCode(-44);
    pub const INVALID_STATEMENT: SqlCode = SqlCode(-49);
    pub const OPERATION_TIMEOUT: SqlCode = SqlCode(-59);
    pub const UNKNOWN_ERROR: SqlCode = SqlCode(-63);

    /// Short name for the code, or `"UNKNOWN_ERROR"` for anything not in
    /// the engine's table.
    pub fn name(&self) -> &'static str {
        match self.0 {
            -1 => "SYNTAX_ERROR",
            -2 => "FEATURE_NOT_YET_IMPLEMENTED",
            -3 => "BUG_CHECK",
            -4 => "COMPILE_ERROR",
            -5 => "RUNTIME_ERROR",
            -6 => "OCS_ERROR",
            -7 => "NETWORK_ERROR",
            -8 => "CONVERSION_ERROR",
            -9 => "TRUNCATION_ERROR",
            -10 => "CONNECTION_ERROR",
            -11 => "DDL_ERROR",
            -12 => "APPLICATION_ERROR",
            -13 => "SECURITY_ERROR",
            -14 => "DATABASE_CORRUPTION",
            -15 => "VERSION_ERROR",
            -16 => "LICENSE_ERROR",
            -17 => "INTERNAL_ERROR",
            -18 => "DEBUG_ERROR",
            -19 => "LOST_BLOB",
            -20 => "INCONSISTENT_BLOB",
            -21 => "DELETED_BLOB",
            -22 => "LOG_ERROR",
            -23 => "DATABASE_DAMAGED",
            -24 => "UPDATE_CONFLICT",
            -25 => "NO_SUCH_TABLE",
            -26 => "INDEX_OVERFLOW",
            -27 => "UNIQUE_DUPLICATE",
            -29 => "DEADLOCK",
            -30 => "OUT_OF_MEMORY_ERROR",
            -31 => "OUT_OF_RECORD_MEMORY_ERROR",
            -32 => "LOCK_TIMEOUT",
            -36 => "PLATFORM_ERROR",
            -37 => "NO_SCHEMA",
            -38 => "CONFIGURATION_ERROR",
            -39 => "READ_ONLY_ERROR",
            -40 => "NO_GENERATED_KEYS",
            -41 => "THROWN_EXCEPTION",
            -42 => "INVALID_TRANSACTION_ISOLATION",
            -43 => "UNSUPPORTED_TRANSACTION_ISOLATION",
            -44 => "INVALID_UTF8",
            -45 => "CONSTRAINT_ERROR",
            -46 => "UPDATE_ERROR",
            -47 => "I18N_ERROR",
            -48 => "OPERATION_KILLED",
            -49 => "INVALID_STATEMENT",
            -50 => "IS_SHUTDOWN",
            -51 => "IN_QUOTED_STRING",
            -52 => "BATCH_UPDATE_ERROR",
            -53 => "JAVA_ERROR",
            -54 => "INVALID_FIELD",
            -55 => "INVALID_INDEX_NULL",
            -56 => "INVALID_OPERATION",
            -57 => "INVALID_STATISTICS",
            -58 => "INVALID_GENERATOR",
            -59 => "OPERATION_TIMEOUT",
            -60 => "NO_SUCH_INDEX",
            -61 => "NO_SUCH_SEQUENCE",
            -62 => "XAER_PROTO",
            _ => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for SqlCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A failure raised by the underlying engine.
///
/// Engine implementations return this from every fallible trait method; the
/// bridge never lets one escape a boundary call without converting it to a
/// status code and storing the message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("engine error {code}: {message}")]
pub struct EngineError {
    /// The engine's native SQL code.
    pub code: SqlCode,
    /// Human-readable message from the engine.
    pub message: String,
}

impl EngineError {
    /// Create an engine error from a raw code and message.
    pub fn new(code: SqlCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Top-level error type for all bridge operations.
#[derive(Error, Debug)]
pub enum NuoError {
    /// The engine rejected or failed an operation.
    #[error("engine error {code}: {message}")]
    Engine {
        /// The engine's native SQL code, passed through unmodified.
        code: SqlCode,
        /// Human-readable message from the engine.
        message: String,
    },

    /// Statement execution exceeded its configured timeout.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// The connection has not been opened or has been closed.
    #[error("connection is not open")]
    NotOpen,

    /// The statement has been closed.
    #[error("statement is closed")]
    StatementClosed,

    /// The result set has been closed.
    #[error("result set is closed")]
    RowsClosed,

    /// Parameter list length does not match the statement's parameter count.
    #[error("parameter count mismatch: statement expects {expected}, got {actual}")]
    BindArity { expected: usize, actual: usize },

    /// A caller-supplied buffer has the wrong length for a batched transfer.
    #[error("buffer length mismatch: expected {expected}, got {actual}")]
    BufferSize { expected: usize, actual: usize },

    /// Column index out of range for the result set.
    #[error("column index {index} out of range for {count} columns")]
    ColumnIndex { index: usize, count: usize },

    /// A string parameter carried bytes that are not valid UTF-8.
    #[error("invalid UTF-8 in string parameter {index}")]
    InvalidUtf8 { index: usize },

    /// The connection string could not be parsed.
    #[error("invalid dsn: {0}")]
    InvalidDsn(String),
}

impl NuoError {
    /// The SQL code reported for this error on the C surface.
    pub fn sql_code(&self) -> SqlCode {
        match self {
            NuoError::Engine { code, .. } => *code,
            NuoError::Timeout(_) => SqlCode::OPERATION_TIMEOUT,
            NuoError::NotOpen => SqlCode::CONNECTION_ERROR,
            NuoError::StatementClosed | NuoError::RowsClosed => SqlCode::INVALID_STATEMENT,
            NuoError::BindArity { .. }
            | NuoError::BufferSize { .. }
            | NuoError::ColumnIndex { .. } => SqlCode::APPLICATION_ERROR,
            NuoError::InvalidUtf8 { .. } => SqlCode::INVALID_UTF8,
            NuoError::InvalidDsn(_) => SqlCode::CONNECTION_ERROR,
        }
    }
}

impl From<EngineError> for NuoError {
    fn from(err: EngineError) -> Self {
        if err.code == SqlCode::OPERATION_TIMEOUT {
            NuoError::Timeout(err.message)
        } else {
            NuoError::Engine {
                code: err.code,
                message: err.message,
            }
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, NuoError>;

struct LastError {
    code: SqlCode,
    // Kept NUL-terminated so the C surface can hand out a stable pointer.
    message: CString,
}

/// Retains the most recent failure's code and message for a connection.
///
/// Statements and result sets derived from a connection share its channel,
/// so a failure anywhere in the handle graph is retrievable through the
/// connection's error accessor. Each new failure overwrites the previous
/// one; the stored message is only meaningful immediately after a nonzero
/// status.
#[derive(Clone)]
pub struct ErrorChannel {
    inner: Arc<Mutex<LastError>>,
}

impl Default for ErrorChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorChannel {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(LastError {
                code: SqlCode(0),
                message: CString::default(),
            })),
        }
    }

    /// Record a failure, replacing any previously stored one.
    pub fn record(&self, err: &NuoError) {
        let sanitized = err.to_string().replace('\0', " ");
        let mut last = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        last.code = err.sql_code();
        last.message = CString::new(sanitized).unwrap_or_default();
    }

    /// Record `err` and hand it back, for use in `return Err(...)` positions.
    pub(crate) fn fail(&self, err: NuoError) -> NuoError {
        self.record(&err);
        err
    }

    /// Convert an engine result, recording the failure if there is one.
    pub(crate) fn trap<T>(&self, result: std::result::Result<T, EngineError>) -> Result<T> {
        result.map_err(|e| self.fail(NuoError::from(e)))
    }

    /// The SQL code of the most recent failure, or zero.
    pub fn code(&self) -> SqlCode {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).code
    }

    /// The message of the most recent failure, or an empty string.
    pub fn message(&self) -> String {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .message
            .to_string_lossy()
            .into_owned()
    }

    /// Raw pointer to the stored NUL-terminated message.
    ///
    /// The pointer stays valid until the next failure is recorded on this
    /// channel, matching the retention contract of the C error accessor.
    pub fn message_ptr(&self) -> *const c_char {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .message
            .as_ptr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_code_names() {
        assert_eq!(SqlCode(-1).name(), "SYNTAX_ERROR");
        assert_eq!(SqlCode(-59).name(), "OPERATION_TIMEOUT");
        assert_eq!(SqlCode(0).name(), "UNKNOWN_ERROR");
        assert_eq!(SqlCode(1000).name(), "UNKNOWN_ERROR");
    }

    #[test]
    fn engine_error_display() {
        let err = EngineError::new(SqlCode::SYNTAX_ERROR, "expected SELECT");
        assert_eq!(err.to_string(), "engine error -1: expected SELECT");
    }

    #[test]
    fn timeout_code_maps_to_distinct_variant() {
        let err = NuoError::from(EngineError::new(
            SqlCode::OPERATION_TIMEOUT,
            "query exceeded limit",
        ));
        assert!(matches!(err, NuoError::Timeout(_)));
        assert_eq!(err.sql_code(), SqlCode::OPERATION_TIMEOUT);
    }

    #[test]
    fn other_engine_codes_pass_through() {
        let err = NuoError::from(EngineError::new(SqlCode(-27), "duplicate value"));
        assert_eq!(err.sql_code(), SqlCode(-27));
        assert_eq!(err.sql_code().name(), "UNIQUE_DUPLICATE");
    }

    #[test]
    fn channel_retains_last_failure() {
        let channel = ErrorChannel::new();
        assert_eq!(channel.code(), SqlCode(0));
        assert_eq!(channel.message(), "");

        channel.record(&NuoError::Engine {
            code: SqlCode::SYNTAX_ERROR,
            message: "first".into(),
        });
        assert_eq!(channel.code(), SqlCode::SYNTAX_ERROR);
        assert!(channel.message().contains("first"));

        channel.record(&NuoError::NotOpen);
        assert_eq!(channel.code(), SqlCode::CONNECTION_ERROR);
        assert!(channel.message().contains("not open"));
    }

    #[test]
    fn channel_is_shared_between_clones() {
        let channel = ErrorChannel::new();
        let clone = channel.clone();
        clone.record(&NuoError::StatementClosed);
        assert_eq!(channel.code(), SqlCode::INVALID_STATEMENT);
    }

    #[test]
    fn channel_sanitizes_interior_nuls() {
        let channel = ErrorChannel::new();
        channel.record(&NuoError::Engine {
            code: SqlCode::UNKNOWN_ERROR,
            message: "bad\0byte".into(),
        });
        assert!(channel.message().contains("bad byte"));
    }
}
