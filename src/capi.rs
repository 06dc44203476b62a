//! Exported C-ABI surface.
//!
//! Every entry point returns 0 on success or the engine's native SQL code
//! on failure; the message behind a nonzero status is retrievable through
//! [`nuodb_error`] until the next failure on the same connection. Handles
//! are opaque boxed structs; close functions take a pointer to the handle
//! pointer, free the handle, and null the pointer out, so double closes
//! are harmless.
//!
//! `nuodb_init` is not exported here directly: it is emitted by the
//! [`export_engine!`](crate::export_engine) macro, monomorphized over the
//! linking crate's [`Engine`] implementation. Everything else is
//! engine-agnostic.
//!
//! No panic crosses the boundary; each entry point catches unwinds and
//! converts them to a status plus stored message.

use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::connection::Connection;
use crate::engine::Engine;
use crate::error::{ErrorChannel, NuoError, Result, SqlCode};
use crate::params::ConnectOptions;
use crate::rows::Rows;
use crate::statement::Statement;
use crate::value::RawValue;

/// Opaque connection handle.
#[allow(non_camel_case_types)]
pub struct nuodb {
    conn: Connection,
}

/// Opaque prepared statement handle.
#[allow(non_camel_case_types)]
pub struct nuodb_statement {
    stmt: Statement,
    channel: ErrorChannel,
}

/// Opaque result set handle.
#[allow(non_camel_case_types)]
pub struct nuodb_resultset {
    rows: Rows,
    channel: ErrorChannel,
}

/// The boundary value record, re-exported under its C name.
#[allow(non_camel_case_types)]
pub type nuodb_value = RawValue;

// Returned by nuodb_error for a null handle.
static NULL_DB_MESSAGE: &[u8] = b"null db\0";

fn status(result: Result<()>) -> c_int {
    match result {
        Ok(()) => 0,
        Err(err) => err.sql_code().0,
    }
}

/// Run a boundary operation, converting panics into a stored failure.
fn guard<F: FnOnce() -> Result<()>>(channel: &ErrorChannel, f: F) -> c_int {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => status(result),
        Err(_) => {
            let err = NuoError::Engine {
                code: SqlCode::UNKNOWN_ERROR,
                message: "internal panic".into(),
            };
            channel.record(&err);
            err.sql_code().0
        }
    }
}

unsafe fn text<'a>(ptr: *const c_char) -> Option<std::borrow::Cow<'a, str>> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy())
    }
}

/// Allocate a connection handle over `engine` and store it in `*db`.
///
/// Called by the `nuodb_init` symbol that [`export_engine!`] emits.
///
/// # Safety
///
/// `db` must be a valid pointer to writable handle-pointer storage.
///
/// [`export_engine!`]: crate::export_engine
pub unsafe fn init_with(db: *mut *mut nuodb, engine: Box<dyn Engine>) {
    if db.is_null() {
        return;
    }
    let handle = Box::new(nuodb {
        conn: Connection::new(engine),
    });
    *db = Box::into_raw(handle);
}

/// Message of the most recent failure on this connection's handle graph.
///
/// Valid for a null handle, for which it reports `"null db"`. The pointer
/// stays valid until the next failure is recorded.
///
/// # Safety
///
/// `db` must be null or a handle obtained from `nuodb_init`.
#[no_mangle]
pub unsafe extern "C" fn nuodb_error(db: *const nuodb) -> *const c_char {
    match db.as_ref() {
        Some(handle) => handle.conn.error_channel().message_ptr(),
        None => NULL_DB_MESSAGE.as_ptr() as *const c_char,
    }
}

/// Open the connection. A previously open connection is closed first.
///
/// `schema` and `timezone` may be null.
///
/// # Safety
///
/// `db` must be a handle from `nuodb_init`; string arguments must be null
/// or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn nuodb_open(
    db: *mut nuodb,
    database: *const c_char,
    username: *const c_char,
    password: *const c_char,
    schema: *const c_char,
    timezone: *const c_char,
) -> c_int {
    let handle = match db.as_mut() {
        Some(handle) => handle,
        None => return SqlCode::CONNECTION_ERROR.0,
    };
    let channel = handle.conn.error_channel();
    guard(&channel, || {
        let mut options = ConnectOptions::new(
            text(database).unwrap_or_default(),
            text(username).unwrap_or_default(),
            text(password).unwrap_or_default(),
        );
        if let Some(schema) = text(schema) {
            options = options.with_schema(schema);
        }
        if let Some(timezone) = text(timezone) {
            options = options.with_timezone(timezone);
        }
        handle.conn.open(&options)
    })
}

/// Close and free the connection handle, nulling `*db`.
///
/// Null-tolerant and idempotent.
///
/// # Safety
///
/// `db` must be null or point to null or a handle from `nuodb_init`.
#[no_mangle]
pub unsafe extern "C" fn nuodb_close(db: *mut *mut nuodb) -> c_int {
    if db.is_null() || (*db).is_null() {
        return 0;
    }
    let mut handle = Box::from_raw(*db);
    *db = std::ptr::null_mut();
    let channel = handle.conn.error_channel();
    guard(&channel, || handle.conn.close())
}

/// Read the connection's autocommit flag into `*state` (0 or 1).
///
/// # Safety
///
/// `db` must be null or a handle from `nuodb_init`; `state` must be
/// writable.
#[no_mangle]
pub unsafe extern "C" fn nuodb_autocommit(db: *mut nuodb, state: *mut c_int) -> c_int {
    let handle = match db.as_mut() {
        Some(handle) => handle,
        None => return SqlCode::CONNECTION_ERROR.0,
    };
    let channel = handle.conn.error_channel();
    guard(&channel, || {
        let enabled = handle.conn.autocommit()?;
        if !state.is_null() {
            *state = enabled as c_int;
        }
        Ok(())
    })
}

/// Set the connection's autocommit flag.
///
/// # Safety
///
/// `db` must be null or a handle from `nuodb_init`.
#[no_mangle]
pub unsafe extern "C" fn nuodb_autocommit_set(db: *mut nuodb, state: c_int) -> c_int {
    let handle = match db.as_mut() {
        Some(handle) => handle,
        None => return SqlCode::CONNECTION_ERROR.0,
    };
    let channel = handle.conn.error_channel();
    guard(&channel, || handle.conn.set_autocommit(state != 0))
}

/// # Safety
///
/// `db` must be null or a handle from `nuodb_init`.
#[no_mangle]
pub unsafe extern "C" fn nuodb_commit(db: *mut nuodb) -> c_int {
    let handle = match db.as_mut() {
        Some(handle) => handle,
        None => return SqlCode::CONNECTION_ERROR.0,
    };
    let channel = handle.conn.error_channel();
    guard(&channel, || handle.conn.commit())
}

/// # Safety
///
/// `db` must be null or a handle from `nuodb_init`.
#[no_mangle]
pub unsafe extern "C" fn nuodb_rollback(db: *mut nuodb) -> c_int {
    let handle = match db.as_mut() {
        Some(handle) => handle,
        None => return SqlCode::CONNECTION_ERROR.0,
    };
    let channel = handle.conn.error_channel();
    guard(&channel, || handle.conn.rollback())
}

/// Run `sql` once without parameters, reporting affected rows and the
/// generated key.
///
/// # Safety
///
/// `db` must be null or a handle from `nuodb_init`; `sql` must be
/// NUL-terminated; out-pointers must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn nuodb_execute(
    db: *mut nuodb,
    sql: *const c_char,
    rows_affected: *mut i64,
    last_insert_id: *mut i64,
) -> c_int {
    let handle = match db.as_mut() {
        Some(handle) => handle,
        None => return SqlCode::CONNECTION_ERROR.0,
    };
    let channel = handle.conn.error_channel();
    guard(&channel, || {
        let sql = text(sql).unwrap_or_default();
        let result = handle.conn.execute(&sql)?;
        if !rows_affected.is_null() {
            *rows_affected = result.rows_affected;
        }
        if !last_insert_id.is_null() {
            *last_insert_id = result.last_insert_id;
        }
        Ok(())
    })
}

/// Prepare `sql`, storing the new statement handle in `*st` and its
/// parameter count in `*parameter_count`.
///
/// # Safety
///
/// `db` must be null or a handle from `nuodb_init`; `sql` must be
/// NUL-terminated; `st` must be writable; `parameter_count` must be null
/// or writable.
#[no_mangle]
pub unsafe extern "C" fn nuodb_statement_prepare(
    db: *mut nuodb,
    sql: *const c_char,
    st: *mut *mut nuodb_statement,
    parameter_count: *mut c_int,
) -> c_int {
    let handle = match db.as_mut() {
        Some(handle) => handle,
        None => return SqlCode::CONNECTION_ERROR.0,
    };
    let channel = handle.conn.error_channel();
    guard(&channel, || {
        let sql = text(sql).unwrap_or_default();
        let stmt = handle.conn.prepare(&sql)?;
        if !parameter_count.is_null() {
            *parameter_count = stmt.parameter_count() as c_int;
        }
        let boxed = Box::new(nuodb_statement {
            stmt,
            channel: handle.conn.error_channel(),
        });
        *st = Box::into_raw(boxed);
        Ok(())
    })
}

/// Bind a full parameter set from a contiguous array of
/// `parameter_count` records.
///
/// # Safety
///
/// `st` must be null or a handle from `nuodb_statement_prepare`;
/// `parameters` must point to as many records as the statement has
/// parameters, and any pointer-carrying records must reference buffers
/// that stay alive through the call.
#[no_mangle]
pub unsafe extern "C" fn nuodb_statement_bind(
    st: *mut nuodb_statement,
    parameters: *const nuodb_value,
) -> c_int {
    let handle = match st.as_mut() {
        Some(handle) => handle,
        None => return SqlCode::CONNECTION_ERROR.0,
    };
    let channel = handle.channel.clone();
    guard(&channel, || {
        let count = handle.stmt.parameter_count();
        let raw = if parameters.is_null() || count == 0 {
            &[]
        } else {
            std::slice::from_raw_parts(parameters, count)
        };
        let mut values = Vec::with_capacity(raw.len());
        for (i, record) in raw.iter().enumerate() {
            let value = record
                .decode()
                .map_err(|_| channel.fail(NuoError::InvalidUtf8 { index: i }))?;
            values.push(value);
        }
        handle.stmt.bind(&values)
    })
}

/// Execute as a non-query, reporting affected rows and the generated key.
///
/// # Safety
///
/// `st` must be null or a handle from `nuodb_statement_prepare`;
/// out-pointers must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn nuodb_statement_execute(
    st: *mut nuodb_statement,
    rows_affected: *mut i64,
    last_insert_id: *mut i64,
) -> c_int {
    let handle = match st.as_mut() {
        Some(handle) => handle,
        None => return SqlCode::CONNECTION_ERROR.0,
    };
    let channel = handle.channel.clone();
    guard(&channel, || {
        let result = handle.stmt.execute()?;
        if !rows_affected.is_null() {
            *rows_affected = result.rows_affected;
        }
        if !last_insert_id.is_null() {
            *last_insert_id = result.last_insert_id;
        }
        Ok(())
    })
}

/// Execute as a query, storing the result set handle in `*rs` and its
/// column count in `*column_count`.
///
/// # Safety
///
/// `st` must be null or a handle from `nuodb_statement_prepare`; `rs`
/// must be writable; `column_count` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn nuodb_statement_query(
    st: *mut nuodb_statement,
    rs: *mut *mut nuodb_resultset,
    column_count: *mut c_int,
) -> c_int {
    let handle = match st.as_mut() {
        Some(handle) => handle,
        None => return SqlCode::CONNECTION_ERROR.0,
    };
    let channel = handle.channel.clone();
    guard(&channel, || {
        let rows = handle.stmt.query()?;
        if !column_count.is_null() {
            *column_count = rows.column_count() as c_int;
        }
        let boxed = Box::new(nuodb_resultset {
            rows,
            channel: handle.channel.clone(),
        });
        *rs = Box::into_raw(boxed);
        Ok(())
    })
}

/// Bound subsequent executions to `micros` microseconds of wall-clock
/// time.
///
/// # Safety
///
/// `st` must be null or a handle from `nuodb_statement_prepare`.
#[no_mangle]
pub unsafe extern "C" fn nuodb_statement_set_query_micros(
    st: *mut nuodb_statement,
    micros: i64,
) -> c_int {
    let handle = match st.as_mut() {
        Some(handle) => handle,
        None => return SqlCode::CONNECTION_ERROR.0,
    };
    let channel = handle.channel.clone();
    guard(&channel, || handle.stmt.set_timeout(micros))
}

/// Close and free the statement handle, nulling `*st`.
///
/// Null-tolerant and idempotent.
///
/// # Safety
///
/// `st` must be null or point to null or a handle from
/// `nuodb_statement_prepare`.
#[no_mangle]
pub unsafe extern "C" fn nuodb_statement_close(st: *mut *mut nuodb_statement) -> c_int {
    if st.is_null() || (*st).is_null() {
        return 0;
    }
    let mut handle = Box::from_raw(*st);
    *st = std::ptr::null_mut();
    let channel = handle.channel.clone();
    guard(&channel, || handle.stmt.close())
}

/// Fill `names` with byte views of the column labels.
///
/// # Safety
///
/// `rs` must be null or a handle from `nuodb_statement_query`; `names`
/// must point to one record per column.
#[no_mangle]
pub unsafe extern "C" fn nuodb_resultset_column_names(
    rs: *mut nuodb_resultset,
    names: *mut nuodb_value,
) -> c_int {
    let handle = match rs.as_mut() {
        Some(handle) => handle,
        None => return SqlCode::CONNECTION_ERROR.0,
    };
    let channel = handle.channel.clone();
    guard(&channel, || {
        let count = handle.rows.column_count();
        let out = if names.is_null() || count == 0 {
            &mut []
        } else {
            std::slice::from_raw_parts_mut(names, count)
        };
        handle.rows.column_names_into(out)
    })
}

/// Fetch the next row into `values`, a contiguous array of one record per
/// column. `*has_values` is set to 1 while rows remain and 0 once the
/// cursor is exhausted, at which point `values` is zeroed.
///
/// # Safety
///
/// `rs` must be null or a handle from `nuodb_statement_query`;
/// `has_values` must be writable; `values` must point to one record per
/// column.
#[no_mangle]
pub unsafe extern "C" fn nuodb_resultset_next(
    rs: *mut nuodb_resultset,
    has_values: *mut c_int,
    values: *mut nuodb_value,
) -> c_int {
    let handle = match rs.as_mut() {
        Some(handle) => handle,
        None => return SqlCode::CONNECTION_ERROR.0,
    };
    let channel = handle.channel.clone();
    guard(&channel, || {
        let count = handle.rows.column_count();
        let out = if values.is_null() || count == 0 {
            &mut []
        } else {
            std::slice::from_raw_parts_mut(values, count)
        };
        let fetched = handle.rows.next_into(out)?;
        if !has_values.is_null() {
            *has_values = fetched as c_int;
        }
        Ok(())
    })
}

/// Close and free the result set handle, nulling `*rs`.
///
/// Null-tolerant and idempotent.
///
/// # Safety
///
/// `rs` must be null or point to null or a handle from
/// `nuodb_statement_query`.
#[no_mangle]
pub unsafe extern "C" fn nuodb_resultset_close(rs: *mut *mut nuodb_resultset) -> c_int {
    if rs.is_null() || (*rs).is_null() {
        return 0;
    }
    let mut handle = Box::from_raw(*rs);
    *rs = std::ptr::null_mut();
    let channel = handle.channel.clone();
    guard(&channel, || handle.rows.close())
}

/// Emit the `nuodb_init` entry point over an [`Engine`] implementation.
///
/// The implementation must be `Default`; the exported symbol allocates a
/// fresh connection handle backed by a default-constructed engine:
///
/// ```ignore
/// nuobridge::export_engine!(MyEngine);
/// ```
///
/// [`Engine`]: crate::engine::Engine
#[macro_export]
macro_rules! export_engine {
    ($engine:ty) => {
        /// Allocate a connection handle and store it in `*db`.
        ///
        /// # Safety
        ///
        /// `db` must be a valid pointer to writable handle-pointer
        /// storage.
        #[no_mangle]
        pub unsafe extern "C" fn nuodb_init(db: *mut *mut $crate::capi::nuodb) {
            $crate::capi::init_with(db, Box::new(<$engine as Default>::default()));
        }
    };
}
