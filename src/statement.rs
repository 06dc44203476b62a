//! Prepared statement handle: batched parameter binding, execution with
//! generated-key reporting, and query timeouts.

use tracing::debug;

use crate::codec;
use crate::engine::EnginePrepared;
use crate::error::{EngineError, ErrorChannel, NuoError, Result};
use crate::rows::Rows;
use crate::value::Value;

/// Outcome of a non-query execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecResult {
    /// Rows affected; never negative. The engine's "no rows" sentinel is
    /// normalized to zero.
    pub rows_affected: i64,
    /// The generated key of the affected row, or zero when the statement
    /// produced none (or produced a non-numeric key).
    pub last_insert_id: i64,
}

/// A prepared statement bound to its parent connection's error channel.
///
/// A statement must not outlive the connection that prepared it; closing
/// the connection while statements remain open is a caller contract
/// violation the bridge does not detect.
pub struct Statement {
    prep: Option<Box<dyn EnginePrepared>>,
    parameter_count: usize,
    channel: ErrorChannel,
}

impl std::fmt::Debug for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("parameter_count", &self.parameter_count)
            .field("closed", &self.prep.is_none())
            .finish_non_exhaustive()
    }
}

impl Statement {
    pub(crate) fn new(
        prep: Box<dyn EnginePrepared>,
        parameter_count: usize,
        channel: ErrorChannel,
    ) -> Self {
        Self {
            prep: Some(prep),
            parameter_count,
            channel,
        }
    }

    /// Number of positional parameters the statement expects.
    pub fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    /// Bind a full parameter set in declaration order.
    ///
    /// The arity is checked before the engine sees anything, so a mismatch
    /// never leaves partially bound parameters. An engine failure mid-bind
    /// does leave earlier positions bound; callers recover by closing the
    /// statement. Rebinding invalidates row buffers fetched from an earlier
    /// execution of this statement.
    pub fn bind(&mut self, parameters: &[Value<'_>]) -> Result<()> {
        if parameters.len() != self.parameter_count {
            return Err(self.channel.fail(NuoError::BindArity {
                expected: self.parameter_count,
                actual: parameters.len(),
            }));
        }

        let prep = match self.prep.as_deref_mut() {
            Some(prep) => prep,
            None => return Err(self.channel.fail(NuoError::StatementClosed)),
        };
        for (i, value) in parameters.iter().enumerate() {
            self.channel.trap(codec::bind_param(prep, i + 1, value))?;
        }
        Ok(())
    }

    /// Execute as a non-query, returning affected rows and generated key.
    pub fn execute(&mut self) -> Result<ExecResult> {
        let prep = match self.prep.as_deref_mut() {
            Some(prep) => prep,
            None => return Err(self.channel.fail(NuoError::StatementClosed)),
        };
        self.channel.trap(run_update(prep))
    }

    /// Execute as a query and return a cursor over the rows.
    ///
    /// When execution yields no result set the generated-keys cursor is
    /// surfaced instead, so callers always receive a uniform cursor to
    /// read column metadata and rows from.
    pub fn query(&mut self) -> Result<Rows> {
        let prep = match self.prep.as_deref_mut() {
            Some(prep) => prep,
            None => return Err(self.channel.fail(NuoError::StatementClosed)),
        };

        let has_results = self.channel.trap(prep.execute())?;
        let cursor = if has_results {
            self.channel.trap(prep.result_set())?
        } else {
            self.channel.trap(prep.generated_keys())?
        };
        debug!(columns = cursor.column_count(), "query produced cursor");
        Ok(Rows::new(cursor, self.channel.clone()))
    }

    /// Bound the wall-clock time of subsequent executions, in microseconds.
    /// Expiry surfaces as a distinct timeout error.
    pub fn set_timeout(&mut self, micros: i64) -> Result<()> {
        let prep = match self.prep.as_deref_mut() {
            Some(prep) => prep,
            None => return Err(self.channel.fail(NuoError::StatementClosed)),
        };
        self.channel.trap(prep.set_query_timeout_micros(micros))
    }

    /// Close the statement. Safe to call repeatedly.
    pub fn close(&mut self) -> Result<()> {
        match self.prep.take() {
            Some(mut prep) => self.channel.trap(prep.close()),
            None => Ok(()),
        }
    }
}

impl Drop for Statement {
    fn drop(&mut self) {
        if let Some(mut prep) = self.prep.take() {
            let _ = prep.close();
        }
    }
}

/// Run an execution and collect its update count and generated key.
///
/// The generated-keys cursor is only consulted when rows were affected, and
/// is always closed before the result is returned.
pub(crate) fn run_update(
    prep: &mut dyn EnginePrepared,
) -> std::result::Result<ExecResult, EngineError> {
    prep.execute()?;
    let rows_affected = prep.update_count()?.max(0);

    let mut last_insert_id = 0;
    if rows_affected > 0 {
        let mut keys = prep.generated_keys()?;
        let key = codec::generated_key(keys.as_mut());
        let closed = keys.close();
        last_insert_id = key?;
        closed?;
    }

    Ok(ExecResult {
        rows_affected,
        last_insert_id,
    })
}

/// Whether `sql` starts with a DML keyword. Used for diagnostics; DDL and
/// other statement forms legitimately report zero affected rows.
pub fn is_dml(sql: &str) -> bool {
    let keyword: String = sql
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .flat_map(|c| c.to_uppercase())
        .collect();
    matches!(
        keyword.as_str(),
        "DELETE" | "EXPLAIN" | "INSERT" | "REPLACE" | "SELECT" | "TRUNCATE" | "UPDATE"
    )
}
