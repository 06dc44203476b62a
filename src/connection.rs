//! Connection handle: open/close lifecycle, transaction control, one-shot
//! execution and statement preparation.

use tracing::{debug, warn};

use crate::engine::{Engine, EngineConnection};
use crate::error::{ErrorChannel, NuoError, Result};
use crate::params::ConnectOptions;
use crate::statement::{self, ExecResult, Statement};

/// A database connection backed by an [`Engine`] implementation.
///
/// The handle starts unopened; every operation other than [`open`] fails
/// with a not-open error until a connection is established. Failures at any
/// point are retained on the connection's [`ErrorChannel`], which statements
/// and result sets derived from this connection share.
///
/// [`open`]: Connection::open
pub struct Connection {
    engine: Box<dyn Engine>,
    conn: Option<Box<dyn EngineConnection>>,
    channel: ErrorChannel,
}

impl Connection {
    pub fn new(engine: Box<dyn Engine>) -> Self {
        Self {
            engine,
            conn: None,
            channel: ErrorChannel::new(),
        }
    }

    /// The shared error channel for this connection's handle graph.
    pub fn error_channel(&self) -> ErrorChannel {
        self.channel.clone()
    }

    /// Open a connection, closing any previously open one first.
    ///
    /// Autocommit is forced on immediately after connecting, so a fresh
    /// connection always starts in autocommit mode regardless of engine
    /// defaults. If that step fails the partial connection is closed and
    /// the handle stays unopened.
    pub fn open(&mut self, options: &ConnectOptions) -> Result<()> {
        if let Some(mut old) = self.conn.take() {
            if let Err(err) = old.close() {
                warn!(error = %err, "failed to close previous connection");
            }
        }

        let mut conn = self.channel.trap(self.engine.connect(options))?;
        if let Err(err) = conn.set_autocommit(true) {
            let _ = conn.close();
            return Err(self.channel.fail(NuoError::from(err)));
        }

        debug!(database = %options.database, "connection opened");
        self.conn = Some(conn);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Close the connection. Safe to call repeatedly; closing an already
    /// closed handle succeeds.
    ///
    /// Statements and result sets derived from this connection must be
    /// closed first; the bridge does not track them.
    pub fn close(&mut self) -> Result<()> {
        match self.conn.take() {
            Some(mut conn) => {
                let result = self.channel.trap(conn.close());
                debug!("connection closed");
                result
            }
            None => Ok(()),
        }
    }

    pub fn autocommit(&mut self) -> Result<bool> {
        match self.conn.as_deref_mut() {
            Some(conn) => self.channel.trap(conn.autocommit()),
            None => Err(self.channel.fail(NuoError::NotOpen)),
        }
    }

    pub fn set_autocommit(&mut self, enabled: bool) -> Result<()> {
        match self.conn.as_deref_mut() {
            Some(conn) => self.channel.trap(conn.set_autocommit(enabled)),
            None => Err(self.channel.fail(NuoError::NotOpen)),
        }
    }

    pub fn commit(&mut self) -> Result<()> {
        match self.conn.as_deref_mut() {
            Some(conn) => self.channel.trap(conn.commit()),
            None => Err(self.channel.fail(NuoError::NotOpen)),
        }
    }

    pub fn rollback(&mut self) -> Result<()> {
        match self.conn.as_deref_mut() {
            Some(conn) => self.channel.trap(conn.rollback()),
            None => Err(self.channel.fail(NuoError::NotOpen)),
        }
    }

    /// Prepare `sql` and run it once without parameters.
    ///
    /// The statement is closed before returning, whether execution
    /// succeeded or not.
    pub fn execute(&mut self, sql: &str) -> Result<ExecResult> {
        let conn = match self.conn.as_deref_mut() {
            Some(conn) => conn,
            None => return Err(self.channel.fail(NuoError::NotOpen)),
        };

        debug!(sql, dml = statement::is_dml(sql), "executing one-shot");
        let mut prep = self.channel.trap(conn.prepare(sql))?;
        let result = statement::run_update(prep.as_mut());
        let closed = prep.close();
        let result = self.channel.trap(result)?;
        self.channel.trap(closed)?;
        Ok(result)
    }

    /// Prepare `sql` for repeated parameterized execution.
    pub fn prepare(&mut self, sql: &str) -> Result<Statement> {
        let conn = match self.conn.as_deref_mut() {
            Some(conn) => conn,
            None => return Err(self.channel.fail(NuoError::NotOpen)),
        };

        let prep = self.channel.trap(conn.prepare(sql))?;
        let parameter_count = prep.parameter_count();
        debug!(sql, parameter_count, "statement prepared");
        Ok(Statement::new(prep, parameter_count, self.channel.clone()))
    }

    /// Start an explicit transaction.
    ///
    /// Autocommit is disabled for the duration of the returned guard and
    /// restored to its prior state when the guard commits, rolls back, or
    /// is dropped.
    pub fn begin(&mut self) -> Result<Transaction<'_>> {
        let prior_autocommit = self.autocommit()?;
        self.set_autocommit(false)?;
        Ok(Transaction {
            conn: self,
            prior_autocommit,
            finished: false,
        })
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            if let Err(err) = conn.close() {
                warn!(error = %err, "failed to close connection on drop");
            }
        }
    }
}

/// Guard for an explicit transaction started with [`Connection::begin`].
///
/// Dropping the guard without committing rolls the transaction back.
pub struct Transaction<'a> {
    conn: &'a mut Connection,
    prior_autocommit: bool,
    finished: bool,
}

impl Transaction<'_> {
    pub fn commit(mut self) -> Result<()> {
        self.finished = true;
        let result = self.conn.commit();
        let restored = self.conn.set_autocommit(self.prior_autocommit);
        result.and(restored)
    }

    pub fn rollback(mut self) -> Result<()> {
        self.finished = true;
        let result = self.conn.rollback();
        let restored = self.conn.set_autocommit(self.prior_autocommit);
        result.and(restored)
    }

    /// Run a statement inside the transaction.
    pub fn execute(&mut self, sql: &str) -> Result<ExecResult> {
        self.conn.execute(sql)
    }

    pub fn prepare(&mut self, sql: &str) -> Result<Statement> {
        self.conn.prepare(sql)
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(err) = self.conn.rollback() {
                warn!(error = %err, "failed to roll back abandoned transaction");
            }
            if let Err(err) = self.conn.set_autocommit(self.prior_autocommit) {
                warn!(error = %err, "failed to restore autocommit");
            }
        }
    }
}
