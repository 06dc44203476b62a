#![allow(dead_code)]

//! In-memory scripted engine for integration tests.
//!
//! Recognizes a small fixed set of SQL statements against one table of
//! names with auto-incrementing ids, plus a string-keyed table, which is
//! enough to exercise the full bind/execute/fetch surface without a real
//! database.

use std::sync::{Arc, Mutex};

use nuobridge::engine::{
    Engine, EngineConnection, EngineCursor, EnginePrepared, SqlType,
};
use nuobridge::{ConnectOptions, EngineError, SqlCode};

pub const INSERT_NAME: &str = "INSERT INTO t(name) VALUES(?)";
pub const SELECT_NAMES: &str = "SELECT name FROM t";
pub const UPDATE_NOTHING: &str = "UPDATE t SET name = ? WHERE id = -1";
pub const INSERT_KEYED: &str = "INSERT INTO s(k) VALUES(?)";

#[derive(Default)]
struct TableState {
    names: Vec<String>,
    next_id: i64,
}

#[derive(Default)]
pub struct TestEngine;

impl Engine for TestEngine {
    fn connect(
        &self,
        options: &ConnectOptions,
    ) -> Result<Box<dyn EngineConnection>, EngineError> {
        if options.username.is_empty() {
            return Err(EngineError::new(
                SqlCode::CONNECTION_ERROR,
                "missing username",
            ));
        }
        Ok(Box::new(TestConnection {
            state: Arc::new(Mutex::new(TableState {
                names: Vec::new(),
                next_id: 1,
            })),
            autocommit: false,
        }))
    }
}

struct TestConnection {
    state: Arc<Mutex<TableState>>,
    autocommit: bool,
}

impl EngineConnection for TestConnection {
    fn autocommit(&mut self) -> Result<bool, EngineError> {
        Ok(self.autocommit)
    }

    fn set_autocommit(&mut self, enabled: bool) -> Result<(), EngineError> {
        self.autocommit = enabled;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    fn prepare(&mut self, sql: &str) -> Result<Box<dyn EnginePrepared>, EngineError> {
        let kind = match sql {
            INSERT_NAME => Script::InsertName,
            SELECT_NAMES => Script::SelectNames,
            UPDATE_NOTHING => Script::UpdateNothing,
            INSERT_KEYED => Script::InsertKeyed,
            _ => {
                return Err(EngineError::new(
                    SqlCode::SYNTAX_ERROR,
                    format!("unrecognized statement: {sql}"),
                ))
            }
        };
        Ok(Box::new(TestPrepared {
            kind,
            state: Arc::clone(&self.state),
            bound: None,
            inserted_id: 0,
            snapshot: Vec::new(),
        }))
    }

    fn close(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Script {
    InsertName,
    SelectNames,
    UpdateNothing,
    InsertKeyed,
}

struct TestPrepared {
    kind: Script,
    state: Arc<Mutex<TableState>>,
    bound: Option<String>,
    inserted_id: i64,
    snapshot: Vec<String>,
}

impl TestPrepared {
    fn bound(&self) -> Result<String, EngineError> {
        self.bound
            .clone()
            .ok_or_else(|| EngineError::new(SqlCode::APPLICATION_ERROR, "parameter not bound"))
    }
}

impl EnginePrepared for TestPrepared {
    fn parameter_count(&self) -> usize {
        match self.kind {
            Script::SelectNames => 0,
            _ => 1,
        }
    }

    fn set_null(&mut self, _index: usize) -> Result<(), EngineError> {
        self.bound = None;
        Ok(())
    }

    fn set_i64(&mut self, _index: usize, value: i64) -> Result<(), EngineError> {
        self.bound = Some(value.to_string());
        Ok(())
    }

    fn set_f64(&mut self, _index: usize, value: f64) -> Result<(), EngineError> {
        self.bound = Some(value.to_string());
        Ok(())
    }

    fn set_bool(&mut self, _index: usize, value: bool) -> Result<(), EngineError> {
        self.bound = Some(value.to_string());
        Ok(())
    }

    fn set_string(&mut self, _index: usize, value: &str) -> Result<(), EngineError> {
        self.bound = Some(value.to_string());
        Ok(())
    }

    fn set_bytes(&mut self, _index: usize, value: &[u8]) -> Result<(), EngineError> {
        self.bound = Some(String::from_utf8_lossy(value).into_owned());
        Ok(())
    }

    fn set_timestamp(
        &mut self,
        _index: usize,
        seconds: i64,
        nanos: i32,
    ) -> Result<(), EngineError> {
        self.bound = Some(format!("{seconds}.{nanos:09}"));
        Ok(())
    }

    fn set_query_timeout_micros(&mut self, _micros: i64) -> Result<(), EngineError> {
        Ok(())
    }

    fn execute(&mut self) -> Result<bool, EngineError> {
        match self.kind {
            Script::InsertName => {
                let name = self.bound()?;
                let mut state = self.state.lock().unwrap();
                state.names.push(name);
                self.inserted_id = state.next_id;
                state.next_id += 1;
                Ok(false)
            }
            Script::SelectNames => {
                self.snapshot = self.state.lock().unwrap().names.clone();
                Ok(true)
            }
            Script::UpdateNothing => {
                let _ = self.bound()?;
                Ok(false)
            }
            Script::InsertKeyed => {
                let _ = self.bound()?;
                Ok(false)
            }
        }
    }

    fn update_count(&mut self) -> Result<i64, EngineError> {
        Ok(match self.kind {
            Script::InsertName | Script::InsertKeyed => 1,
            // The engine reports -1 when nothing matched.
            Script::UpdateNothing => -1,
            Script::SelectNames => 0,
        })
    }

    fn result_set(&mut self) -> Result<Box<dyn EngineCursor>, EngineError> {
        match self.kind {
            Script::SelectNames => Ok(Box::new(TestCursor::new(
                vec![("NAME".into(), SqlType::Varchar, 0)],
                self.snapshot
                    .iter()
                    .map(|name| vec![Cell::Text(name.clone())])
                    .collect(),
            ))),
            _ => Err(EngineError::new(
                SqlCode::INVALID_STATEMENT,
                "statement produced no result set",
            )),
        }
    }

    fn generated_keys(&mut self) -> Result<Box<dyn EngineCursor>, EngineError> {
        Ok(match self.kind {
            Script::InsertName => Box::new(TestCursor::new(
                vec![("ID".into(), SqlType::BigInt, 0)],
                vec![vec![Cell::Int(self.inserted_id)]],
            )),
            Script::InsertKeyed => Box::new(TestCursor::new(
                vec![("K".into(), SqlType::Varchar, 0)],
                vec![vec![Cell::Text(self.bound()?)]],
            )),
            _ => Box::new(TestCursor::new(Vec::new(), Vec::new())),
        })
    }

    fn close(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
}

enum Cell {
    Int(i64),
    Text(String),
}

struct TestCursor {
    columns: Vec<(String, SqlType, i32)>,
    rows: Vec<Vec<Cell>>,
    // 0 means before the first row; stays pinned at the last row once
    // the cursor is exhausted.
    cursor: usize,
    null_seen: bool,
}

impl TestCursor {
    fn new(columns: Vec<(String, SqlType, i32)>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            columns,
            rows,
            cursor: 0,
            null_seen: false,
        }
    }

    fn cell(&self, column: usize) -> &Cell {
        let row = self.cursor.max(1) - 1;
        &self.rows[row][column - 1]
    }
}

impl EngineCursor for TestCursor {
    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column_label(&self, column: usize) -> &[u8] {
        self.columns[column - 1].0.as_bytes()
    }

    fn column_type(&self, column: usize) -> SqlType {
        self.columns[column - 1].1
    }

    fn scale(&self, column: usize) -> i32 {
        self.columns[column - 1].2
    }

    fn next(&mut self) -> Result<bool, EngineError> {
        if self.cursor < self.rows.len() {
            self.cursor += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn get_i64(&mut self, column: usize) -> Result<i64, EngineError> {
        self.null_seen = false;
        Ok(match *self.cell(column) {
            Cell::Int(v) => v,
            Cell::Text(_) => 0,
        })
    }

    fn get_f64(&mut self, column: usize) -> Result<f64, EngineError> {
        self.null_seen = false;
        Ok(match *self.cell(column) {
            Cell::Int(v) => v as f64,
            Cell::Text(_) => 0.0,
        })
    }

    fn get_bool(&mut self, column: usize) -> Result<bool, EngineError> {
        self.null_seen = false;
        Ok(matches!(*self.cell(column), Cell::Int(v) if v != 0))
    }

    fn get_string(&mut self, column: usize) -> Result<Option<&[u8]>, EngineError> {
        let row = self.cursor.max(1) - 1;
        Ok(match self.rows[row][column - 1] {
            Cell::Text(ref s) => Some(s.as_bytes()),
            Cell::Int(_) => None,
        })
    }

    fn get_bytes(&mut self, column: usize) -> Result<Option<&[u8]>, EngineError> {
        self.get_string(column)
    }

    fn get_timestamp(&mut self, _column: usize) -> Result<Option<(i64, i32)>, EngineError> {
        Ok(None)
    }

    fn was_null(&self) -> bool {
        self.null_seen
    }

    fn close(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
}

pub fn engine() -> Box<dyn Engine> {
    Box::new(TestEngine)
}

pub fn options() -> ConnectOptions {
    ConnectOptions::new("testdb@localhost", "dba", "secret")
}
