//! Result set handle: batched row fetch and column metadata.

use crate::codec;
use crate::engine::EngineCursor;
use crate::error::{ErrorChannel, NuoError, Result};
use crate::value::{RawValue, Value};

/// A forward-only result set.
///
/// Each [`next`] call decodes the entire current row into an internal
/// buffer in one pass over the cursor; the returned [`RowView`] borrows
/// that buffer, so the borrow checker invalidates it on the next fetch.
///
/// [`next`]: Rows::next
pub struct Rows {
    cursor: Option<Box<dyn EngineCursor>>,
    row: Vec<RawValue>,
    channel: ErrorChannel,
}

impl Rows {
    pub(crate) fn new(cursor: Box<dyn EngineCursor>, channel: ErrorChannel) -> Self {
        let columns = cursor.column_count();
        Self {
            cursor: Some(cursor),
            row: vec![RawValue::null(); columns],
            channel,
        }
    }

    /// Number of columns, available before the first fetch.
    pub fn column_count(&self) -> usize {
        self.row.len()
    }

    /// Fill `out` with byte views of the column labels, in declared order.
    ///
    /// `out` must hold exactly one record per column. The views stay valid
    /// until the result set is closed.
    pub fn column_names_into(&mut self, out: &mut [RawValue]) -> Result<()> {
        if out.len() != self.row.len() {
            return Err(self.channel.fail(NuoError::BufferSize {
                expected: self.row.len(),
                actual: out.len(),
            }));
        }
        let cursor = match self.cursor.as_deref() {
            Some(cursor) => cursor,
            None => return Err(self.channel.fail(NuoError::RowsClosed)),
        };
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = RawValue::encode(&Value::Bytes(cursor.column_label(i + 1)));
        }
        Ok(())
    }

    /// Column labels as owned strings.
    pub fn labels(&mut self) -> Result<Vec<String>> {
        let cursor = match self.cursor.as_deref() {
            Some(cursor) => cursor,
            None => return Err(self.channel.fail(NuoError::RowsClosed)),
        };
        Ok((1..=self.row.len())
            .map(|i| String::from_utf8_lossy(cursor.column_label(i)).into_owned())
            .collect())
    }

    /// Advance and decode the next row into `out`.
    ///
    /// Returns false once the cursor is exhausted, leaving `out` zeroed.
    /// The byte views written into `out` stay valid until the next cursor
    /// operation.
    pub fn next_into(&mut self, out: &mut [RawValue]) -> Result<bool> {
        if out.len() != self.row.len() {
            return Err(self.channel.fail(NuoError::BufferSize {
                expected: self.row.len(),
                actual: out.len(),
            }));
        }
        let cursor = match self.cursor.as_deref_mut() {
            Some(cursor) => cursor,
            None => return Err(self.channel.fail(NuoError::RowsClosed)),
        };

        if !self.channel.trap(cursor.next())? {
            out.fill(RawValue::null());
            return Ok(false);
        }
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.channel.trap(codec::decode_column(cursor, i + 1))?;
        }
        Ok(true)
    }

    /// Fetch the next row, or `None` once the cursor is exhausted.
    pub fn next(&mut self) -> Result<Option<RowView<'_>>> {
        let mut row = std::mem::take(&mut self.row);
        let fetched = self.next_into(&mut row);
        self.row = row;
        if fetched? {
            Ok(Some(RowView { values: &self.row }))
        } else {
            Ok(None)
        }
    }

    /// Close the result set. Safe to call repeatedly.
    pub fn close(&mut self) -> Result<()> {
        match self.cursor.take() {
            Some(mut cursor) => self.channel.trap(cursor.close()),
            None => Ok(()),
        }
    }
}

impl Drop for Rows {
    fn drop(&mut self) {
        if let Some(mut cursor) = self.cursor.take() {
            let _ = cursor.close();
        }
    }
}

/// One fetched row, borrowed from its [`Rows`] handle.
pub struct RowView<'a> {
    values: &'a [RawValue],
}

impl<'a> RowView<'a> {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The raw boundary records of this row.
    pub fn raw(&self) -> &'a [RawValue] {
        self.values
    }

    /// Decode the value at 0-based `index`.
    pub fn get(&self, index: usize) -> Result<Value<'a>> {
        let raw = self.values.get(index).ok_or(NuoError::ColumnIndex {
            index,
            count: self.values.len(),
        })?;
        // The views in `raw` point into engine buffers that stay valid
        // while this row is current, which the borrow on the handle
        // guarantees.
        unsafe { raw.decode() }.map_err(|_| NuoError::InvalidUtf8 { index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fakes::{FakeCell, FakeColumn, FakeCursor};
    use crate::engine::SqlType;
    use crate::value::ValueTag;

    fn two_column_rows() -> Rows {
        let cursor = FakeCursor::new(
            vec![
                FakeColumn {
                    label: "ID",
                    sql_type: SqlType::BigInt,
                    scale: 0,
                },
                FakeColumn {
                    label: "NAME",
                    sql_type: SqlType::Varchar,
                    scale: 0,
                },
            ],
            vec![
                vec![FakeCell::Int(1), FakeCell::Text("ada")],
                vec![FakeCell::Int(2), FakeCell::Null],
            ],
        );
        Rows::new(Box::new(cursor), ErrorChannel::new())
    }

    #[test]
    fn labels_are_available_before_first_fetch() {
        let mut rows = two_column_rows();
        assert_eq!(rows.column_count(), 2);
        assert_eq!(rows.labels().unwrap(), vec!["ID", "NAME"]);

        let mut names = [RawValue::null(); 2];
        rows.column_names_into(&mut names).unwrap();
        assert_eq!(names[0].tag, ValueTag::Bytes);
        assert_eq!(unsafe { names[1].decode() }.unwrap(), Value::Bytes(b"NAME"));
    }

    #[test]
    fn next_decodes_whole_rows() {
        let mut rows = two_column_rows();

        let row = rows.next().unwrap().unwrap();
        assert_eq!(row.len(), 2);
        assert_eq!(row.get(0).unwrap(), Value::Int64(1));
        assert_eq!(row.get(1).unwrap(), Value::Bytes(b"ada"));

        let row = rows.next().unwrap().unwrap();
        assert_eq!(row.get(0).unwrap(), Value::Int64(2));
        assert_eq!(row.get(1).unwrap(), Value::Null);

        assert!(rows.next().unwrap().is_none());
    }

    #[test]
    fn exhausted_fetch_zeroes_the_buffer() {
        let mut rows = two_column_rows();
        let mut buffer = [RawValue::null(); 2];
        while rows.next_into(&mut buffer).unwrap() {}
        assert_eq!(buffer[0], RawValue::null());
        assert_eq!(buffer[1], RawValue::null());
    }

    #[test]
    fn wrong_buffer_length_is_rejected() {
        let mut rows = two_column_rows();
        let mut buffer = [RawValue::null(); 3];
        assert!(matches!(
            rows.next_into(&mut buffer),
            Err(NuoError::BufferSize {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn out_of_range_column_is_rejected() {
        let mut rows = two_column_rows();
        let row = rows.next().unwrap().unwrap();
        assert!(matches!(
            row.get(2),
            Err(NuoError::ColumnIndex { index: 2, count: 2 })
        ));
    }

    #[test]
    fn close_is_idempotent() {
        let mut rows = two_column_rows();
        rows.close().unwrap();
        rows.close().unwrap();
        assert!(matches!(rows.next(), Err(NuoError::RowsClosed)));
    }
}
