//! The cursor capability contract.

use crate::error::{SqlError, SqlResult};
use crate::types::{Concurrency, FetchDirection, Holdability, ResultSetType, SqlWarning, Value};

/// A cursor over rows produced by a query.
///
/// Column indexes are zero-based. Typed getters are provided on top of
/// [`get_value`](Self::get_value) and record nullness for
/// [`was_null`](Self::was_null) the same way.
pub trait ResultSet: Send {
    /// Advance to the next row. Returns `false` past the last row.
    fn next(&mut self) -> SqlResult<bool>;

    /// Release the cursor.
    fn close(&mut self) -> SqlResult<()>;

    /// Whether [`close`](Self::close) has been called.
    fn is_closed(&self) -> SqlResult<bool>;

    /// Whether the last value read was SQL NULL.
    fn was_null(&self) -> SqlResult<bool>;

    /// Number of columns per row.
    fn column_count(&self) -> SqlResult<usize>;

    /// Label of a column.
    fn column_label(&self, column: usize) -> SqlResult<String>;

    /// Read a column of the current row.
    fn get_value(&mut self, column: usize) -> SqlResult<Value>;

    /// Current row number, one-based. Zero before the first row.
    fn get_row(&self) -> SqlResult<usize>;

    /// Rows fetched per round trip.
    fn get_fetch_size(&self) -> SqlResult<u32>;

    /// Set rows fetched per round trip.
    fn set_fetch_size(&mut self, rows: u32) -> SqlResult<()>;

    /// Row processing hint.
    fn get_fetch_direction(&self) -> SqlResult<FetchDirection>;

    /// Set the row processing hint.
    fn set_fetch_direction(&mut self, direction: FetchDirection) -> SqlResult<()>;

    /// Warnings reported since the last clear.
    fn get_warnings(&self) -> SqlResult<Vec<SqlWarning>>;

    /// Discard reported warnings.
    fn clear_warnings(&mut self) -> SqlResult<()>;

    /// Scrollability of this cursor.
    fn get_type(&self) -> SqlResult<ResultSetType>;

    /// Concurrency of this cursor.
    fn get_concurrency(&self) -> SqlResult<Concurrency>;

    /// Holdability of this cursor.
    fn get_holdability(&self) -> SqlResult<Holdability>;

    /// Name of the underlying cursor, if the driver exposes one.
    fn get_cursor_name(&self) -> SqlResult<Option<String>>;

    /// Index of the first column with a case-insensitively matching label.
    fn find_column(&self, label: &str) -> SqlResult<usize> {
        for column in 0..self.column_count()? {
            if self.column_label(column)?.eq_ignore_ascii_case(label) {
                return Ok(column);
            }
        }
        Err(SqlError::InvalidArgument(format!("no column labelled '{}'", label)))
    }

    /// Read a column as text.
    fn get_string(&mut self, column: usize) -> SqlResult<Option<String>> {
        self.get_value(column)?.to_text()
    }

    /// Read a column as an integer.
    fn get_i64(&mut self, column: usize) -> SqlResult<Option<i64>> {
        self.get_value(column)?.to_i64()
    }

    /// Read a column as a float.
    fn get_f64(&mut self, column: usize) -> SqlResult<Option<f64>> {
        self.get_value(column)?.to_f64()
    }

    /// Read a column as a boolean.
    fn get_bool(&mut self, column: usize) -> SqlResult<Option<bool>> {
        self.get_value(column)?.to_bool()
    }

    /// Read a column as bytes.
    fn get_bytes(&mut self, column: usize) -> SqlResult<Option<Vec<u8>>> {
        self.get_value(column)?.to_bytes()
    }
}

/// A boxed cursor trait object.
pub type BoxedResultSet = Box<dyn ResultSet>;
