//! Cursor decorator.

use std::fmt;

use stmtscope_core::{
    BoxedResultSet, Concurrency, FetchDirection, Holdability, ResourceId, ResultSet,
    ResultSetType, SqlResult, SqlWarning, Value,
};

/// A cursor handed back by an instrumented statement.
///
/// Every call forwards to the driver's cursor. The proxy only remembers
/// which statement produced it.
pub struct ResultSetProxy {
    delegate: BoxedResultSet,
    statement_id: ResourceId,
}

impl ResultSetProxy {
    /// Wrap a cursor produced by statement `statement_id`.
    pub fn new(delegate: BoxedResultSet, statement_id: ResourceId) -> Self {
        Self {
            delegate,
            statement_id,
        }
    }

    /// The statement that produced this cursor.
    pub fn statement_id(&self) -> ResourceId {
        self.statement_id
    }

    /// Unwrap.
    pub fn into_inner(self) -> BoxedResultSet {
        self.delegate
    }
}

impl ResultSet for ResultSetProxy {
    forward! { delegate =>
        fn next(&mut self) -> SqlResult<bool>;
        fn close(&mut self) -> SqlResult<()>;
        fn is_closed(&self) -> SqlResult<bool>;
        fn was_null(&self) -> SqlResult<bool>;
        fn column_count(&self) -> SqlResult<usize>;
        fn column_label(&self, column: usize) -> SqlResult<String>;
        fn get_value(&mut self, column: usize) -> SqlResult<Value>;
        fn get_row(&self) -> SqlResult<usize>;
        fn get_fetch_size(&self) -> SqlResult<u32>;
        fn set_fetch_size(&mut self, rows: u32) -> SqlResult<()>;
        fn get_fetch_direction(&self) -> SqlResult<FetchDirection>;
        fn set_fetch_direction(&mut self, direction: FetchDirection) -> SqlResult<()>;
        fn get_warnings(&self) -> SqlResult<Vec<SqlWarning>>;
        fn clear_warnings(&mut self) -> SqlResult<()>;
        fn get_type(&self) -> SqlResult<ResultSetType>;
        fn get_concurrency(&self) -> SqlResult<Concurrency>;
        fn get_holdability(&self) -> SqlResult<Holdability>;
        fn get_cursor_name(&self) -> SqlResult<Option<String>>;
        fn find_column(&self, label: &str) -> SqlResult<usize>;
        fn get_string(&mut self, column: usize) -> SqlResult<Option<String>>;
        fn get_i64(&mut self, column: usize) -> SqlResult<Option<i64>>;
        fn get_f64(&mut self, column: usize) -> SqlResult<Option<f64>>;
        fn get_bool(&mut self, column: usize) -> SqlResult<Option<bool>>;
        fn get_bytes(&mut self, column: usize) -> SqlResult<Option<Vec<u8>>>;
    }
}

impl fmt::Debug for ResultSetProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSetProxy")
            .field("statement_id", &self.statement_id)
            .finish_non_exhaustive()
    }
}
