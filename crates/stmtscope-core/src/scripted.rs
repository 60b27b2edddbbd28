//! Scripted in-memory resources.
//!
//! These implement the capability traits with canned answers instead of a
//! database. Tests use them as delegates with known behavior, and the CLI
//! uses them to replay scenarios.
//!
//! ```
//! use stmtscope_core::scripted::ScriptedStatement;
//! use stmtscope_core::Statement;
//!
//! let mut stmt = ScriptedStatement::new().with_update("UPDATE t SET x=1", 3);
//! assert_eq!(stmt.execute_update("UPDATE t SET x=1").unwrap(), 3);
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::connection::{Connection, SharedConnection};
use crate::error::{SqlError, SqlResult};
use crate::result_set::{BoxedResultSet, ResultSet};
use crate::statement::Statement;
use crate::types::{
    AutoGeneratedKeys, Concurrency, CurrentResult, FetchDirection, Holdability, NO_UPDATE_COUNT,
    ResourceId, ResultSetType, SUCCESS_NO_INFO, SqlWarning, Value,
};

/// Failure key matching [`Statement::cancel`].
pub const CANCEL: &str = "cancel";
/// Failure key matching [`Statement::execute_batch`].
pub const EXECUTE_BATCH: &str = "execute_batch";
/// Failure key matching [`Statement::get_result_set`].
pub const GET_RESULT_SET: &str = "get_result_set";
/// Failure key matching [`Statement::get_generated_keys`].
pub const GET_GENERATED_KEYS: &str = "get_generated_keys";

fn metadata_unavailable() -> SqlError {
    SqlError::Scripted("metadata unavailable".to_string())
}

/// A connection with fixed state.
#[derive(Debug, Clone, Default)]
pub struct ScriptedConnection {
    id: Option<ResourceId>,
    auto_commit: bool,
    closed: bool,
    failing_reads: bool,
}

impl ScriptedConnection {
    /// Create an open connection with auto-commit enabled.
    pub fn new() -> Self {
        Self {
            auto_commit: true,
            ..Self::default()
        }
    }

    /// Report this identifier from [`Connection::connection_id`].
    pub fn with_id(mut self, id: ResourceId) -> Self {
        self.id = Some(id);
        self
    }

    /// Set the auto-commit flag.
    pub fn with_auto_commit(mut self, auto_commit: bool) -> Self {
        self.auto_commit = auto_commit;
        self
    }

    /// Report the connection as closed.
    pub fn with_closed(mut self, closed: bool) -> Self {
        self.closed = closed;
        self
    }

    /// Make every state read fail.
    pub fn with_failing_reads(mut self) -> Self {
        self.failing_reads = true;
        self
    }

    /// Wrap in an `Arc`.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl Connection for ScriptedConnection {
    fn connection_id(&self) -> Option<ResourceId> {
        self.id
    }

    fn get_auto_commit(&self) -> SqlResult<bool> {
        if self.failing_reads {
            return Err(metadata_unavailable());
        }
        Ok(self.auto_commit)
    }

    fn is_closed(&self) -> SqlResult<bool> {
        if self.failing_reads {
            return Err(metadata_unavailable());
        }
        Ok(self.closed)
    }
}

/// A cursor over fixed rows.
#[derive(Debug, Clone, Default)]
pub struct ScriptedResultSet {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    position: usize,
    closed: bool,
    last_was_null: bool,
    fetch_size: u32,
    fetch_direction: FetchDirection,
    warnings: Vec<SqlWarning>,
}

impl ScriptedResultSet {
    /// Create a cursor with the given column labels and rows.
    pub fn new<C, R>(columns: C, rows: R) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        R: IntoIterator<Item = Vec<Value>>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: rows.into_iter().collect(),
            ..Self::default()
        }
    }

    /// A cursor with no columns and no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Attach a warning.
    pub fn with_warning(mut self, warning: SqlWarning) -> Self {
        self.warnings.push(warning);
        self
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn ensure_open(&self) -> SqlResult<()> {
        if self.closed {
            Err(SqlError::Closed)
        } else {
            Ok(())
        }
    }
}

impl ResultSet for ScriptedResultSet {
    fn next(&mut self) -> SqlResult<bool> {
        self.ensure_open()?;
        if self.position < self.rows.len() {
            self.position += 1;
            Ok(true)
        } else {
            self.position = self.rows.len() + 1;
            Ok(false)
        }
    }

    fn close(&mut self) -> SqlResult<()> {
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> SqlResult<bool> {
        Ok(self.closed)
    }

    fn was_null(&self) -> SqlResult<bool> {
        self.ensure_open()?;
        Ok(self.last_was_null)
    }

    fn column_count(&self) -> SqlResult<usize> {
        self.ensure_open()?;
        Ok(self.columns.len())
    }

    fn column_label(&self, column: usize) -> SqlResult<String> {
        self.ensure_open()?;
        self.columns
            .get(column)
            .cloned()
            .ok_or_else(|| SqlError::InvalidArgument(format!("column {} out of range", column)))
    }

    fn get_value(&mut self, column: usize) -> SqlResult<Value> {
        self.ensure_open()?;
        let row = self
            .position
            .checked_sub(1)
            .and_then(|index| self.rows.get(index))
            .ok_or_else(|| SqlError::InvalidArgument("cursor is not on a row".to_string()))?;
        let value = row
            .get(column)
            .cloned()
            .ok_or_else(|| SqlError::InvalidArgument(format!("column {} out of range", column)))?;
        self.last_was_null = value.is_null();
        Ok(value)
    }

    fn get_row(&self) -> SqlResult<usize> {
        self.ensure_open()?;
        if self.position <= self.rows.len() {
            Ok(self.position)
        } else {
            Ok(0)
        }
    }

    fn get_fetch_size(&self) -> SqlResult<u32> {
        Ok(self.fetch_size)
    }

    fn set_fetch_size(&mut self, rows: u32) -> SqlResult<()> {
        self.fetch_size = rows;
        Ok(())
    }

    fn get_fetch_direction(&self) -> SqlResult<FetchDirection> {
        Ok(self.fetch_direction)
    }

    fn set_fetch_direction(&mut self, direction: FetchDirection) -> SqlResult<()> {
        self.fetch_direction = direction;
        Ok(())
    }

    fn get_warnings(&self) -> SqlResult<Vec<SqlWarning>> {
        Ok(self.warnings.clone())
    }

    fn clear_warnings(&mut self) -> SqlResult<()> {
        self.warnings.clear();
        Ok(())
    }

    fn get_type(&self) -> SqlResult<ResultSetType> {
        Ok(ResultSetType::ForwardOnly)
    }

    fn get_concurrency(&self) -> SqlResult<Concurrency> {
        Ok(Concurrency::ReadOnly)
    }

    fn get_holdability(&self) -> SqlResult<Holdability> {
        Ok(Holdability::CloseCursorsAtCommit)
    }

    fn get_cursor_name(&self) -> SqlResult<Option<String>> {
        Ok(None)
    }
}

#[derive(Debug, Clone, Default)]
enum CurrentOutcome {
    #[default]
    None,
    Cursor(ScriptedResultSet),
    Count(i32),
}

/// A statement that answers from scripted tables.
///
/// Updates return their registered count (zero when unregistered), queries
/// return a fresh copy of their registered cursor (empty when
/// unregistered), and any operation whose SQL text or operation key has a
/// registered failure returns that error instead. Every call is appended to
/// a call log.
#[derive(Debug, Default)]
pub struct ScriptedStatement {
    updates: HashMap<String, i32>,
    queries: HashMap<String, ScriptedResultSet>,
    failures: HashMap<String, SqlError>,
    generated_keys: ScriptedResultSet,
    connection: Option<Arc<ScriptedConnection>>,
    failing_metadata: bool,
    closed: bool,
    poolable: bool,
    close_on_completion: bool,
    escape_processing: bool,
    max_field_size: u32,
    max_rows: u64,
    query_timeout: u32,
    fetch_size: u32,
    fetch_direction: FetchDirection,
    cursor_name: Option<String>,
    warnings: Vec<SqlWarning>,
    batch: Vec<String>,
    current: CurrentOutcome,
    calls: Mutex<Vec<String>>,
}

impl ScriptedStatement {
    /// Create an open statement with no script.
    pub fn new() -> Self {
        Self {
            escape_processing: true,
            ..Self::default()
        }
    }

    /// Return `count` from updates of `sql`.
    pub fn with_update(mut self, sql: impl Into<String>, count: i32) -> Self {
        self.updates.insert(sql.into(), count);
        self
    }

    /// Return `rows` from queries of `sql`.
    pub fn with_query(mut self, sql: impl Into<String>, rows: ScriptedResultSet) -> Self {
        self.queries.insert(sql.into(), rows);
        self
    }

    /// Fail any operation on `key` (SQL text or an operation key such as
    /// [`CANCEL`]) with `error`.
    pub fn with_failure(mut self, key: impl Into<String>, error: SqlError) -> Self {
        self.failures.insert(key.into(), error);
        self
    }

    /// Cursor returned by `get_generated_keys`.
    pub fn with_generated_keys(mut self, keys: ScriptedResultSet) -> Self {
        self.generated_keys = keys;
        self
    }

    /// Owning connection.
    pub fn with_connection(mut self, connection: Arc<ScriptedConnection>) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Set the poolable hint.
    pub fn with_poolable(mut self, poolable: bool) -> Self {
        self.poolable = poolable;
        self
    }

    /// Start closed.
    pub fn with_closed(mut self, closed: bool) -> Self {
        self.closed = closed;
        self
    }

    /// Make `is_closed` and `is_poolable` fail.
    pub fn with_failing_metadata(mut self) -> Self {
        self.failing_metadata = true;
        self
    }

    /// Attach a warning.
    pub fn with_warning(mut self, warning: SqlWarning) -> Self {
        self.warnings.push(warning);
        self
    }

    /// Calls received so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Number of calls whose log entry starts with `operation`.
    pub fn call_count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.split(':').next() == Some(operation))
            .count()
    }

    /// Commands queued for the next batch.
    pub fn pending_batch(&self) -> &[String] {
        &self.batch
    }

    fn log(&self, operation: &str, detail: Option<&str>) {
        let entry = match detail {
            Some(detail) => format!("{}:{}", operation, detail),
            None => operation.to_string(),
        };
        self.calls.lock().push(entry);
    }

    fn scripted_failure(&self, key: &str) -> SqlResult<()> {
        match self.failures.get(key) {
            Some(error) => {
                tracing::debug!(key = key, "injecting scripted failure");
                Err(error.clone())
            }
            None => Ok(()),
        }
    }

    fn ensure_open(&self) -> SqlResult<()> {
        if self.closed {
            Err(SqlError::Closed)
        } else {
            Ok(())
        }
    }

    fn run_update(&mut self, operation: &str, sql: &str) -> SqlResult<i32> {
        self.log(operation, Some(sql));
        self.ensure_open()?;
        self.scripted_failure(sql)?;
        let count = self.updates.get(sql).copied().unwrap_or(0);
        self.current = CurrentOutcome::Count(count);
        Ok(count)
    }

    fn run_execute(&mut self, operation: &str, sql: &str) -> SqlResult<bool> {
        self.log(operation, Some(sql));
        self.ensure_open()?;
        self.scripted_failure(sql)?;
        if let Some(rows) = self.queries.get(sql) {
            self.current = CurrentOutcome::Cursor(rows.clone());
            Ok(true)
        } else {
            let count = self.updates.get(sql).copied().unwrap_or(0);
            self.current = CurrentOutcome::Count(count);
            Ok(false)
        }
    }
}

impl Statement for ScriptedStatement {
    fn execute_query(&mut self, sql: &str) -> SqlResult<BoxedResultSet> {
        self.log("execute_query", Some(sql));
        self.ensure_open()?;
        self.scripted_failure(sql)?;
        let rows = self.queries.get(sql).cloned().unwrap_or_default();
        self.current = CurrentOutcome::Cursor(rows.clone());
        Ok(Box::new(rows))
    }

    fn execute_update(&mut self, sql: &str) -> SqlResult<i32> {
        self.run_update("execute_update", sql)
    }

    fn execute_update_with_keys(
        &mut self,
        sql: &str,
        _keys: AutoGeneratedKeys,
    ) -> SqlResult<i32> {
        self.run_update("execute_update_with_keys", sql)
    }

    fn execute_update_with_column_indexes(
        &mut self,
        sql: &str,
        _column_indexes: &[u32],
    ) -> SqlResult<i32> {
        self.run_update("execute_update_with_column_indexes", sql)
    }

    fn execute_update_with_column_names(
        &mut self,
        sql: &str,
        _column_names: &[&str],
    ) -> SqlResult<i32> {
        self.run_update("execute_update_with_column_names", sql)
    }

    fn execute(&mut self, sql: &str) -> SqlResult<bool> {
        self.run_execute("execute", sql)
    }

    fn execute_with_keys(&mut self, sql: &str, _keys: AutoGeneratedKeys) -> SqlResult<bool> {
        self.run_execute("execute_with_keys", sql)
    }

    fn execute_with_column_indexes(
        &mut self,
        sql: &str,
        _column_indexes: &[u32],
    ) -> SqlResult<bool> {
        self.run_execute("execute_with_column_indexes", sql)
    }

    fn execute_with_column_names(
        &mut self,
        sql: &str,
        _column_names: &[&str],
    ) -> SqlResult<bool> {
        self.run_execute("execute_with_column_names", sql)
    }

    fn get_result_set(&mut self) -> SqlResult<Option<BoxedResultSet>> {
        self.log(GET_RESULT_SET, None);
        self.ensure_open()?;
        self.scripted_failure(GET_RESULT_SET)?;
        Ok(match &self.current {
            CurrentOutcome::Cursor(rows) => Some(Box::new(rows.clone()) as BoxedResultSet),
            _ => None,
        })
    }

    fn get_generated_keys(&mut self) -> SqlResult<BoxedResultSet> {
        self.log(GET_GENERATED_KEYS, None);
        self.ensure_open()?;
        self.scripted_failure(GET_GENERATED_KEYS)?;
        Ok(Box::new(self.generated_keys.clone()))
    }

    fn add_batch(&mut self, sql: &str) -> SqlResult<()> {
        self.log("add_batch", Some(sql));
        self.ensure_open()?;
        self.batch.push(sql.to_string());
        Ok(())
    }

    fn clear_batch(&mut self) -> SqlResult<()> {
        self.log("clear_batch", None);
        self.ensure_open()?;
        self.batch.clear();
        Ok(())
    }

    fn execute_batch(&mut self) -> SqlResult<Vec<i32>> {
        self.log(EXECUTE_BATCH, None);
        self.ensure_open()?;
        self.scripted_failure(EXECUTE_BATCH)?;
        let counts = self
            .batch
            .drain(..)
            .map(|sql| self.updates.get(&sql).copied().unwrap_or(SUCCESS_NO_INFO))
            .collect();
        self.current = CurrentOutcome::None;
        Ok(counts)
    }

    fn cancel(&self) -> SqlResult<()> {
        self.log(CANCEL, None);
        self.scripted_failure(CANCEL)
    }

    fn close(&mut self) -> SqlResult<()> {
        self.log("close", None);
        self.closed = true;
        self.current = CurrentOutcome::None;
        Ok(())
    }

    fn is_closed(&self) -> SqlResult<bool> {
        if self.failing_metadata {
            return Err(metadata_unavailable());
        }
        Ok(self.closed)
    }

    fn get_max_field_size(&self) -> SqlResult<u32> {
        Ok(self.max_field_size)
    }

    fn set_max_field_size(&mut self, max: u32) -> SqlResult<()> {
        self.log("set_max_field_size", None);
        self.max_field_size = max;
        Ok(())
    }

    fn get_max_rows(&self) -> SqlResult<u32> {
        u32::try_from(self.max_rows)
            .map_err(|_| SqlError::InvalidArgument("row limit exceeds u32".to_string()))
    }

    fn set_max_rows(&mut self, max: u32) -> SqlResult<()> {
        self.log("set_max_rows", None);
        self.max_rows = u64::from(max);
        Ok(())
    }

    fn set_escape_processing(&mut self, enable: bool) -> SqlResult<()> {
        self.log("set_escape_processing", None);
        self.escape_processing = enable;
        Ok(())
    }

    fn get_query_timeout(&self) -> SqlResult<u32> {
        Ok(self.query_timeout)
    }

    fn set_query_timeout(&mut self, seconds: u32) -> SqlResult<()> {
        self.log("set_query_timeout", None);
        self.query_timeout = seconds;
        Ok(())
    }

    fn get_warnings(&self) -> SqlResult<Vec<SqlWarning>> {
        self.ensure_open()?;
        Ok(self.warnings.clone())
    }

    fn clear_warnings(&mut self) -> SqlResult<()> {
        self.log("clear_warnings", None);
        self.warnings.clear();
        Ok(())
    }

    fn set_cursor_name(&mut self, name: &str) -> SqlResult<()> {
        self.log("set_cursor_name", Some(name));
        self.cursor_name = Some(name.to_string());
        Ok(())
    }

    fn get_update_count(&self) -> SqlResult<i32> {
        Ok(match self.current {
            CurrentOutcome::Count(count) => count,
            _ => NO_UPDATE_COUNT,
        })
    }

    fn get_more_results(&mut self) -> SqlResult<bool> {
        self.get_more_results_with(CurrentResult::Close)
    }

    fn get_more_results_with(&mut self, _current: CurrentResult) -> SqlResult<bool> {
        self.log("get_more_results", None);
        self.current = CurrentOutcome::None;
        Ok(false)
    }

    fn set_fetch_direction(&mut self, direction: FetchDirection) -> SqlResult<()> {
        self.log("set_fetch_direction", None);
        self.fetch_direction = direction;
        Ok(())
    }

    fn get_fetch_direction(&self) -> SqlResult<FetchDirection> {
        Ok(self.fetch_direction)
    }

    fn set_fetch_size(&mut self, rows: u32) -> SqlResult<()> {
        self.log("set_fetch_size", None);
        self.fetch_size = rows;
        Ok(())
    }

    fn get_fetch_size(&self) -> SqlResult<u32> {
        Ok(self.fetch_size)
    }

    fn get_result_set_concurrency(&self) -> SqlResult<Concurrency> {
        Ok(Concurrency::ReadOnly)
    }

    fn get_result_set_type(&self) -> SqlResult<ResultSetType> {
        Ok(ResultSetType::ForwardOnly)
    }

    fn get_connection(&self) -> SqlResult<Option<SharedConnection>> {
        Ok(self
            .connection
            .as_ref()
            .map(|connection| Arc::clone(connection) as SharedConnection))
    }

    fn get_result_set_holdability(&self) -> SqlResult<Holdability> {
        Ok(Holdability::CloseCursorsAtCommit)
    }

    fn set_poolable(&mut self, poolable: bool) -> SqlResult<()> {
        self.log("set_poolable", None);
        self.poolable = poolable;
        Ok(())
    }

    fn is_poolable(&self) -> SqlResult<bool> {
        if self.failing_metadata {
            return Err(metadata_unavailable());
        }
        Ok(self.poolable)
    }

    fn close_on_completion(&mut self) -> SqlResult<()> {
        self.log("close_on_completion", None);
        self.close_on_completion = true;
        Ok(())
    }

    fn is_close_on_completion(&self) -> SqlResult<bool> {
        Ok(self.close_on_completion)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn set_large_max_rows(&mut self, max: u64) -> SqlResult<()> {
        self.log("set_large_max_rows", None);
        self.max_rows = max;
        Ok(())
    }

    fn get_large_max_rows(&self) -> SqlResult<u64> {
        Ok(self.max_rows)
    }

    fn execute_large_batch(&mut self) -> SqlResult<Vec<i64>> {
        self.execute_batch()
            .map(|counts| counts.into_iter().map(i64::from).collect())
    }

    fn execute_large_update(&mut self, sql: &str) -> SqlResult<i64> {
        self.run_update("execute_large_update", sql).map(i64::from)
    }
}
