//! The statement capability contract.
//!
//! [`Statement`] is the full surface of a database command resource. A
//! driver implements it once; decorators implement it again by forwarding
//! to the driver, so every method here is part of what a wrapper has to
//! honor.

use std::any::{Any, TypeId};

use crate::connection::SharedConnection;
use crate::error::{SqlError, SqlResult};
use crate::result_set::BoxedResultSet;
use crate::types::{
    AutoGeneratedKeys, Concurrency, CurrentResult, FetchDirection, Holdability, ResultSetType,
    SqlWarning,
};

/// A database command resource.
///
/// Methods that execute SQL or change the resource's configuration take
/// `&mut self`. `cancel` takes `&self` so drivers that support out-of-band
/// cancellation can expose it through interior mutability.
///
/// Statements are not required to be `Sync`. Sharing one between threads
/// needs external synchronization.
pub trait Statement: Any + Send {
    /// Execute a query and return its cursor.
    fn execute_query(&mut self, sql: &str) -> SqlResult<BoxedResultSet>;

    /// Execute an insert, update, delete or DDL command.
    fn execute_update(&mut self, sql: &str) -> SqlResult<i32>;

    /// Execute an update, requesting generated keys.
    fn execute_update_with_keys(&mut self, sql: &str, keys: AutoGeneratedKeys)
    -> SqlResult<i32>;

    /// Execute an update, naming generated key columns by index.
    fn execute_update_with_column_indexes(
        &mut self,
        sql: &str,
        column_indexes: &[u32],
    ) -> SqlResult<i32>;

    /// Execute an update, naming generated key columns by name.
    fn execute_update_with_column_names(
        &mut self,
        sql: &str,
        column_names: &[&str],
    ) -> SqlResult<i32>;

    /// Execute any command. Returns `true` when the first result is a cursor.
    fn execute(&mut self, sql: &str) -> SqlResult<bool>;

    /// [`execute`](Self::execute), requesting generated keys.
    fn execute_with_keys(&mut self, sql: &str, keys: AutoGeneratedKeys) -> SqlResult<bool>;

    /// [`execute`](Self::execute), naming key columns by index.
    fn execute_with_column_indexes(&mut self, sql: &str, column_indexes: &[u32])
    -> SqlResult<bool>;

    /// [`execute`](Self::execute), naming key columns by name.
    fn execute_with_column_names(&mut self, sql: &str, column_names: &[&str])
    -> SqlResult<bool>;

    /// The current result as a cursor, or `None` if it is an update count or
    /// there are no more results.
    fn get_result_set(&mut self) -> SqlResult<Option<BoxedResultSet>>;

    /// Keys generated by the last update.
    fn get_generated_keys(&mut self) -> SqlResult<BoxedResultSet>;

    /// Queue a command for the next [`execute_batch`](Self::execute_batch).
    fn add_batch(&mut self, sql: &str) -> SqlResult<()>;

    /// Drop all queued batch commands.
    fn clear_batch(&mut self) -> SqlResult<()>;

    /// Run all queued commands. One update count per command.
    fn execute_batch(&mut self) -> SqlResult<Vec<i32>>;

    /// Ask the database to abort the running command.
    fn cancel(&self) -> SqlResult<()>;

    /// Release the resource.
    fn close(&mut self) -> SqlResult<()>;

    /// Whether [`close`](Self::close) has been called.
    fn is_closed(&self) -> SqlResult<bool>;

    /// Byte limit for character and binary column values. Zero is unlimited.
    fn get_max_field_size(&self) -> SqlResult<u32>;

    /// Set the column value byte limit.
    fn set_max_field_size(&mut self, max: u32) -> SqlResult<()>;

    /// Row limit for produced cursors. Zero is unlimited.
    fn get_max_rows(&self) -> SqlResult<u32>;

    /// Set the row limit.
    fn set_max_rows(&mut self, max: u32) -> SqlResult<()>;

    /// Toggle driver escape syntax processing.
    fn set_escape_processing(&mut self, enable: bool) -> SqlResult<()>;

    /// Query timeout in seconds. Zero is unlimited.
    fn get_query_timeout(&self) -> SqlResult<u32>;

    /// Set the query timeout in seconds.
    fn set_query_timeout(&mut self, seconds: u32) -> SqlResult<()>;

    /// Warnings reported since the last clear, oldest first.
    fn get_warnings(&self) -> SqlResult<Vec<SqlWarning>>;

    /// Discard reported warnings.
    fn clear_warnings(&mut self) -> SqlResult<()>;

    /// Name used by positioned update/delete commands.
    fn set_cursor_name(&mut self, name: &str) -> SqlResult<()>;

    /// Current update count, or [`NO_UPDATE_COUNT`](crate::NO_UPDATE_COUNT).
    fn get_update_count(&self) -> SqlResult<i32>;

    /// Move to the next result, closing the current cursor.
    fn get_more_results(&mut self) -> SqlResult<bool>;

    /// Move to the next result with explicit handling of the current cursor.
    fn get_more_results_with(&mut self, current: CurrentResult) -> SqlResult<bool>;

    /// Set the row processing hint.
    fn set_fetch_direction(&mut self, direction: FetchDirection) -> SqlResult<()>;

    /// Current row processing hint.
    fn get_fetch_direction(&self) -> SqlResult<FetchDirection>;

    /// Set the number of rows fetched per round trip.
    fn set_fetch_size(&mut self, rows: u32) -> SqlResult<()>;

    /// Rows fetched per round trip.
    fn get_fetch_size(&self) -> SqlResult<u32>;

    /// Concurrency of produced cursors.
    fn get_result_set_concurrency(&self) -> SqlResult<Concurrency>;

    /// Scrollability of produced cursors.
    fn get_result_set_type(&self) -> SqlResult<ResultSetType>;

    /// The connection that produced this statement.
    fn get_connection(&self) -> SqlResult<Option<SharedConnection>>;

    /// Holdability of produced cursors.
    fn get_result_set_holdability(&self) -> SqlResult<Holdability>;

    /// Hint whether a pool may cache this statement.
    fn set_poolable(&mut self, poolable: bool) -> SqlResult<()>;

    /// Pool caching hint.
    fn is_poolable(&self) -> SqlResult<bool>;

    /// Close this statement once all its cursors are closed.
    fn close_on_completion(&mut self) -> SqlResult<()>;

    /// Whether close-on-completion is set.
    fn is_close_on_completion(&self) -> SqlResult<bool>;

    /// This resource as `Any`, for [`unwrap_any`](Self::unwrap_any).
    fn as_any(&self) -> &dyn Any;

    /// Runtime type name reported in telemetry.
    fn class_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Current update count as a 64-bit value.
    fn get_large_update_count(&self) -> SqlResult<i64> {
        self.get_update_count().map(i64::from)
    }

    /// Set a row limit beyond `u32`.
    fn set_large_max_rows(&mut self, max: u64) -> SqlResult<()> {
        let max = u32::try_from(max).map_err(|_| {
            SqlError::FeatureNotSupported("row limits above u32::MAX".to_string())
        })?;
        self.set_max_rows(max)
    }

    /// Row limit as a 64-bit value.
    fn get_large_max_rows(&self) -> SqlResult<u64> {
        self.get_max_rows().map(u64::from)
    }

    /// Batch execution with 64-bit update counts.
    fn execute_large_batch(&mut self) -> SqlResult<Vec<i64>> {
        Err(SqlError::FeatureNotSupported("execute_large_batch".to_string()))
    }

    /// Update with a 64-bit row count.
    fn execute_large_update(&mut self, sql: &str) -> SqlResult<i64> {
        let _ = sql;
        Err(SqlError::FeatureNotSupported("execute_large_update".to_string()))
    }

    /// Large update, requesting generated keys.
    fn execute_large_update_with_keys(
        &mut self,
        sql: &str,
        keys: AutoGeneratedKeys,
    ) -> SqlResult<i64> {
        let _ = (sql, keys);
        Err(SqlError::FeatureNotSupported("execute_large_update".to_string()))
    }

    /// Large update, naming key columns by index.
    fn execute_large_update_with_column_indexes(
        &mut self,
        sql: &str,
        column_indexes: &[u32],
    ) -> SqlResult<i64> {
        let _ = (sql, column_indexes);
        Err(SqlError::FeatureNotSupported("execute_large_update".to_string()))
    }

    /// Large update, naming key columns by name.
    fn execute_large_update_with_column_names(
        &mut self,
        sql: &str,
        column_names: &[&str],
    ) -> SqlResult<i64> {
        let _ = (sql, column_names);
        Err(SqlError::FeatureNotSupported("execute_large_update".to_string()))
    }

    /// Quote a string literal, doubling embedded single quotes.
    fn enquote_literal(&self, val: &str) -> SqlResult<String> {
        Ok(format!("'{}'", val.replace('\'', "''")))
    }

    /// Quote an identifier when needed, or always when `always_quote` is set.
    fn enquote_identifier(&self, identifier: &str, always_quote: bool) -> SqlResult<String> {
        let len = identifier.chars().count();
        if !(1..=128).contains(&len) {
            return Err(SqlError::InvalidArgument(format!(
                "identifier length {} is outside 1..=128",
                len
            )));
        }
        if identifier.len() > 1 && identifier.starts_with('"') && identifier.ends_with('"') {
            let inner = &identifier[1..identifier.len() - 1];
            if inner.contains('"') {
                return Err(SqlError::InvalidArgument(
                    "quoted identifier contains an embedded quote".to_string(),
                ));
            }
            return Ok(identifier.to_string());
        }
        if !always_quote && self.is_simple_identifier(identifier)? {
            return Ok(identifier.to_string());
        }
        if identifier.contains('"') || identifier.contains('\0') {
            return Err(SqlError::InvalidArgument(
                "identifier contains a quote or NUL".to_string(),
            ));
        }
        Ok(format!("\"{}\"", identifier))
    }

    /// Whether `identifier` can be used unquoted.
    fn is_simple_identifier(&self, identifier: &str) -> SqlResult<bool> {
        let mut chars = identifier.chars();
        let starts_alpha = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
        Ok(starts_alpha
            && identifier.chars().count() <= 128
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_'))
    }

    /// Quote a national character literal.
    fn enquote_nchar_literal(&self, val: &str) -> SqlResult<String> {
        Ok(format!("N'{}'", val.replace('\'', "''")))
    }

    /// Whether this resource is, or wraps, a value of type `type_id`.
    fn is_wrapper_for(&self, type_id: TypeId) -> SqlResult<bool> {
        Ok(self.as_any().type_id() == type_id)
    }

    /// The innermost value of type `type_id` reachable from this resource.
    fn unwrap_any(&self, type_id: TypeId) -> SqlResult<&dyn Any> {
        let any = self.as_any();
        if any.type_id() == type_id {
            Ok(any)
        } else {
            Err(SqlError::NotAWrapper("requested type"))
        }
    }
}

/// Typed helpers over [`Statement::unwrap_any`].
pub trait StatementExt: Statement {
    /// Downcast to a concrete wrapped type.
    fn unwrap_as<T: Any>(&self) -> SqlResult<&T> {
        self.unwrap_any(TypeId::of::<T>())?
            .downcast_ref::<T>()
            .ok_or(SqlError::NotAWrapper(std::any::type_name::<T>()))
    }

    /// Whether a value of type `T` is reachable.
    fn wraps<T: Any>(&self) -> SqlResult<bool> {
        self.is_wrapper_for(TypeId::of::<T>())
    }
}

impl<S: Statement + ?Sized> StatementExt for S {}

/// A boxed statement trait object.
pub type BoxedStatement = Box<dyn Statement>;
