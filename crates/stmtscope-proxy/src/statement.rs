//! The instrumenting statement decorator.

use std::any::{Any, TypeId};
use std::fmt;

use stmtscope_core::{
    AutoGeneratedKeys, BoxedResultSet, Concurrency, CurrentResult, FetchDirection, Holdability,
    ResourceId, ResultSetType, SharedConnection, SqlResult, SqlWarning, Statement,
};
use stmtscope_event::{Event, SharedEventFactory, StatementRecord, default_factory};

use crate::batch::BatchAccumulator;
use crate::config::ProxyConfig;
use crate::result_set::ResultSetProxy;

/// A [`Statement`] that emits telemetry around every execution.
///
/// Execution, cursor retrieval and batch execution each produce exactly one
/// statement event, committed after the delegate returns or fails. `cancel`
/// produces a cancel event. Everything else forwards untouched, so callers
/// see exactly what the delegate returns or raises.
///
/// # Example
///
/// ```ignore
/// use stmtscope_proxy::StatementProxy;
///
/// let mut stmt = StatementProxy::with_factory(driver_statement, factory);
/// let count = stmt.execute_update("UPDATE t SET x = 1")?;
/// ```
pub struct StatementProxy<S: Statement> {
    delegate: S,
    id: ResourceId,
    connection_id: Option<ResourceId>,
    factory: SharedEventFactory,
    config: ProxyConfig,
    batch: BatchAccumulator,
}

impl<S: Statement> StatementProxy<S> {
    /// Wrap `delegate`, logging events through [`default_factory`].
    ///
    /// Without an explicit connection id, events report the id of the
    /// delegate's connection as returned by
    /// [`Connection::connection_id`](stmtscope_core::Connection::connection_id).
    /// That defaults to `None`, so events over a connection that does not
    /// override it carry no `connectionId`. Use
    /// [`builder`](Self::builder) with
    /// [`connection_id`](StatementProxyBuilder::connection_id) to set one.
    pub fn new(delegate: S) -> Self {
        Self::builder(delegate).build()
    }

    /// Wrap `delegate`, creating events through `factory`.
    ///
    /// Connection ids resolve as for [`new`](Self::new).
    pub fn with_factory(delegate: S, factory: SharedEventFactory) -> Self {
        Self::builder(delegate).factory(factory).build()
    }

    /// Start building a proxy around `delegate`.
    pub fn builder(delegate: S) -> StatementProxyBuilder<S> {
        StatementProxyBuilder::new(delegate)
    }

    /// Identifier reported as `statementId`. Fixed for the proxy's lifetime.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// The wrapped statement.
    pub fn delegate(&self) -> &S {
        &self.delegate
    }

    /// Unwrap, discarding the batch record.
    pub fn into_inner(self) -> S {
        self.delegate
    }

    /// Batch commands queued since the last clear.
    pub fn batch(&self) -> &BatchAccumulator {
        &self.batch
    }

    /// The factory events are created through.
    pub fn factory(&self) -> &SharedEventFactory {
        &self.factory
    }

    /// How operations are described.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    fn best_effort<T>(&self, field: &'static str, read: SqlResult<T>) -> Option<T> {
        match read {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::trace!(
                    statement_id = %self.id,
                    field = field,
                    error = %error,
                    "Statement metadata unavailable"
                );
                None
            }
        }
    }

    fn connection(&self) -> Option<SharedConnection> {
        self.best_effort("connection", self.delegate.get_connection())
            .flatten()
    }

    fn resolve_connection_id(&self, connection: Option<&SharedConnection>) -> Option<ResourceId> {
        self.connection_id
            .or_else(|| connection.and_then(|connection| connection.connection_id()))
    }

    fn statement_event(&self, sql: String) -> Event<StatementRecord> {
        let connection = self.connection();

        let mut event = self.factory.create_statement_event();
        let record = event.record_mut();
        record.sql = sql;
        record.statement_id = self.id;
        record.connection_id = self.resolve_connection_id(connection.as_ref());
        record.statement_class_name = self.delegate.class_name().to_string();
        record.poolable = self
            .best_effort("poolable", self.delegate.is_poolable())
            .unwrap_or_default();
        record.closed = self
            .best_effort("closed", self.delegate.is_closed())
            .unwrap_or_default();
        record.auto_commit = connection
            .and_then(|connection| self.best_effort("autoCommit", connection.get_auto_commit()))
            .unwrap_or_default();
        event
    }

    fn observe<T>(
        &mut self,
        sql: String,
        operation: impl FnOnce(&mut S) -> SqlResult<T>,
    ) -> SqlResult<T> {
        let active = self.statement_event(sql).begin();
        let result = operation(&mut self.delegate);
        active.commit();
        result
    }

    fn wrap_result_set(&self, result_set: BoxedResultSet) -> BoxedResultSet {
        Box::new(ResultSetProxy::new(result_set, self.id))
    }
}

impl<S: Statement> Statement for StatementProxy<S> {
    fn execute_query(&mut self, sql: &str) -> SqlResult<BoxedResultSet> {
        let described = self.config.describe_sql(sql);
        let result_set = self.observe(described, |delegate| delegate.execute_query(sql))?;
        Ok(self.wrap_result_set(result_set))
    }

    fn execute_update(&mut self, sql: &str) -> SqlResult<i32> {
        let described = self.config.describe_sql(sql);
        self.observe(described, |delegate| delegate.execute_update(sql))
    }

    fn execute_update_with_keys(
        &mut self,
        sql: &str,
        keys: AutoGeneratedKeys,
    ) -> SqlResult<i32> {
        let described = self.config.describe_sql(sql);
        self.observe(described, |delegate| {
            delegate.execute_update_with_keys(sql, keys)
        })
    }

    fn execute_update_with_column_indexes(
        &mut self,
        sql: &str,
        column_indexes: &[u32],
    ) -> SqlResult<i32> {
        let described = self.config.describe_sql(sql);
        self.observe(described, |delegate| {
            delegate.execute_update_with_column_indexes(sql, column_indexes)
        })
    }

    fn execute_update_with_column_names(
        &mut self,
        sql: &str,
        column_names: &[&str],
    ) -> SqlResult<i32> {
        let described = self.config.describe_sql(sql);
        self.observe(described, |delegate| {
            delegate.execute_update_with_column_names(sql, column_names)
        })
    }

    fn execute(&mut self, sql: &str) -> SqlResult<bool> {
        let described = self.config.describe_sql(sql);
        self.observe(described, |delegate| delegate.execute(sql))
    }

    fn execute_with_keys(&mut self, sql: &str, keys: AutoGeneratedKeys) -> SqlResult<bool> {
        let described = self.config.describe_sql(sql);
        self.observe(described, |delegate| delegate.execute_with_keys(sql, keys))
    }

    fn execute_with_column_indexes(
        &mut self,
        sql: &str,
        column_indexes: &[u32],
    ) -> SqlResult<bool> {
        let described = self.config.describe_sql(sql);
        self.observe(described, |delegate| {
            delegate.execute_with_column_indexes(sql, column_indexes)
        })
    }

    fn execute_with_column_names(
        &mut self,
        sql: &str,
        column_names: &[&str],
    ) -> SqlResult<bool> {
        let described = self.config.describe_sql(sql);
        self.observe(described, |delegate| {
            delegate.execute_with_column_names(sql, column_names)
        })
    }

    fn get_result_set(&mut self) -> SqlResult<Option<BoxedResultSet>> {
        let label = self.config.result_set_label.clone();
        let result_set = self.observe(label, |delegate| delegate.get_result_set())?;
        Ok(result_set.map(|result_set| self.wrap_result_set(result_set)))
    }

    fn get_generated_keys(&mut self) -> SqlResult<BoxedResultSet> {
        let label = self.config.generated_keys_label.clone();
        let keys = self.observe(label, |delegate| delegate.get_generated_keys())?;
        Ok(self.wrap_result_set(keys))
    }

    fn add_batch(&mut self, sql: &str) -> SqlResult<()> {
        self.batch.push(sql);
        self.delegate.add_batch(sql)
    }

    fn clear_batch(&mut self) -> SqlResult<()> {
        self.batch.clear();
        self.delegate.clear_batch()
    }

    fn execute_batch(&mut self) -> SqlResult<Vec<i32>> {
        let described = self.config.describe_sql(&self.batch.text());
        self.observe(described, |delegate| delegate.execute_batch())
    }

    fn cancel(&self) -> SqlResult<()> {
        let connection = self.connection();

        let mut event = self.factory.create_cancel_event();
        event.record_mut().statement_id = self.id;
        event.record_mut().connection_id = self.resolve_connection_id(connection.as_ref());

        let active = event.begin();
        let result = self.delegate.cancel();
        active.commit();
        result
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn is_wrapper_for(&self, type_id: TypeId) -> SqlResult<bool> {
        if TypeId::of::<Self>() == type_id {
            return Ok(true);
        }
        self.delegate.is_wrapper_for(type_id)
    }

    fn unwrap_any(&self, type_id: TypeId) -> SqlResult<&dyn Any> {
        if TypeId::of::<Self>() == type_id {
            return Ok(self);
        }
        self.delegate.unwrap_any(type_id)
    }

    forward! { delegate =>
        fn close(&mut self) -> SqlResult<()>;
        fn is_closed(&self) -> SqlResult<bool>;
        fn get_max_field_size(&self) -> SqlResult<u32>;
        fn set_max_field_size(&mut self, max: u32) -> SqlResult<()>;
        fn get_max_rows(&self) -> SqlResult<u32>;
        fn set_max_rows(&mut self, max: u32) -> SqlResult<()>;
        fn set_escape_processing(&mut self, enable: bool) -> SqlResult<()>;
        fn get_query_timeout(&self) -> SqlResult<u32>;
        fn set_query_timeout(&mut self, seconds: u32) -> SqlResult<()>;
        fn get_warnings(&self) -> SqlResult<Vec<SqlWarning>>;
        fn clear_warnings(&mut self) -> SqlResult<()>;
        fn set_cursor_name(&mut self, name: &str) -> SqlResult<()>;
        fn get_update_count(&self) -> SqlResult<i32>;
        fn get_more_results(&mut self) -> SqlResult<bool>;
        fn get_more_results_with(&mut self, current: CurrentResult) -> SqlResult<bool>;
        fn set_fetch_direction(&mut self, direction: FetchDirection) -> SqlResult<()>;
        fn get_fetch_direction(&self) -> SqlResult<FetchDirection>;
        fn set_fetch_size(&mut self, rows: u32) -> SqlResult<()>;
        fn get_fetch_size(&self) -> SqlResult<u32>;
        fn get_result_set_concurrency(&self) -> SqlResult<Concurrency>;
        fn get_result_set_type(&self) -> SqlResult<ResultSetType>;
        fn get_connection(&self) -> SqlResult<Option<SharedConnection>>;
        fn get_result_set_holdability(&self) -> SqlResult<Holdability>;
        fn set_poolable(&mut self, poolable: bool) -> SqlResult<()>;
        fn is_poolable(&self) -> SqlResult<bool>;
        fn close_on_completion(&mut self) -> SqlResult<()>;
        fn is_close_on_completion(&self) -> SqlResult<bool>;
        fn class_name(&self) -> &'static str;
        fn get_large_update_count(&self) -> SqlResult<i64>;
        fn set_large_max_rows(&mut self, max: u64) -> SqlResult<()>;
        fn get_large_max_rows(&self) -> SqlResult<u64>;
        fn execute_large_batch(&mut self) -> SqlResult<Vec<i64>>;
        fn execute_large_update(&mut self, sql: &str) -> SqlResult<i64>;
        fn execute_large_update_with_keys(&mut self, sql: &str, keys: AutoGeneratedKeys) -> SqlResult<i64>;
        fn execute_large_update_with_column_indexes(&mut self, sql: &str, column_indexes: &[u32]) -> SqlResult<i64>;
        fn execute_large_update_with_column_names(&mut self, sql: &str, column_names: &[&str]) -> SqlResult<i64>;
        fn enquote_literal(&self, val: &str) -> SqlResult<String>;
        fn enquote_identifier(&self, identifier: &str, always_quote: bool) -> SqlResult<String>;
        fn is_simple_identifier(&self, identifier: &str) -> SqlResult<bool>;
        fn enquote_nchar_literal(&self, val: &str) -> SqlResult<String>;
    }
}

impl<S: Statement> fmt::Debug for StatementProxy<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatementProxy")
            .field("id", &self.id)
            .field("connection_id", &self.connection_id)
            .field("delegate", &self.delegate.class_name())
            .field("batch_len", &self.batch.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`StatementProxy`].
pub struct StatementProxyBuilder<S: Statement> {
    delegate: S,
    factory: Option<SharedEventFactory>,
    config: ProxyConfig,
    connection_id: Option<ResourceId>,
}

impl<S: Statement> StatementProxyBuilder<S> {
    fn new(delegate: S) -> Self {
        Self {
            delegate,
            factory: None,
            config: ProxyConfig::default(),
            connection_id: None,
        }
    }

    /// Create events through `factory` instead of [`default_factory`].
    pub fn factory(mut self, factory: SharedEventFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Describe operations with `config`.
    pub fn config(mut self, config: ProxyConfig) -> Self {
        self.config = config;
        self
    }

    /// Report `id` as the owning connection instead of asking the delegate.
    pub fn connection_id(mut self, id: ResourceId) -> Self {
        self.connection_id = Some(id);
        self
    }

    /// Build the proxy, assigning its identifier.
    pub fn build(self) -> StatementProxy<S> {
        let id = ResourceId::next();
        let factory = self.factory.unwrap_or_else(default_factory);
        tracing::debug!(
            statement_id = %id,
            connection_id = ?self.connection_id.map(|id| id.get()),
            statement_class = self.delegate.class_name(),
            "Wrapping statement"
        );

        StatementProxy {
            batch: BatchAccumulator::new(self.config.batch_separator.clone()),
            delegate: self.delegate,
            id,
            connection_id: self.connection_id,
            factory,
            config: self.config,
        }
    }
}

impl<S: Statement> fmt::Debug for StatementProxyBuilder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatementProxyBuilder")
            .field("delegate", &self.delegate.class_name())
            .field("has_factory", &self.factory.is_some())
            .field("config", &self.config)
            .field("connection_id", &self.connection_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use stmtscope_core::scripted::{
        self, ScriptedConnection, ScriptedResultSet, ScriptedStatement,
    };
    use stmtscope_core::{SqlError, StatementExt, Value};
    use stmtscope_event::{CollectingRecorder, EventKind, RecordingEventFactory};

    use super::*;

    fn instrument(
        delegate: ScriptedStatement,
    ) -> (StatementProxy<ScriptedStatement>, Arc<CollectingRecorder>) {
        let recorder = Arc::new(CollectingRecorder::new(100));
        let factory = RecordingEventFactory::new(recorder.clone()).into_shared();
        (StatementProxy::with_factory(delegate, factory), recorder)
    }

    fn statement_sql(recorder: &CollectingRecorder) -> Vec<String> {
        recorder
            .events()
            .iter()
            .filter_map(|event| event.as_statement().map(|record| record.sql.clone()))
            .collect()
    }

    #[test]
    fn test_update_commits_one_event() {
        let (mut stmt, recorder) =
            instrument(ScriptedStatement::new().with_update("UPDATE t SET x=1", 3));

        assert_eq!(stmt.execute_update("UPDATE t SET x=1").unwrap(), 3);

        let events = recorder.events();
        assert_eq!(events.len(), 1);
        let record = events[0].as_statement().unwrap();
        assert_eq!(record.sql, "UPDATE t SET x=1");
        assert_eq!(record.statement_id, stmt.id());
        assert!(record.statement_class_name.ends_with("ScriptedStatement"));
        assert_eq!(stmt.delegate().call_count("execute_update"), 1);
    }

    #[test]
    fn test_failure_is_returned_after_commit() {
        let error = SqlError::database("42P01", 7, "relation t does not exist");
        let (mut stmt, recorder) =
            instrument(ScriptedStatement::new().with_failure("SELECT * FROM t", error.clone()));

        let result = stmt.execute_query("SELECT * FROM t");

        assert_eq!(result.err(), Some(error));
        assert_eq!(statement_sql(&recorder), ["SELECT * FROM t"]);
    }

    #[test]
    fn test_every_execute_variant_is_observed() {
        let (mut stmt, recorder) = instrument(ScriptedStatement::new().with_update("U", 2));

        assert_eq!(stmt.execute_update_with_keys("U", AutoGeneratedKeys::Return).unwrap(), 2);
        assert_eq!(stmt.execute_update_with_column_indexes("U", &[0]).unwrap(), 2);
        assert_eq!(stmt.execute_update_with_column_names("U", &["id"]).unwrap(), 2);
        assert!(!stmt.execute("U").unwrap());
        assert!(!stmt.execute_with_keys("U", AutoGeneratedKeys::NoReturn).unwrap());
        assert!(!stmt.execute_with_column_indexes("U", &[0]).unwrap());
        assert!(!stmt.execute_with_column_names("U", &["id"]).unwrap());

        assert_eq!(statement_sql(&recorder), vec!["U"; 7]);
    }

    #[test]
    fn test_query_returns_wrapped_cursor() {
        let rows = ScriptedResultSet::new(["id"], [vec![Value::Int(1)], vec![Value::Int(2)]]);
        let (mut stmt, recorder) =
            instrument(ScriptedStatement::new().with_query("SELECT id FROM t", rows));

        let mut rs = stmt.execute_query("SELECT id FROM t").unwrap();
        assert!(rs.next().unwrap());
        assert_eq!(rs.get_i64(0).unwrap(), Some(1));
        assert!(rs.next().unwrap());
        assert!(!rs.next().unwrap());

        assert_eq!(statement_sql(&recorder), ["SELECT id FROM t"]);
    }

    #[test]
    fn test_retrievals_use_labels() {
        let rows = ScriptedResultSet::new(["n"], [vec![Value::Int(5)]]);
        let keys = ScriptedResultSet::new(["id"], [vec![Value::Int(42)]]);
        let (mut stmt, recorder) = instrument(
            ScriptedStatement::new()
                .with_query("SELECT n", rows)
                .with_generated_keys(keys),
        );

        assert!(stmt.execute("SELECT n").unwrap());
        assert!(stmt.get_result_set().unwrap().is_some());
        let mut keys = stmt.get_generated_keys().unwrap();
        assert!(keys.next().unwrap());
        assert_eq!(keys.get_i64(0).unwrap(), Some(42));

        assert_eq!(
            statement_sql(&recorder),
            ["SELECT n", "getResultSet", "getGeneratedKeys"]
        );
    }

    #[test]
    fn test_batch_text() {
        let (mut stmt, recorder) = instrument(ScriptedStatement::new());

        stmt.add_batch("A").unwrap();
        stmt.add_batch("B").unwrap();
        let counts = stmt.execute_batch().unwrap();

        assert_eq!(counts.len(), 2);
        assert_eq!(statement_sql(&recorder), ["A;B;"]);
        assert_eq!(
            stmt.delegate().calls(),
            ["add_batch:A", "add_batch:B", scripted::EXECUTE_BATCH]
        );
    }

    #[test]
    fn test_cleared_batch_is_empty() {
        let (mut stmt, recorder) = instrument(ScriptedStatement::new());

        stmt.add_batch("A").unwrap();
        stmt.clear_batch().unwrap();
        stmt.execute_batch().unwrap();

        assert_eq!(statement_sql(&recorder), [""]);
        assert!(stmt.delegate().pending_batch().is_empty());
        assert_eq!(stmt.delegate().call_count("clear_batch"), 1);
    }

    #[test]
    fn test_batch_kept_locally_when_delegate_rejects() {
        let (mut stmt, _recorder) = instrument(ScriptedStatement::new().with_closed(true));

        assert_eq!(stmt.add_batch("A"), Err(SqlError::Closed));
        assert_eq!(stmt.batch().fragments(), ["A".to_string()]);
    }

    #[test]
    fn test_cancel_on_closed_statement() {
        let connection = ScriptedConnection::new()
            .with_id(ResourceId::from(7))
            .into_shared();
        let (stmt, recorder) = instrument(
            ScriptedStatement::new()
                .with_connection(connection)
                .with_closed(true),
        );

        stmt.cancel().unwrap();

        let cancels = recorder.events_of(EventKind::Cancel);
        assert_eq!(cancels.len(), 1);
        let record = cancels[0].as_cancel().unwrap();
        assert_eq!(record.statement_id, stmt.id());
        assert_eq!(record.connection_id, Some(ResourceId::from(7)));
        assert_eq!(stmt.delegate().call_count(scripted::CANCEL), 1);
    }

    #[test]
    fn test_cancel_failure_still_commits() {
        let error = SqlError::FeatureNotSupported("cancel".to_string());
        let (stmt, recorder) =
            instrument(ScriptedStatement::new().with_failure(scripted::CANCEL, error.clone()));

        assert_eq!(stmt.cancel(), Err(error));
        assert_eq!(recorder.events_of(EventKind::Cancel).len(), 1);
    }

    #[test]
    fn test_statement_id_is_stable_and_distinct() {
        let (mut first, recorder) = instrument(ScriptedStatement::new());
        let second = StatementProxy::new(ScriptedStatement::new());

        first.execute_update("A").unwrap();
        first.execute_update("B").unwrap();

        let ids: Vec<_> = recorder
            .events()
            .iter()
            .map(|event| event.as_statement().unwrap().statement_id)
            .collect();
        assert_eq!(ids, [first.id(), first.id()]);
        assert_ne!(first.id(), second.id());
        assert!(!first.id().is_unassigned());
    }

    #[test]
    fn test_metadata_snapshot() {
        let connection = ScriptedConnection::new()
            .with_id(ResourceId::from(11))
            .with_auto_commit(false)
            .into_shared();
        let (mut stmt, recorder) = instrument(
            ScriptedStatement::new()
                .with_connection(connection)
                .with_poolable(true),
        );

        stmt.execute("SELECT 1").unwrap();

        let events = recorder.events();
        let record = events[0].as_statement().unwrap();
        assert!(record.poolable);
        assert!(!record.closed);
        assert!(!record.auto_commit);
        assert_eq!(record.connection_id, Some(ResourceId::from(11)));
    }

    #[test]
    fn test_metadata_failures_are_swallowed() {
        let connection = ScriptedConnection::new()
            .with_id(ResourceId::from(3))
            .with_failing_reads()
            .into_shared();
        let (mut stmt, recorder) = instrument(
            ScriptedStatement::new()
                .with_update("UPDATE t SET x=1", 1)
                .with_connection(connection)
                .with_failing_metadata(),
        );

        assert_eq!(stmt.execute_update("UPDATE t SET x=1").unwrap(), 1);

        let events = recorder.events();
        let record = events[0].as_statement().unwrap();
        assert!(!record.poolable);
        assert!(!record.closed);
        assert!(!record.auto_commit);
        assert_eq!(record.connection_id, Some(ResourceId::from(3)));
    }

    #[test]
    fn test_builder_connection_override() {
        let recorder = Arc::new(CollectingRecorder::new(10));
        let factory = RecordingEventFactory::new(recorder.clone()).into_shared();
        let connection = ScriptedConnection::new()
            .with_id(ResourceId::from(1))
            .into_shared();

        let mut stmt = StatementProxy::builder(ScriptedStatement::new().with_connection(connection))
            .factory(factory)
            .connection_id(ResourceId::from(99))
            .build();
        stmt.execute_update("DELETE FROM t").unwrap();
        stmt.cancel().unwrap();

        let events = recorder.events();
        assert_eq!(
            events[0].as_statement().unwrap().connection_id,
            Some(ResourceId::from(99))
        );
        assert_eq!(
            events[1].as_cancel().unwrap().connection_id,
            Some(ResourceId::from(99))
        );
    }

    #[test]
    fn test_connection_without_id_needs_override() {
        let recorder = Arc::new(CollectingRecorder::new(10));
        let factory = RecordingEventFactory::new(recorder.clone()).into_shared();
        let connection = ScriptedConnection::new().into_shared();

        let mut plain = StatementProxy::with_factory(
            ScriptedStatement::new().with_connection(Arc::clone(&connection)),
            Arc::clone(&factory),
        );
        let mut pinned =
            StatementProxy::builder(ScriptedStatement::new().with_connection(connection))
                .factory(factory)
                .connection_id(ResourceId::from(5))
                .build();
        plain.execute_update("DELETE FROM t").unwrap();
        plain.cancel().unwrap();
        pinned.execute_update("DELETE FROM t").unwrap();

        let events = recorder.events();
        assert_eq!(events[0].as_statement().unwrap().connection_id, None);
        assert_eq!(events[1].as_cancel().unwrap().connection_id, None);
        assert_eq!(
            events[2].as_statement().unwrap().connection_id,
            Some(ResourceId::from(5))
        );
    }

    #[test]
    fn test_config_shapes_sql() {
        let recorder = Arc::new(CollectingRecorder::new(10));
        let factory = RecordingEventFactory::new(recorder.clone()).into_shared();
        let config = ProxyConfig::new()
            .with_max_sql_length(6)
            .with_batch_separator("\n")
            .with_result_set_label("current");

        let mut stmt = StatementProxy::builder(ScriptedStatement::new())
            .factory(factory)
            .config(config)
            .build();
        stmt.execute_update("UPDATE t SET x=1").unwrap();
        stmt.get_result_set().unwrap();
        stmt.add_batch("A").unwrap();
        stmt.execute_batch().unwrap();

        assert_eq!(statement_sql(&recorder), ["UPDATE", "current", "A\n"]);
    }

    #[test]
    fn test_pass_through_is_silent() {
        let warning = SqlWarning::new("truncated");
        let (mut stmt, recorder) = instrument(
            ScriptedStatement::new()
                .with_update("UPDATE t SET x=1", 3)
                .with_warning(warning.clone()),
        );

        stmt.set_fetch_size(250).unwrap();
        stmt.set_max_rows(10).unwrap();
        stmt.set_query_timeout(30).unwrap();
        stmt.set_poolable(true).unwrap();
        assert_eq!(stmt.get_fetch_size().unwrap(), 250);
        assert_eq!(stmt.get_max_rows().unwrap(), 10);
        assert_eq!(stmt.get_large_max_rows().unwrap(), 10);
        assert_eq!(stmt.get_query_timeout().unwrap(), 30);
        assert!(stmt.is_poolable().unwrap());
        assert_eq!(stmt.get_warnings().unwrap(), vec![warning]);
        assert_eq!(stmt.enquote_literal("it's").unwrap(), "'it''s'");
        assert_eq!(stmt.enquote_identifier("my col", false).unwrap(), "\"my col\"");
        assert!(recorder.is_empty());

        stmt.execute_update("UPDATE t SET x=1").unwrap();
        assert_eq!(stmt.get_update_count().unwrap(), 3);
        assert_eq!(stmt.get_large_update_count().unwrap(), 3);
        assert_eq!(recorder.len(), 1);

        stmt.close().unwrap();
        assert!(stmt.is_closed().unwrap());
        assert_eq!(stmt.execute_update("UPDATE t SET x=1"), Err(SqlError::Closed));
    }

    #[test]
    fn test_pass_through_errors_match_delegate() {
        let (mut stmt, recorder) = instrument(ScriptedStatement::new());
        let mut bare = ScriptedStatement::new();

        assert_eq!(
            stmt.execute_large_update_with_keys("U", AutoGeneratedKeys::Return),
            bare.execute_large_update_with_keys("U", AutoGeneratedKeys::Return)
        );
        assert!(recorder.is_empty());
    }

    #[test]
    fn test_unwrap_reaches_delegate() {
        let inner = StatementProxy::new(ScriptedStatement::new().with_update("U", 4));
        let outer = StatementProxy::new(inner);

        assert!(outer.wraps::<ScriptedStatement>().unwrap());
        assert!(outer.wraps::<StatementProxy<ScriptedStatement>>().unwrap());
        assert!(!outer.wraps::<String>().unwrap());
        assert_eq!(outer.unwrap_as::<ScriptedStatement>().unwrap().call_count("close"), 0);
        assert!(matches!(
            outer.unwrap_as::<String>(),
            Err(SqlError::NotAWrapper(_))
        ));
        assert!(outer.class_name().ends_with("ScriptedStatement"));
    }

    /// Notes how many events were committed when `execute_update` starts.
    struct Peeking {
        inner: ScriptedStatement,
        recorder: Arc<CollectingRecorder>,
        seen: Vec<usize>,
        pause: std::time::Duration,
    }

    impl Statement for Peeking {
        fn execute_update(&mut self, sql: &str) -> SqlResult<i32> {
            self.seen.push(self.recorder.len());
            std::thread::sleep(self.pause);
            self.inner.execute_update(sql)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        forward! { inner =>
            fn execute_query(&mut self, sql: &str) -> SqlResult<BoxedResultSet>;
            fn execute_update_with_keys(&mut self, sql: &str, keys: AutoGeneratedKeys) -> SqlResult<i32>;
            fn execute_update_with_column_indexes(&mut self, sql: &str, column_indexes: &[u32]) -> SqlResult<i32>;
            fn execute_update_with_column_names(&mut self, sql: &str, column_names: &[&str]) -> SqlResult<i32>;
            fn execute(&mut self, sql: &str) -> SqlResult<bool>;
            fn execute_with_keys(&mut self, sql: &str, keys: AutoGeneratedKeys) -> SqlResult<bool>;
            fn execute_with_column_indexes(&mut self, sql: &str, column_indexes: &[u32]) -> SqlResult<bool>;
            fn execute_with_column_names(&mut self, sql: &str, column_names: &[&str]) -> SqlResult<bool>;
            fn get_result_set(&mut self) -> SqlResult<Option<BoxedResultSet>>;
            fn get_generated_keys(&mut self) -> SqlResult<BoxedResultSet>;
            fn add_batch(&mut self, sql: &str) -> SqlResult<()>;
            fn clear_batch(&mut self) -> SqlResult<()>;
            fn execute_batch(&mut self) -> SqlResult<Vec<i32>>;
            fn cancel(&self) -> SqlResult<()>;
            fn close(&mut self) -> SqlResult<()>;
            fn is_closed(&self) -> SqlResult<bool>;
            fn get_max_field_size(&self) -> SqlResult<u32>;
            fn set_max_field_size(&mut self, max: u32) -> SqlResult<()>;
            fn get_max_rows(&self) -> SqlResult<u32>;
            fn set_max_rows(&mut self, max: u32) -> SqlResult<()>;
            fn set_escape_processing(&mut self, enable: bool) -> SqlResult<()>;
            fn get_query_timeout(&self) -> SqlResult<u32>;
            fn set_query_timeout(&mut self, seconds: u32) -> SqlResult<()>;
            fn get_warnings(&self) -> SqlResult<Vec<SqlWarning>>;
            fn clear_warnings(&mut self) -> SqlResult<()>;
            fn set_cursor_name(&mut self, name: &str) -> SqlResult<()>;
            fn get_update_count(&self) -> SqlResult<i32>;
            fn get_more_results(&mut self) -> SqlResult<bool>;
            fn get_more_results_with(&mut self, current: CurrentResult) -> SqlResult<bool>;
            fn set_fetch_direction(&mut self, direction: FetchDirection) -> SqlResult<()>;
            fn get_fetch_direction(&self) -> SqlResult<FetchDirection>;
            fn set_fetch_size(&mut self, rows: u32) -> SqlResult<()>;
            fn get_fetch_size(&self) -> SqlResult<u32>;
            fn get_result_set_concurrency(&self) -> SqlResult<Concurrency>;
            fn get_result_set_type(&self) -> SqlResult<ResultSetType>;
            fn get_connection(&self) -> SqlResult<Option<SharedConnection>>;
            fn get_result_set_holdability(&self) -> SqlResult<Holdability>;
            fn set_poolable(&mut self, poolable: bool) -> SqlResult<()>;
            fn is_poolable(&self) -> SqlResult<bool>;
            fn close_on_completion(&mut self) -> SqlResult<()>;
            fn is_close_on_completion(&self) -> SqlResult<bool>;
        }
    }

    #[test]
    fn test_delegate_runs_between_begin_and_commit() {
        let recorder = Arc::new(CollectingRecorder::new(10));
        let factory = RecordingEventFactory::new(recorder.clone()).into_shared();
        let pause = std::time::Duration::from_millis(20);
        let delegate = Peeking {
            inner: ScriptedStatement::new().with_update("UPDATE t SET x=1", 3),
            recorder: recorder.clone(),
            seen: Vec::new(),
            pause,
        };
        let mut stmt = StatementProxy::with_factory(delegate, factory);

        assert_eq!(stmt.execute_update("UPDATE t SET x=1").unwrap(), 3);

        assert_eq!(stmt.delegate().seen, [0]);
        let events = recorder.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].duration >= pause);
    }

    #[test]
    fn test_failing_retrievals_and_batches_commit_once() {
        let error = SqlError::Scripted("x".to_string());
        let (mut stmt, recorder) = instrument(
            ScriptedStatement::new()
                .with_failure(scripted::EXECUTE_BATCH, error.clone())
                .with_failure(scripted::GET_RESULT_SET, error.clone())
                .with_failure(scripted::GET_GENERATED_KEYS, error.clone()),
        );
        stmt.add_batch("INSERT INTO t VALUES (1)").unwrap();

        assert_eq!(stmt.execute_batch(), Err(error.clone()));
        assert_eq!(recorder.len(), 1);
        assert_eq!(stmt.get_result_set().err(), Some(error.clone()));
        assert_eq!(recorder.len(), 2);
        assert_eq!(stmt.get_generated_keys().err(), Some(error));

        assert_eq!(
            statement_sql(&recorder),
            ["INSERT INTO t VALUES (1);", "getResultSet", "getGeneratedKeys"]
        );
    }

    #[test]
    fn test_boxed_proxy_is_a_statement() {
        let (stmt, recorder) = instrument(ScriptedStatement::new().with_update("U", 1));
        let mut boxed: Box<dyn Statement> = Box::new(stmt);

        assert_eq!(boxed.execute_update("U").unwrap(), 1);
        assert_eq!(recorder.len(), 1);
    }
}
