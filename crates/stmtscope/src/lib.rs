//! # stmtscope - Transparent Statement Telemetry
//!
//! stmtscope wraps a database driver's statements so that every execution
//! emits a timed telemetry event, while callers keep seeing exactly what the
//! driver returns.
//!
//! ## Quick Start
//!
//! ```ignore
//! use stmtscope::prelude::*;
//!
//! let collected = Arc::new(CollectingRecorder::default());
//! let instrumentation = Instrumentation::builder()
//!     .with_recorder(collected.clone())
//!     .with_logging(tracing::Level::DEBUG)
//!     .build()?;
//!
//! let connected = instrumentation.connect(&ConnectInfo::new("postgres://db/app"), open_driver)?;
//! let mut stmt = instrumentation.wrap_on(open_statement(&connected.connection)?, connected.id);
//! stmt.execute_update("UPDATE accounts SET frozen = true WHERE id = 7")?;
//!
//! assert_eq!(collected.len(), 2);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     Your Application                     │
//! ├──────────────────────────────────────────────────────────┤
//! │                    stmtscope (facade)                    │
//! │  ┌────────────────┬─────────────────┬─────────────────┐  │
//! │  │ stmtscope-core │ stmtscope-proxy │ stmtscope-event │  │
//! │  │ (contract)     │ (decorators)    │ (events,        │  │
//! │  │                │                 │  recorders)     │  │
//! │  └────────────────┴─────────────────┴─────────────────┘  │
//! ├──────────────────────────────────────────────────────────┤
//! │                       Your Driver                        │
//! └──────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::sync::Arc;

use stmtscope_core::{ResourceId, SqlResult, Statement};
use stmtscope_event::{
    EventDispatcher, LoggingRecorder, RecordingEventFactory, SessionId, SharedEventFactory,
    SharedRecorder, default_factory,
};
use stmtscope_proxy::{ConfigError, ProxyConfig, StatementProxy};

// Re-export from sub-crates
pub use stmtscope_core;
pub use stmtscope_event;
pub use stmtscope_proxy;

/// Builder for an [`Instrumentation`].
pub struct InstrumentationBuilder {
    recorders: Vec<SharedRecorder>,
    logging: Option<tracing::Level>,
    factory: Option<SharedEventFactory>,
    config: ProxyConfig,
    session: Option<SessionId>,
}

impl InstrumentationBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            recorders: Vec::new(),
            logging: None,
            factory: None,
            config: ProxyConfig::default(),
            session: None,
        }
    }

    /// Add a recorder. Every committed event reaches every recorder.
    pub fn with_recorder(mut self, recorder: SharedRecorder) -> Self {
        self.recorders.push(recorder);
        self
    }

    /// Also log committed events through `tracing` at `level`.
    pub fn with_logging(mut self, level: tracing::Level) -> Self {
        self.logging = Some(level);
        self
    }

    /// Create events through a custom factory.
    ///
    /// Cannot be combined with recorders, logging or a session, which only
    /// configure the built-in factory.
    pub fn with_factory(mut self, factory: SharedEventFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Describe operations with `config`.
    pub fn with_config(mut self, config: ProxyConfig) -> Self {
        self.config = config;
        self
    }

    /// Stamp events with `session` instead of a fresh one.
    pub fn with_session(mut self, session: SessionId) -> Self {
        self.session = Some(session);
        self
    }

    /// Build the instrumentation.
    pub fn build(self) -> Result<Instrumentation, InstrumentationError> {
        self.config.validate()?;

        let configures_builtin =
            !self.recorders.is_empty() || self.logging.is_some() || self.session.is_some();
        let factory = match self.factory {
            Some(_) if configures_builtin => return Err(InstrumentationError::ConflictingFactory),
            Some(factory) => factory,
            None if !configures_builtin => default_factory(),
            None => {
                let dispatcher = EventDispatcher::new();
                for recorder in self.recorders {
                    dispatcher.subscribe(recorder);
                }
                if let Some(level) = self.logging {
                    dispatcher.subscribe(Arc::new(LoggingRecorder::new().with_level(level)));
                }
                if dispatcher.subscriber_count() == 0 {
                    dispatcher.subscribe(Arc::new(LoggingRecorder::new()));
                }
                let session = self.session.unwrap_or_default();
                RecordingEventFactory::with_session(Arc::new(dispatcher), session).into_shared()
            }
        };

        Ok(Instrumentation {
            factory,
            config: self.config,
        })
    }
}

impl Default for InstrumentationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InstrumentationBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentationBuilder")
            .field("recorders", &self.recorders.len())
            .field("logging", &self.logging)
            .field("has_factory", &self.factory.is_some())
            .field("config", &self.config)
            .field("session", &self.session)
            .finish()
    }
}

/// Wraps statements and connection openings for one telemetry backend.
#[derive(Clone)]
pub struct Instrumentation {
    factory: SharedEventFactory,
    config: ProxyConfig,
}

impl Instrumentation {
    /// Create an instrumentation builder.
    pub fn builder() -> InstrumentationBuilder {
        InstrumentationBuilder::new()
    }

    /// Instrumentation that logs events through the default factory.
    pub fn with_defaults() -> Self {
        Self {
            factory: default_factory(),
            config: ProxyConfig::default(),
        }
    }

    /// The factory every proxy creates events through.
    pub fn factory(&self) -> &SharedEventFactory {
        &self.factory
    }

    /// The proxy configuration.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Wrap a statement.
    ///
    /// Events report a connection id only if the statement's connection
    /// provides one through `Connection::connection_id`. Prefer
    /// [`wrap_on`](Self::wrap_on) with the id from
    /// [`connect`](Self::connect).
    pub fn wrap<S: Statement>(&self, statement: S) -> StatementProxy<S> {
        StatementProxy::builder(statement)
            .factory(Arc::clone(&self.factory))
            .config(self.config.clone())
            .build()
    }

    /// Wrap a statement opened on the connection identified by `connection_id`.
    pub fn wrap_on<S: Statement>(
        &self,
        statement: S,
        connection_id: ResourceId,
    ) -> StatementProxy<S> {
        StatementProxy::builder(statement)
            .factory(Arc::clone(&self.factory))
            .config(self.config.clone())
            .connection_id(connection_id)
            .build()
    }

    /// Open a connection through `open`, emitting a connection event.
    ///
    /// The event commits whether or not `open` succeeds. On success the
    /// connection is returned together with the identifier its event
    /// reported, for use with [`wrap_on`](Self::wrap_on).
    pub fn connect<C, F>(&self, info: &ConnectInfo, open: F) -> SqlResult<Connected<C>>
    where
        F: FnOnce() -> SqlResult<C>,
    {
        let id = ResourceId::next();

        let mut event = self.factory.create_connection_event();
        let record = event.record_mut();
        record.url = info.url.clone();
        record.connection_class_name = std::any::type_name::<C>().to_string();
        record.connection_id = id;
        record.user_name = info.user_name.clone();
        record.credential = info.credential.clone();
        if let Some(data_source) = &info.data_source {
            record.data_source_id = Some(data_source.id);
            record.data_source_class_name = Some(data_source.class_name.clone());
        }

        let active = event.begin();
        let result = open();
        active.commit();

        match &result {
            Ok(_) => tracing::debug!(connection_id = %id, url = %info.url, "Connection opened"),
            Err(error) => {
                tracing::debug!(connection_id = %id, url = %info.url, error = %error, "Connection failed")
            }
        }
        result.map(|connection| Connected { id, connection })
    }
}

impl fmt::Debug for Instrumentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrumentation")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// What a connection event reports about the connection being opened.
#[derive(Clone, Default)]
pub struct ConnectInfo {
    /// Connection URL.
    pub url: String,
    /// User the connection is opened for.
    pub user_name: Option<String>,
    /// Credential to record. Leave unset to keep it out of telemetry.
    pub credential: Option<String>,
    /// Data source opening the connection.
    pub data_source: Option<DataSourceInfo>,
}

impl ConnectInfo {
    /// Describe a connection to `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Set the user name.
    pub fn with_user(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = Some(user_name.into());
        self
    }

    /// Record the credential in the event.
    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Set the data source opening the connection.
    pub fn with_data_source(mut self, id: ResourceId, class_name: impl Into<String>) -> Self {
        self.data_source = Some(DataSourceInfo {
            id,
            class_name: class_name.into(),
        });
        self
    }
}

impl fmt::Debug for ConnectInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectInfo")
            .field("url", &self.url)
            .field("user_name", &self.user_name)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("data_source", &self.data_source)
            .finish()
    }
}

/// A data source as reported in connection events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSourceInfo {
    /// Identifier of the data source.
    pub id: ResourceId,
    /// Runtime type of the data source.
    pub class_name: String,
}

/// A connection opened through [`Instrumentation::connect`].
#[derive(Debug)]
pub struct Connected<C> {
    /// Identifier reported in the connection event.
    pub id: ResourceId,
    /// The opened connection.
    pub connection: C,
}

impl<C> Connected<C> {
    /// Discard the identifier.
    pub fn into_inner(self) -> C {
        self.connection
    }
}

/// Errors building an [`Instrumentation`].
#[derive(Debug, thiserror::Error)]
pub enum InstrumentationError {
    /// Invalid proxy configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A custom factory was combined with built-in factory settings.
    #[error("a custom event factory cannot be combined with recorders, logging or a session")]
    ConflictingFactory,
}

/// Prelude module for convenient imports.
pub mod prelude {
    // Main types
    pub use crate::{
        ConnectInfo, Connected, Instrumentation, InstrumentationBuilder, InstrumentationError,
    };

    // Contract
    pub use stmtscope_core::{
        BoxedResultSet, Connection, ResourceId, ResultSet, SqlError, SqlResult, Statement,
        StatementExt, Value,
    };

    // Events
    pub use stmtscope_event::{
        CollectingRecorder, EventDispatcher, EventFactory, EventKind, JsonLinesRecorder,
        LoggingRecorder, RecordedEvent, Recorder, RecordingEventFactory, SharedEventFactory,
        SharedRecorder,
    };

    // Proxies
    pub use stmtscope_proxy::{ProxyConfig, ResultSetProxy, StatementProxy};

    // Common std types
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use stmtscope_core::SqlError;
    use stmtscope_core::scripted::{ScriptedConnection, ScriptedStatement};
    use stmtscope_event::{CollectingRecorder, EventKind, NoopRecorder};

    use super::*;

    #[test]
    fn test_builder_defaults() {
        let instrumentation = Instrumentation::builder().build().unwrap();
        assert_eq!(instrumentation.config(), &ProxyConfig::default());

        let mut stmt = instrumentation.wrap(ScriptedStatement::new().with_update("U", 1));
        assert_eq!(stmt.execute_update("U").unwrap(), 1);
    }

    #[test]
    fn test_recorders_receive_events() {
        let first = Arc::new(CollectingRecorder::new(10));
        let second = Arc::new(CollectingRecorder::new(10));
        let session = SessionId::new();
        let instrumentation = Instrumentation::builder()
            .with_recorder(first.clone())
            .with_recorder(second.clone())
            .with_logging(tracing::Level::TRACE)
            .with_session(session)
            .build()
            .unwrap();

        let mut stmt = instrumentation.wrap(ScriptedStatement::new());
        stmt.execute("SELECT 1").unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first.events()[0].session_id, session);
    }

    #[test]
    fn test_factory_conflicts_with_recorders() {
        let factory = RecordingEventFactory::new(Arc::new(NoopRecorder)).into_shared();
        let result = Instrumentation::builder()
            .with_factory(factory)
            .with_recorder(Arc::new(NoopRecorder))
            .build();

        assert!(matches!(result, Err(InstrumentationError::ConflictingFactory)));
    }

    #[test]
    fn test_custom_factory_is_used() {
        let recorder = Arc::new(CollectingRecorder::new(10));
        let factory = RecordingEventFactory::new(recorder.clone()).into_shared();
        let instrumentation = Instrumentation::builder()
            .with_factory(factory)
            .build()
            .unwrap();

        instrumentation.wrap(ScriptedStatement::new()).cancel().unwrap();

        assert_eq!(recorder.events_of(EventKind::Cancel).len(), 1);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = Instrumentation::builder()
            .with_config(ProxyConfig::new().with_max_sql_length(0))
            .build();

        assert!(matches!(
            result,
            Err(InstrumentationError::Config(ConfigError::ZeroSqlLength))
        ));
    }

    #[test]
    fn test_connect_emits_connection_event() {
        let recorder = Arc::new(CollectingRecorder::new(10));
        let instrumentation = Instrumentation::builder()
            .with_recorder(recorder.clone())
            .build()
            .unwrap();
        let data_source = ResourceId::next();
        let info = ConnectInfo::new("postgres://db/app")
            .with_user("app")
            .with_data_source(data_source, "PoolingDataSource");

        let connected = instrumentation
            .connect(&info, || Ok(ScriptedConnection::new()))
            .unwrap();

        let events = recorder.events();
        assert_eq!(events.len(), 1);
        let record = events[0].as_connection().unwrap();
        assert_eq!(record.url, "postgres://db/app");
        assert_eq!(record.connection_id, connected.id);
        assert!(record.connection_class_name.ends_with("ScriptedConnection"));
        assert_eq!(record.user_name.as_deref(), Some("app"));
        assert_eq!(record.credential, None);
        assert_eq!(record.data_source_id, Some(data_source));
        assert_eq!(record.data_source_class_name.as_deref(), Some("PoolingDataSource"));
    }

    #[test]
    fn test_connect_failure_commits() {
        let recorder = Arc::new(CollectingRecorder::new(10));
        let instrumentation = Instrumentation::builder()
            .with_recorder(recorder.clone())
            .build()
            .unwrap();
        let info = ConnectInfo::new("postgres://db/app").with_credential("hunter2");

        let result = instrumentation.connect::<ScriptedConnection, _>(&info, || {
            Err(SqlError::database("28P01", 0, "password authentication failed"))
        });

        assert_eq!(result.unwrap_err().sql_state(), Some("28P01"));
        let events = recorder.events();
        assert_eq!(
            events[0].as_connection().unwrap().credential.as_deref(),
            Some("hunter2")
        );
        assert!(!format!("{:?}", info).contains("hunter2"));
    }

    #[test]
    fn test_statements_report_connection() {
        let recorder = Arc::new(CollectingRecorder::new(10));
        let instrumentation = Instrumentation::builder()
            .with_recorder(recorder.clone())
            .build()
            .unwrap();

        let connected = instrumentation
            .connect(&ConnectInfo::new("mem://"), || {
                Ok(ScriptedConnection::new().into_shared())
            })
            .unwrap();
        let delegate = ScriptedStatement::new().with_connection(connected.connection.clone());
        let mut stmt = instrumentation.wrap_on(delegate, connected.id);
        stmt.execute_update("DELETE FROM t").unwrap();

        let statements = recorder.events_of(EventKind::Statement);
        assert_eq!(
            statements[0].as_statement().unwrap().connection_id,
            Some(connected.id)
        );
        assert!(statements[0].as_statement().unwrap().auto_commit);
    }

    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;

        let instrumentation = Instrumentation::with_defaults();
        let _stmt: StatementProxy<_> = instrumentation.wrap(ScriptedStatement::new());
    }
}
