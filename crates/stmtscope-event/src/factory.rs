//! Event factories.
//!
//! A factory decides which recorder an event is committed to. Proxies only
//! ever see the [`EventFactory`] trait, so the telemetry backend can be
//! swapped without touching them.

use std::fmt;
use std::sync::Arc;

use crate::event::{Event, SessionId};
use crate::record::{CancelRecord, ConnectionRecord, EventRecord, StatementRecord};
use crate::recorder::{LoggingRecorder, SharedRecorder};

/// Builds fresh, unbegun events.
pub trait EventFactory: Send + Sync {
    /// A statement execution event.
    fn create_statement_event(&self) -> Event<StatementRecord>;

    /// A connection opening event.
    fn create_connection_event(&self) -> Event<ConnectionRecord>;

    /// A cancellation event.
    fn create_cancel_event(&self) -> Event<CancelRecord>;
}

/// A shared factory reference.
pub type SharedEventFactory = Arc<dyn EventFactory>;

/// Factory whose events commit to a single recorder.
#[derive(Clone)]
pub struct RecordingEventFactory {
    recorder: SharedRecorder,
    session: SessionId,
}

impl RecordingEventFactory {
    /// Create a factory recording to `recorder` under a new session.
    pub fn new(recorder: SharedRecorder) -> Self {
        Self::with_session(recorder, SessionId::new())
    }

    /// Create a factory recording to `recorder` under `session`.
    pub fn with_session(recorder: SharedRecorder, session: SessionId) -> Self {
        Self { recorder, session }
    }

    /// Session stamped on every event.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// The recorder events commit to.
    pub fn recorder(&self) -> &SharedRecorder {
        &self.recorder
    }

    /// Wrap in an `Arc`.
    pub fn into_shared(self) -> SharedEventFactory {
        Arc::new(self)
    }

    fn create<R: EventRecord>(&self) -> Event<R> {
        Event::new(Arc::clone(&self.recorder), self.session)
    }
}

impl EventFactory for RecordingEventFactory {
    fn create_statement_event(&self) -> Event<StatementRecord> {
        self.create()
    }

    fn create_connection_event(&self) -> Event<ConnectionRecord> {
        self.create()
    }

    fn create_cancel_event(&self) -> Event<CancelRecord> {
        self.create()
    }
}

impl fmt::Debug for RecordingEventFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingEventFactory")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

/// The factory used when none is supplied.
///
/// Each call builds a new factory that logs events through `tracing` at
/// `DEBUG` under its own session. Nothing is cached in a global, so two
/// calls never share state.
pub fn default_factory() -> SharedEventFactory {
    RecordingEventFactory::new(Arc::new(LoggingRecorder::new())).into_shared()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::EventKind;
    use crate::recorder::CollectingRecorder;

    #[test]
    fn test_factory_builds_each_kind() {
        let recorder = Arc::new(CollectingRecorder::new(10));
        let factory = RecordingEventFactory::new(recorder.clone());

        factory.create_statement_event().begin().commit();
        factory.create_connection_event().begin().commit();
        factory.create_cancel_event().begin().commit();

        let kinds: Vec<_> = recorder.events().iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, EventKind::ALL);
    }

    #[test]
    fn test_factory_stamps_session() {
        let recorder = Arc::new(CollectingRecorder::new(10));
        let session = SessionId::new();
        let factory = RecordingEventFactory::with_session(recorder.clone(), session);

        factory.create_statement_event().begin().commit();
        factory.create_statement_event().begin().commit();

        assert!(recorder.events().iter().all(|e| e.session_id == session));
        assert_eq!(factory.session(), session);
    }

    #[test]
    fn test_events_are_fresh() {
        let factory = RecordingEventFactory::new(Arc::new(CollectingRecorder::new(1)));

        let mut first = factory.create_statement_event();
        first.record_mut().sql = "SELECT 1".to_string();
        let second = factory.create_statement_event();

        assert!(second.record().sql.is_empty());
    }

    #[test]
    fn test_default_factories_are_independent() {
        let a = default_factory();
        let b = default_factory();
        assert!(!Arc::ptr_eq(&a, &b));
        a.create_statement_event().begin().commit();
    }
}
