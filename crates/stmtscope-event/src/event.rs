//! The two-phase event lifecycle.
//!
//! An [`Event`] starts out editable. [`Event::begin`] freezes its record and
//! starts the clock, returning an [`ActiveEvent`]. The active event commits
//! exactly once: explicitly through [`ActiveEvent::commit`], or on drop if
//! the owning scope exits any other way (early return, `?`, unwinding).
//! Committing an event that was never begun cannot be expressed.

use std::fmt;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::{EventKind, EventRecord, RecordedEvent};
use crate::recorder::SharedRecorder;

/// Identifier of one observation session.
///
/// Every event created by the same factory carries the same session id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A created, not yet begun event.
pub struct Event<R: EventRecord> {
    record: R,
    recorder: SharedRecorder,
    session: SessionId,
}

impl<R: EventRecord> Event<R> {
    /// Create an event with an empty record.
    pub fn new(recorder: SharedRecorder, session: SessionId) -> Self {
        Self {
            record: R::default(),
            recorder,
            session,
        }
    }

    /// Kind of this event.
    pub fn kind(&self) -> EventKind {
        R::KIND
    }

    /// The record.
    pub fn record(&self) -> &R {
        &self.record
    }

    /// The record, for population before [`begin`](Self::begin).
    pub fn record_mut(&mut self) -> &mut R {
        &mut self.record
    }

    /// Start timing. The record can no longer be changed.
    pub fn begin(self) -> ActiveEvent<R> {
        ActiveEvent {
            record: self.record,
            recorder: self.recorder,
            session: self.session,
            started: Instant::now(),
            started_at: SystemTime::now(),
            committed: false,
        }
    }
}

impl<R: EventRecord> fmt::Debug for Event<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("kind", &R::KIND)
            .field("session", &self.session)
            .field("record", &self.record)
            .finish()
    }
}

/// A begun event. Commits on [`commit`](Self::commit) or drop.
#[must_use = "dropping an active event commits it immediately"]
pub struct ActiveEvent<R: EventRecord> {
    record: R,
    recorder: SharedRecorder,
    session: SessionId,
    started: Instant,
    started_at: SystemTime,
    committed: bool,
}

impl<R: EventRecord> ActiveEvent<R> {
    /// The frozen record.
    pub fn record(&self) -> &R {
        &self.record
    }

    /// Time since [`Event::begin`].
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Stop timing and hand the event to the recorder.
    pub fn commit(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if self.committed {
            return;
        }
        self.committed = true;

        let started_at = self
            .started_at
            .duration_since(UNIX_EPOCH)
            .map(|since| since.as_millis() as u64)
            .unwrap_or(0);
        let event = RecordedEvent {
            session_id: self.session,
            started_at,
            duration: self.started.elapsed(),
            payload: std::mem::take(&mut self.record).into_payload(),
        };
        self.recorder.record(&event);
    }
}

impl<R: EventRecord> Drop for ActiveEvent<R> {
    fn drop(&mut self) {
        self.finish();
    }
}

impl<R: EventRecord> fmt::Debug for ActiveEvent<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveEvent")
            .field("kind", &R::KIND)
            .field("session", &self.session)
            .field("record", &self.record)
            .field("elapsed", &self.elapsed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::panic::AssertUnwindSafe;
    use std::sync::Arc;

    use stmtscope_core::ResourceId;

    use super::*;
    use crate::record::{CancelRecord, StatementRecord};
    use crate::recorder::CollectingRecorder;

    #[test]
    fn test_commit_hands_record_to_recorder() {
        let recorder = Arc::new(CollectingRecorder::new(16));
        let session = SessionId::new();

        let mut event = Event::<StatementRecord>::new(recorder.clone(), session);
        event.record_mut().sql = "SELECT 1".to_string();
        let active = event.begin();
        assert!(recorder.is_empty());
        active.commit();

        let events = recorder.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].session_id, session);
        assert_eq!(events[0].as_statement().unwrap().sql, "SELECT 1");
    }

    #[test]
    fn test_drop_commits_once() {
        let recorder = Arc::new(CollectingRecorder::new(16));

        {
            let mut event = Event::<CancelRecord>::new(recorder.clone(), SessionId::new());
            event.record_mut().statement_id = ResourceId::from(3);
            let _active = event.begin();
        }

        assert_eq!(recorder.len(), 1);
        assert_eq!(
            recorder.events()[0].as_cancel().unwrap().statement_id,
            ResourceId::from(3)
        );
    }

    #[test]
    fn test_commits_during_unwind() {
        let recorder = Arc::new(CollectingRecorder::new(16));
        let inner = recorder.clone();

        let result = std::panic::catch_unwind(AssertUnwindSafe(move || {
            let _active = Event::<StatementRecord>::new(inner, SessionId::new()).begin();
            panic!("delegate blew up");
        }));

        assert!(result.is_err());
        assert_eq!(recorder.len(), 1);
    }

    #[test]
    fn test_duration_covers_active_phase() {
        let recorder = Arc::new(CollectingRecorder::new(16));
        let active = Event::<StatementRecord>::new(recorder.clone(), SessionId::new()).begin();
        std::thread::sleep(Duration::from_millis(5));
        active.commit();

        assert!(recorder.events()[0].duration >= Duration::from_millis(5));
    }

    #[test]
    fn test_new_event_record_is_empty() {
        let recorder = Arc::new(CollectingRecorder::new(1));
        let event = Event::<StatementRecord>::new(recorder, SessionId::new());
        assert_eq!(event.kind(), EventKind::Statement);
        assert_eq!(event.record(), &StatementRecord::default());
    }
}
