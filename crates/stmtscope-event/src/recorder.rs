//! Recorders receive committed events.
//!
//! A recorder is the telemetry sink. It is called once per committed event
//! and never reports failure back to the instrumented call.

use std::io::Write;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::record::{EventKind, EventPayload, RecordedEvent};

/// Sink for committed events.
pub trait Recorder: Send + Sync {
    /// Called once for every committed event.
    fn record(&self, event: &RecordedEvent);

    /// Event kinds this recorder wants from an [`EventDispatcher`].
    /// `None` receives every kind.
    fn event_filter(&self) -> Option<Vec<EventKind>> {
        None
    }
}

/// A shared recorder reference.
pub type SharedRecorder = Arc<dyn Recorder>;

/// A recorder that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

impl Recorder for NoopRecorder {
    fn record(&self, _event: &RecordedEvent) {}
}

// tracing macros need a constant level
macro_rules! log_at {
    ($level:expr, $($arg:tt)+) => {{
        let level = $level;
        if level == tracing::Level::ERROR {
            tracing::error!($($arg)+)
        } else if level == tracing::Level::WARN {
            tracing::warn!($($arg)+)
        } else if level == tracing::Level::INFO {
            tracing::info!($($arg)+)
        } else if level == tracing::Level::DEBUG {
            tracing::debug!($($arg)+)
        } else {
            tracing::trace!($($arg)+)
        }
    }};
}

/// A recorder that writes events to `tracing`.
///
/// Credentials on connection events are never logged.
#[derive(Debug, Clone)]
pub struct LoggingRecorder {
    /// Level events are logged at.
    pub log_level: tracing::Level,
}

impl LoggingRecorder {
    /// Create a new logging recorder at `DEBUG`.
    pub fn new() -> Self {
        Self {
            log_level: tracing::Level::DEBUG,
        }
    }

    /// Set the log level.
    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.log_level = level;
        self
    }
}

impl Default for LoggingRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder for LoggingRecorder {
    fn record(&self, event: &RecordedEvent) {
        let duration_us = event.duration.as_micros() as u64;
        match &event.payload {
            EventPayload::Statement(record) => {
                log_at!(
                    self.log_level,
                    event = "statement",
                    session = %event.session_id,
                    statement_id = %record.statement_id,
                    connection_id = ?record.connection_id.map(|id| id.get()),
                    statement_class = %record.statement_class_name,
                    closed = record.closed,
                    poolable = record.poolable,
                    auto_commit = record.auto_commit,
                    duration_us = duration_us,
                    sql = %record.sql,
                    "Statement executed"
                );
            }
            EventPayload::Connection(record) => {
                log_at!(
                    self.log_level,
                    event = "connection",
                    session = %event.session_id,
                    connection_id = %record.connection_id,
                    url = %record.url,
                    connection_class = %record.connection_class_name,
                    data_source_id = ?record.data_source_id.map(|id| id.get()),
                    user = ?record.user_name,
                    duration_us = duration_us,
                    "Connection opened"
                );
            }
            EventPayload::Cancel(record) => {
                log_at!(
                    self.log_level,
                    event = "cancel",
                    session = %event.session_id,
                    statement_id = %record.statement_id,
                    connection_id = ?record.connection_id.map(|id| id.get()),
                    duration_us = duration_us,
                    "Statement cancelled"
                );
            }
        }
    }
}

/// A recorder that keeps events in memory for later inspection.
pub struct CollectingRecorder {
    events: RwLock<Vec<RecordedEvent>>,
    max_events: usize,
}

impl CollectingRecorder {
    /// Create a collector that keeps at most `max_events` events.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            max_events,
        }
    }

    /// Get collected events.
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.read().clone()
    }

    /// Collected events of one kind.
    pub fn events_of(&self, kind: EventKind) -> Vec<RecordedEvent> {
        self.events
            .read()
            .iter()
            .filter(|event| event.kind() == kind)
            .cloned()
            .collect()
    }

    /// Clear collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Get event count.
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

impl Default for CollectingRecorder {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl Recorder for CollectingRecorder {
    fn record(&self, event: &RecordedEvent) {
        let mut events = self.events.write();
        if events.len() < self.max_events {
            events.push(event.clone());
        }
    }
}

impl std::fmt::Debug for CollectingRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectingRecorder")
            .field("len", &self.len())
            .field("max_events", &self.max_events)
            .finish()
    }
}

/// A recorder that writes one JSON object per line.
///
/// Write failures are logged and the event is dropped.
pub struct JsonLinesRecorder<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesRecorder<W> {
    /// Write events to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> Recorder for JsonLinesRecorder<W> {
    fn record(&self, event: &RecordedEvent) {
        let mut writer = self.writer.lock();
        if let Err(error) = write_line(&mut *writer, event) {
            tracing::warn!(
                event = %event.kind(),
                error = %error,
                "Failed to write telemetry event"
            );
        }
    }
}

fn write_line<W: Write>(writer: &mut W, event: &RecordedEvent) -> std::io::Result<()> {
    serde_json::to_writer(&mut *writer, event)?;
    writer.write_all(b"\n")?;
    writer.flush()
}

impl<W: Write + Send> std::fmt::Debug for JsonLinesRecorder<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLinesRecorder").finish_non_exhaustive()
    }
}

/// Fan-out recorder that forwards to every subscribed recorder.
#[derive(Default)]
pub struct EventDispatcher {
    recorders: RwLock<Vec<SharedRecorder>>,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a recorder.
    pub fn subscribe(&self, recorder: SharedRecorder) {
        self.recorders.write().push(recorder);
    }

    /// Remove all recorders.
    pub fn clear_subscribers(&self) {
        self.recorders.write().clear();
    }

    /// Get recorder count.
    pub fn subscriber_count(&self) -> usize {
        self.recorders.read().len()
    }
}

impl Recorder for EventDispatcher {
    fn record(&self, event: &RecordedEvent) {
        let recorders = self.recorders.read();
        for recorder in recorders.iter() {
            if let Some(filter) = recorder.event_filter() {
                if !filter.contains(&event.kind()) {
                    continue;
                }
            }
            recorder.record(event);
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
