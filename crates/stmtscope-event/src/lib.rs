//! stmtscope Events
//!
//! This crate provides the telemetry side of stmtscope:
//!
//! - [`StatementRecord`], [`ConnectionRecord`], [`CancelRecord`]: the
//!   event schema
//! - [`Event`] / [`ActiveEvent`]: the begin/commit lifecycle
//! - [`EventFactory`]: the plug-in point proxies build events through
//! - [`Recorder`]: sinks for committed events
//!
//! # Event Lifecycle
//!
//! ```ignore
//! use stmtscope_event::prelude::*;
//!
//! let mut event = factory.create_statement_event();
//! event.record_mut().sql = sql.to_string();
//! let active = event.begin();
//! let result = run(sql);
//! active.commit();
//! ```
//!
//! # Recording
//!
//! ```ignore
//! use stmtscope_event::{CollectingRecorder, EventDispatcher, LoggingRecorder, RecordingEventFactory};
//! use std::sync::Arc;
//!
//! let dispatcher = Arc::new(EventDispatcher::new());
//! dispatcher.subscribe(Arc::new(LoggingRecorder::new()));
//! dispatcher.subscribe(Arc::new(CollectingRecorder::new(1_000)));
//!
//! let factory = RecordingEventFactory::new(dispatcher).into_shared();
//! ```

pub mod event;
pub mod factory;
pub mod record;
pub mod recorder;

// Re-export main types
pub use event::{ActiveEvent, Event, SessionId};
pub use factory::{EventFactory, RecordingEventFactory, SharedEventFactory, default_factory};
pub use record::{
    CancelRecord, ConnectionRecord, EventKind, EventPayload, EventRecord, RecordedEvent,
    StatementRecord,
};
pub use recorder::{
    CollectingRecorder, EventDispatcher, JsonLinesRecorder, LoggingRecorder, NoopRecorder,
    Recorder, SharedRecorder,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::event::{ActiveEvent, Event};
    pub use crate::factory::{EventFactory, SharedEventFactory, default_factory};
    pub use crate::record::{EventKind, RecordedEvent};
    pub use crate::recorder::{Recorder, SharedRecorder};
}
