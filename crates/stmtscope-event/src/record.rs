//! Event records: the telemetry schema.
//!
//! Serialized field names are consumed by downstream tooling. Renaming or
//! retyping any of them is a schema change.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use stmtscope_core::ResourceId;

use crate::event::SessionId;

/// Kinds of telemetry events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    /// Statement execution.
    Statement,
    /// Connection opening.
    Connection,
    /// Explicit cancellation.
    Cancel,
}

impl EventKind {
    /// All kinds, in schema order.
    pub const ALL: [EventKind; 3] = [EventKind::Statement, EventKind::Connection, EventKind::Cancel];

    /// The serialized name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Statement => "statement",
            EventKind::Connection => "connection",
            EventKind::Cancel => "cancel",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record type carried by an [`Event`](crate::Event).
pub trait EventRecord: fmt::Debug + Default + Send + 'static {
    /// Kind reported for this record.
    const KIND: EventKind;

    /// Field names as serialized, in schema order.
    const FIELDS: &'static [&'static str];

    /// Move into the kind-tagged payload.
    fn into_payload(self) -> EventPayload;
}

/// Metadata for one statement operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementRecord {
    /// SQL text, batch text, or an operation placeholder.
    pub sql: String,
    /// Identifier of the wrapped statement.
    pub statement_id: ResourceId,
    /// Identifier of the owning connection, when known.
    pub connection_id: Option<ResourceId>,
    /// Runtime type of the wrapped statement.
    pub statement_class_name: String,
    /// Closed flag at event creation.
    pub closed: bool,
    /// Poolable hint at event creation.
    pub poolable: bool,
    /// Owning connection's auto-commit flag at event creation.
    pub auto_commit: bool,
}

impl EventRecord for StatementRecord {
    const KIND: EventKind = EventKind::Statement;
    const FIELDS: &'static [&'static str] = &[
        "sql",
        "statementId",
        "connectionId",
        "statementClassName",
        "closed",
        "poolable",
        "autoCommit",
    ];

    fn into_payload(self) -> EventPayload {
        EventPayload::Statement(self)
    }
}

/// Metadata for opening a connection.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRecord {
    /// Connection URL.
    pub url: String,
    /// Runtime type of the opened connection.
    pub connection_class_name: String,
    /// Identifier assigned to the connection.
    pub connection_id: ResourceId,
    /// Identifier of the data source that opened it, if any.
    pub data_source_id: Option<ResourceId>,
    /// Runtime type of the data source, if any.
    pub data_source_class_name: Option<String>,
    /// User the connection was opened for.
    pub user_name: Option<String>,
    /// Credential supplied when opening, if the caller chose to record it.
    pub credential: Option<String>,
}

impl fmt::Debug for ConnectionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRecord")
            .field("url", &self.url)
            .field("connection_class_name", &self.connection_class_name)
            .field("connection_id", &self.connection_id)
            .field("data_source_id", &self.data_source_id)
            .field("data_source_class_name", &self.data_source_class_name)
            .field("user_name", &self.user_name)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl EventRecord for ConnectionRecord {
    const KIND: EventKind = EventKind::Connection;
    const FIELDS: &'static [&'static str] = &[
        "url",
        "connectionClassName",
        "connectionId",
        "dataSourceId",
        "dataSourceClassName",
        "userName",
        "credential",
    ];

    fn into_payload(self) -> EventPayload {
        EventPayload::Connection(self)
    }
}

/// Metadata for a cancellation request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRecord {
    /// Identifier of the owning connection, when known.
    pub connection_id: Option<ResourceId>,
    /// Identifier of the cancelled statement.
    pub statement_id: ResourceId,
}

impl EventRecord for CancelRecord {
    const KIND: EventKind = EventKind::Cancel;
    const FIELDS: &'static [&'static str] = &["connectionId", "statementId"];

    fn into_payload(self) -> EventPayload {
        EventPayload::Cancel(self)
    }
}

/// A record tagged with its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EventPayload {
    /// Statement execution.
    Statement(StatementRecord),
    /// Connection opening.
    Connection(ConnectionRecord),
    /// Explicit cancellation.
    Cancel(CancelRecord),
}

impl EventPayload {
    /// Kind of the carried record.
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Statement(_) => EventKind::Statement,
            EventPayload::Connection(_) => EventKind::Connection,
            EventPayload::Cancel(_) => EventKind::Cancel,
        }
    }
}

/// A committed event, as handed to recorders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedEvent {
    /// Session of the factory that created the event.
    pub session_id: SessionId,
    /// Wall-clock start, milliseconds since the Unix epoch.
    pub started_at: u64,
    /// Time between begin and commit.
    #[serde(rename = "durationNanos", with = "duration_serde")]
    pub duration: Duration,
    /// The record, tagged with its kind.
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl RecordedEvent {
    /// Kind of the carried record.
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// The statement record, if this is a statement event.
    pub fn as_statement(&self) -> Option<&StatementRecord> {
        match &self.payload {
            EventPayload::Statement(record) => Some(record),
            _ => None,
        }
    }

    /// The connection record, if this is a connection event.
    pub fn as_connection(&self) -> Option<&ConnectionRecord> {
        match &self.payload {
            EventPayload::Connection(record) => Some(record),
            _ => None,
        }
    }

    /// The cancel record, if this is a cancel event.
    pub fn as_cancel(&self) -> Option<&CancelRecord> {
        match &self.payload {
            EventPayload::Cancel(record) => Some(record),
            _ => None,
        }
    }
}

/// Custom serde for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // u64 nanoseconds covers ~584 years
        (duration.as_nanos() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let nanos = u64::deserialize(deserializer)?;
        Ok(Duration::from_nanos(nanos))
    }
}
