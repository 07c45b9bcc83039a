//! Event value types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Source label used by the telemetry listener.
pub const SOURCE_LISTENER: &str = "listener";

/// Source label used by the IGC writer.
pub const SOURCE_WRITER: &str = "writer";

/// Source label used by the recorder orchestrator.
pub const SOURCE_ORCHESTRATOR: &str = "orchestrator";

/// Source label used by the session facade.
pub const SOURCE_SESSION: &str = "session";

/// Sources whose `ErrorOccurred` events indicate a broken pipeline.
const CRITICAL_SOURCES: &[&str] = &[
    SOURCE_LISTENER,
    SOURCE_WRITER,
    SOURCE_ORCHESTRATOR,
    SOURCE_SESSION,
];

/// Kinds of events carried by the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ConnectionEstablished,
    ConnectionLost,
    DataReceived,
    RecordingStarted,
    RecordingStopped,
    PositionAdded,
    ErrorOccurred,
    ShutdownRequested,
    SettingsChanged,
}

impl EventKind {
    /// All event kinds, in declaration order.
    pub fn all() -> &'static [EventKind] {
        &[
            Self::ConnectionEstablished,
            Self::ConnectionLost,
            Self::DataReceived,
            Self::RecordingStarted,
            Self::RecordingStopped,
            Self::PositionAdded,
            Self::ErrorOccurred,
            Self::ShutdownRequested,
            Self::SettingsChanged,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ConnectionEstablished => "connection_established",
            Self::ConnectionLost => "connection_lost",
            Self::DataReceived => "data_received",
            Self::RecordingStarted => "recording_started",
            Self::RecordingStopped => "recording_stopped",
            Self::PositionAdded => "position_added",
            Self::ErrorOccurred => "error_occurred",
            Self::ShutdownRequested => "shutdown_requested",
            Self::SettingsChanged => "settings_changed",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An immutable notification published on the [`EventBus`](super::EventBus).
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    id: Uuid,
    kind: EventKind,
    payload: Map<String, Value>,
    source: Option<String>,
    timestamp: DateTime<Utc>,
}

impl Event {
    /// Create an event stamped with a fresh id and the current time.
    pub fn new(kind: EventKind, payload: Map<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            payload,
            source: None,
            timestamp: Utc::now(),
        }
    }

    /// Create an event with an empty payload.
    pub fn empty(kind: EventKind) -> Self {
        Self::new(kind, Map::new())
    }

    /// Attach a source label.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Build an event from a JSON object value.
    ///
    /// Non-object values are stored under a `"value"` key.
    pub fn from_value(kind: EventKind, payload: Value) -> Self {
        let payload = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        Self::new(kind, payload)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Look up a single payload entry.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Whether this is an error raised by one of the pipeline components.
    pub fn is_critical_error(&self) -> bool {
        self.kind == EventKind::ErrorOccurred
            && self
                .source
                .as_deref()
                .is_some_and(|s| CRITICAL_SOURCES.contains(&s))
    }
}
