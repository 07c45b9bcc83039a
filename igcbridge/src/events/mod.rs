//! Event notification fabric.
//!
//! Components never call each other for notifications. Instead they publish
//! [`Event`]s on a shared [`EventBus`] and subscribe to the kinds they care
//! about:
//!
//! | Kind | Published by | Payload |
//! |------|--------------|---------|
//! | `ConnectionEstablished` | listener | `type`, `port` |
//! | `ConnectionLost` | listener | `port` |
//! | `DataReceived` | listener | `data`, `raw`, `source` |
//! | `RecordingStarted` | writer | `filename`, `pilot_name`, `glider_type`, `glider_id`, `start_time` |
//! | `RecordingStopped` | writer | `filename`, `fix_count`, `duration_seconds`, `end_time` |
//! | `PositionAdded` | writer | `fix_count`, `position` |
//! | `ErrorOccurred` | any | `error`, plus context |
//! | `ShutdownRequested` | session | (empty) |
//! | `SettingsChanged` | session | changed settings |

mod bus;
mod event;

pub use bus::{EventBus, Handler, HandlerError, HandlerResult, DEFAULT_HISTORY_LIMIT};
pub use event::{
    Event, EventKind, SOURCE_LISTENER, SOURCE_ORCHESTRATOR, SOURCE_SESSION, SOURCE_WRITER,
};
