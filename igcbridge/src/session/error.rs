//! Session error types.

use std::fmt;

use crate::igc::WriterError;
use crate::recorder::RecorderError;
use crate::telemetry::TelemetryError;

/// Errors that can occur during session operations.
#[derive(Debug)]
pub enum SessionError {
    /// The session has not been started
    NotRunning,
    /// `start()` called on a running session
    AlreadyRunning,
    /// UDP listener failed
    Telemetry(TelemetryError),
    /// Recorder failed (including writer errors)
    Recorder(RecorderError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRunning => write!(f, "Session not running"),
            Self::AlreadyRunning => write!(f, "Session already running"),
            Self::Telemetry(e) => write!(f, "Telemetry error: {}", e),
            Self::Recorder(e) => write!(f, "Recorder error: {}", e),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Telemetry(e) => Some(e),
            Self::Recorder(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TelemetryError> for SessionError {
    fn from(e: TelemetryError) -> Self {
        Self::Telemetry(e)
    }
}

impl From<RecorderError> for SessionError {
    fn from(e: RecorderError) -> Self {
        Self::Recorder(e)
    }
}

impl From<WriterError> for SessionError {
    fn from(e: WriterError) -> Self {
        Self::Recorder(RecorderError::Writer(e))
    }
}
