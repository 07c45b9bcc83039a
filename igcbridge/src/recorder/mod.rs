//! Recording pipeline between telemetry events and the IGC writer.
//!
//! - [`queue`] - rate limiter and the ordered recording queue
//! - [`FlightRecorder`] - subscribes to telemetry and drives the writer

pub mod queue;
mod orchestrator;

pub use orchestrator::{FlightRecorder, RecorderConfig, RecorderError, RecorderStatus};
pub use queue::{QueuedFix, RateLimiter, DEFAULT_RECORDING_INTERVAL};
