//! Session configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::igc::{RecordingMetadata, WriterConfig};
use crate::recorder::RecorderConfig;
use crate::telemetry::TelemetryListenerConfig;

/// Configuration for a recording session.
///
/// Combines the settings of every pipeline component.
///
/// # Example
///
/// ```
/// use igcbridge::session::SessionConfig;
/// use std::time::Duration;
///
/// let config = SessionConfig::builder()
///     .udp_port(49003)
///     .recording_interval(Duration::from_millis(500))
///     .pilot_name("Jane Pilot")
///     .build();
///
/// assert_eq!(config.listener().port, 49003);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    listener: TelemetryListenerConfig,
    recorder: RecorderConfig,
    writer: WriterConfig,
    /// Metadata used for fields a caller leaves empty.
    default_metadata: RecordingMetadata,
}

impl SessionConfig {
    /// Create a new configuration builder.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    pub fn listener(&self) -> &TelemetryListenerConfig {
        &self.listener
    }

    pub fn recorder(&self) -> &RecorderConfig {
        &self.recorder
    }

    pub fn writer(&self) -> &WriterConfig {
        &self.writer
    }

    pub fn default_metadata(&self) -> &RecordingMetadata {
        &self.default_metadata
    }
}

/// Builder for SessionConfig.
#[derive(Debug, Clone, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Set the UDP port to listen on.
    pub fn udp_port(mut self, port: u16) -> Self {
        self.config.listener.port = port;
        self
    }

    /// Set the receive buffer size.
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.listener.buffer_size = size;
        self
    }

    /// Set how long a connection counts as live after the last datagram.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.listener.connection_timeout = timeout;
        self
    }

    /// Set the minimum spacing between recorded fixes.
    pub fn recording_interval(mut self, interval: Duration) -> Self {
        self.config.recorder.recording_interval = interval;
        self
    }

    /// Set the consumer yield between written fixes.
    pub fn consumer_yield(mut self, pause: Duration) -> Self {
        self.config.recorder.consumer_yield = pause;
        self
    }

    /// Set the directory for new flight logs.
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.writer.output_dir = dir.into();
        self
    }

    /// Set the flight log file name prefix.
    pub fn file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.writer.file_prefix = prefix.into();
        self
    }

    pub fn pilot_name(mut self, name: impl Into<String>) -> Self {
        self.config.default_metadata.pilot_name = name.into();
        self
    }

    pub fn glider_type(mut self, glider_type: impl Into<String>) -> Self {
        self.config.default_metadata.glider_type = glider_type.into();
        self
    }

    pub fn glider_id(mut self, glider_id: impl Into<String>) -> Self {
        self.config.default_metadata.glider_id = glider_id.into();
        self
    }

    /// Set the competition class; empty means unknown.
    pub fn competition_class(mut self, class: impl Into<String>) -> Self {
        let class = class.into();
        self.config.default_metadata.competition_class =
            (!class.trim().is_empty()).then_some(class);
        self
    }

    pub fn build(self) -> SessionConfig {
        self.config
    }
}
