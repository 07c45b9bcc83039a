//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::path::PathBuf;

use super::parser::positive_duration;
use crate::recorder::DEFAULT_RECORDING_INTERVAL;
use crate::session::SessionConfig;
use crate::telemetry::TelemetryListenerConfig;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// UDP listener settings
    pub network: NetworkSettings,
    /// Flight log output settings
    pub recording: RecordingSettings,
    /// Default pilot and glider metadata
    pub pilot: PilotSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// UDP listener configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkSettings {
    /// Port the simulator sends telemetry to
    pub udp_port: u16,
    /// Receive buffer size in bytes
    pub buffer_size: usize,
    /// Seconds without data before the connection counts as lost
    pub connection_timeout: f64,
}

/// Flight log output configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSettings {
    /// Directory for new `.igc` files
    pub directory: PathBuf,
    /// Minimum seconds between recorded fixes
    pub interval: f64,
    /// File name prefix
    pub file_prefix: String,
}

/// Pilot and glider metadata written into each log header.
#[derive(Debug, Clone, PartialEq)]
pub struct PilotSettings {
    pub name: String,
    pub glider_type: String,
    pub glider_id: String,
    /// Competition class, omitted from the header when unset
    pub competition_class: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}

impl ConfigFile {
    /// Build the session configuration these settings describe.
    ///
    /// Durations that cannot be represented fall back to their defaults.
    pub fn to_session_config(&self) -> SessionConfig {
        let connection_timeout = positive_duration(self.network.connection_timeout)
            .unwrap_or_else(|| TelemetryListenerConfig::default().connection_timeout);
        let recording_interval =
            positive_duration(self.recording.interval).unwrap_or(DEFAULT_RECORDING_INTERVAL);

        let mut builder = SessionConfig::builder()
            .udp_port(self.network.udp_port)
            .buffer_size(self.network.buffer_size)
            .connection_timeout(connection_timeout)
            .recording_interval(recording_interval)
            .output_dir(self.recording.directory.clone())
            .file_prefix(self.recording.file_prefix.clone())
            .pilot_name(self.pilot.name.clone())
            .glider_type(self.pilot.glider_type.clone())
            .glider_id(self.pilot.glider_id.clone());
        if let Some(class) = &self.pilot.competition_class {
            builder = builder.competition_class(class.clone());
        }
        builder.build()
    }
}
