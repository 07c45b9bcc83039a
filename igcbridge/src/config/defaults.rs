//! Default values for all configuration settings.
//!
//! Contains all `DEFAULT_*` constants and the `ConfigFile::default()`
//! implementation.

use std::path::PathBuf;

use super::file::config_directory;
use super::settings::*;
use crate::igc::{default_output_dir, DEFAULT_FILE_PREFIX};
use crate::telemetry::{DEFAULT_BUFFER_SIZE, DEFAULT_PORT};

// =============================================================================
// Network
// =============================================================================

/// Default UDP port for simulator telemetry.
pub const DEFAULT_UDP_PORT: u16 = DEFAULT_PORT;

/// Default receive buffer size in bytes.
pub const DEFAULT_UDP_BUFFER_SIZE: usize = DEFAULT_BUFFER_SIZE;

/// Seconds without a datagram before the connection counts as lost.
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: f64 = 5.0;

// =============================================================================
// Recording
// =============================================================================

/// Minimum seconds between recorded fixes.
pub const DEFAULT_RECORDING_INTERVAL_SECS: f64 = 1.0;

pub const DEFAULT_RECORDING_PREFIX: &str = DEFAULT_FILE_PREFIX;

// =============================================================================
// Pilot
// =============================================================================

pub const DEFAULT_PILOT_NAME: &str = "Simulator Pilot";
pub const DEFAULT_GLIDER_TYPE: &str = "Aerofly FS4";
pub const DEFAULT_GLIDER_ID: &str = "SIM";

// =============================================================================
// Logging
// =============================================================================

/// Log file name inside the config directory.
pub const DEFAULT_LOG_FILE_NAME: &str = "igcbridge.log";

/// Default directory for new flight logs.
pub fn default_recording_directory() -> PathBuf {
    default_output_dir()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            network: NetworkSettings {
                udp_port: DEFAULT_UDP_PORT,
                buffer_size: DEFAULT_UDP_BUFFER_SIZE,
                connection_timeout: DEFAULT_CONNECTION_TIMEOUT_SECS,
            },
            recording: RecordingSettings {
                directory: default_recording_directory(),
                interval: DEFAULT_RECORDING_INTERVAL_SECS,
                file_prefix: DEFAULT_RECORDING_PREFIX.to_string(),
            },
            pilot: PilotSettings {
                name: DEFAULT_PILOT_NAME.to_string(),
                glider_type: DEFAULT_GLIDER_TYPE.to_string(),
                glider_id: DEFAULT_GLIDER_ID.to_string(),
                competition_class: None,
            },
            logging: LoggingSettings {
                file: config_directory().join(DEFAULT_LOG_FILE_NAME),
            },
        }
    }
}
