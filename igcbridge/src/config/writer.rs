//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let competition_class = config.pilot.competition_class.as_deref().unwrap_or("");

    format!(
        r#"[network]
; UDP port the simulator sends XGPS/XATT telemetry to.
; In Aerofly FS4 enable "Broadcast flight info to IP address" with this port.
udp_port = {}
; Receive buffer size in bytes (one datagram per read)
buffer_size = {}
; Seconds without a datagram before the simulator counts as disconnected
connection_timeout = {}

[recording]
; Directory for new .igc flight logs (created on demand)
directory = {}
; Minimum seconds between recorded fixes (1.0 = one fix per second)
interval = {}
; File names look like <prefix>_YYYYMMDD_HHMMSS.igc
file_prefix = {}

[pilot]
; Header metadata for new recordings
name = {}
glider_type = {}
glider_id = {}
; Optional, leave empty to omit from the header
competition_class = {}

[logging]
; Log file, cleared at the start of each run
file = {}
"#,
        config.network.udp_port,
        config.network.buffer_size,
        config.network.connection_timeout,
        path_to_string(&config.recording.directory),
        config.recording.interval,
        config.recording.file_prefix,
        config.pilot.name,
        config.pilot.glider_type,
        config.pilot.glider_id,
        competition_class,
        path_to_string(&config.logging.file),
    )
}

/// Convert path to string, using ~ for home directory.
pub(super) fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
