//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [network] section
    if let Some(section) = ini.section(Some("network")) {
        if let Some(v) = section.get("udp_port") {
            config.network.udp_port =
                parse_value(v, "network", "udp_port", "must be a port number (0-65535)")?;
        }
        if let Some(v) = section.get("buffer_size") {
            let size: usize =
                parse_value(v, "network", "buffer_size", "must be a positive integer")?;
            if size == 0 {
                return Err(invalid("network", "buffer_size", v, "must be greater than 0"));
            }
            config.network.buffer_size = size;
        }
        if let Some(v) = section.get("connection_timeout") {
            config.network.connection_timeout =
                parse_seconds(v, "network", "connection_timeout")?;
        }
    }

    // [recording] section
    if let Some(section) = ini.section(Some("recording")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.recording.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("interval") {
            config.recording.interval = parse_seconds(v, "recording", "interval")?;
        }
        if let Some(v) = section.get("file_prefix") {
            let v = v.trim();
            if v.is_empty() || v.contains(&['/', '\\'][..]) {
                return Err(invalid(
                    "recording",
                    "file_prefix",
                    v,
                    "must be a non-empty name without path separators",
                ));
            }
            config.recording.file_prefix = v.to_string();
        }
    }

    // [pilot] section
    if let Some(section) = ini.section(Some("pilot")) {
        if let Some(v) = section.get("name") {
            config.pilot.name = v.trim().to_string();
        }
        if let Some(v) = section.get("glider_type") {
            config.pilot.glider_type = v.trim().to_string();
        }
        if let Some(v) = section.get("glider_id") {
            config.pilot.glider_id = v.trim().to_string();
        }
        if let Some(v) = section.get("competition_class") {
            let v = v.trim();
            config.pilot.competition_class = (!v.is_empty()).then(|| v.to_string());
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

fn parse_value<T: FromStr>(
    value: &str,
    section: &str,
    key: &str,
    reason: &str,
) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, reason))
}

/// Parse a strictly positive, finite number of seconds.
fn parse_seconds(value: &str, section: &str, key: &str) -> Result<f64, ConfigFileError> {
    let reason = "must be a positive number of seconds";
    let secs: f64 = parse_value(value, section, key, reason)?;
    if positive_duration(secs).is_none() {
        return Err(invalid(section, key, value, reason));
    }
    Ok(secs)
}

/// Convert seconds to a non-zero `Duration`.
///
/// `None` for zero, negative, NaN, or values too large for a `Duration`.
pub fn positive_duration(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|d| !d.is_zero())
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::*;
    use tempfile::TempDir;

    fn load(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");
        std::fs::write(&config_path, content).unwrap();
        ConfigFile::load_from(&config_path)
    }

    #[test]
    fn test_overlay_keeps_unset_defaults() {
        let config = load("[network]\nudp_port = 49010\n").unwrap();

        assert_eq!(config.network.udp_port, 49010);
        assert_eq!(config.network.buffer_size, DEFAULT_UDP_BUFFER_SIZE);
        assert_eq!(config.recording.interval, DEFAULT_RECORDING_INTERVAL_SECS);
        assert_eq!(config.pilot.name, DEFAULT_PILOT_NAME);
    }

    #[test]
    fn test_all_sections() {
        let config = load(
            r#"[network]
udp_port = 49003
buffer_size = 2048
connection_timeout = 2.5

[recording]
directory = /tmp/flights
interval = 0.5
file_prefix = XC

[pilot]
name = Jane Pilot
glider_type = ASK 21
glider_id = D-1234
competition_class = Club

[logging]
file = /tmp/igcbridge.log
"#,
        )
        .unwrap();

        assert_eq!(config.network.udp_port, 49003);
        assert_eq!(config.network.buffer_size, 2048);
        assert_eq!(config.network.connection_timeout, 2.5);
        assert_eq!(config.recording.directory, PathBuf::from("/tmp/flights"));
        assert_eq!(config.recording.interval, 0.5);
        assert_eq!(config.recording.file_prefix, "XC");
        assert_eq!(config.pilot.name, "Jane Pilot");
        assert_eq!(config.pilot.glider_type, "ASK 21");
        assert_eq!(config.pilot.glider_id, "D-1234");
        assert_eq!(config.pilot.competition_class.as_deref(), Some("Club"));
        assert_eq!(config.logging.file, PathBuf::from("/tmp/igcbridge.log"));
    }

    #[test]
    fn test_invalid_port() {
        let result = load("[network]\nudp_port = 70000\n");
        match result {
            Err(ConfigFileError::InvalidValue { section, key, .. }) => {
                assert_eq!(section, "network");
                assert_eq!(key, "udp_port");
            }
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_interval() {
        assert!(load("[recording]\ninterval = 0\n").is_err());
        assert!(load("[recording]\ninterval = -1\n").is_err());
        assert!(load("[recording]\ninterval = fast\n").is_err());
        assert!(load("[network]\nconnection_timeout = NaN\n").is_err());
    }

    #[test]
    fn test_interval_too_large_for_duration() {
        match load("[recording]\ninterval = 1e300\n") {
            Err(ConfigFileError::InvalidValue { section, key, .. }) => {
                assert_eq!(section, "recording");
                assert_eq!(key, "interval");
            }
            other => panic!("expected InvalidValue, got {:?}", other),
        }
        assert!(load("[network]\nconnection_timeout = 1e20\n").is_err());
    }

    #[test]
    fn test_positive_duration() {
        assert_eq!(positive_duration(0.5), Some(Duration::from_millis(500)));
        assert_eq!(positive_duration(0.0), None);
        assert_eq!(positive_duration(-1.0), None);
        assert_eq!(positive_duration(f64::NAN), None);
        assert_eq!(positive_duration(1e300), None);
    }

    #[test]
    fn test_invalid_prefix() {
        assert!(load("[recording]\nfile_prefix = a/b\n").is_err());
        assert!(load("[recording]\nfile_prefix =\n").is_err());
    }

    #[test]
    fn test_empty_competition_class_is_none() {
        let config = load("[pilot]\ncompetition_class =\n").unwrap();
        assert!(config.pilot.competition_class.is_none());
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde("~/flights");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("flights"));
        }
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
    }
}
