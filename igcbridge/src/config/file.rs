//! Configuration file handling for ~/.igcbridge/config.ini.
//!
//! Loads and saves user configuration with sensible defaults.
//! Settings structs live in [`super::settings`], constants in [`super::defaults`],
//! parsing in [`super::parser`], and serialization in [`super::writer`].

use ini::Ini;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::settings::ConfigFile;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

impl ConfigFile {
    /// Load configuration from the default path (~/.igcbridge/config.ini).
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load() -> Result<Self, ConfigFileError> {
        let path = config_file_path();
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Save configuration to the default path (~/.igcbridge/config.ini).
    pub fn save(&self) -> Result<(), ConfigFileError> {
        let path = config_file_path();
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        let content = super::writer::to_config_string(self);
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Create the default config file if it doesn't exist.
    ///
    /// Returns the path to the config file.
    pub fn ensure_exists() -> Result<PathBuf, ConfigFileError> {
        let path = config_file_path();
        if !path.exists() {
            Self::default().save_to(&path)?;
        }
        Ok(path)
    }
}

/// Get the path to the config directory (~/.igcbridge).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".igcbridge")
}

/// Get the path to the config file (~/.igcbridge/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default();

        assert_eq!(config.network.udp_port, 49002);
        assert_eq!(config.network.buffer_size, 1024);
        assert_eq!(config.network.connection_timeout, 5.0);
        assert_eq!(config.recording.interval, 1.0);
        assert_eq!(config.recording.file_prefix, "AEROFLY");
        assert!(config.recording.directory.ends_with("AeroflyIGC"));
        assert_eq!(config.pilot.glider_id, "SIM");
        assert!(config.pilot.competition_class.is_none());
        assert!(config.logging.file.ends_with(".igcbridge/igcbridge.log"));
    }

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.ini");

        let config = ConfigFile::load_from(&config_path).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_to_session_config() {
        let mut config = ConfigFile::default();
        config.network.udp_port = 49005;
        config.recording.interval = 0.5;
        config.pilot.competition_class = Some("Open".to_string());

        let session = config.to_session_config();
        assert_eq!(session.listener().port, 49005);
        assert_eq!(session.listener().connection_timeout, Duration::from_secs(5));
        assert_eq!(
            session.recorder().recording_interval,
            Duration::from_millis(500)
        );
        assert_eq!(session.writer().output_dir, config.recording.directory);
        assert_eq!(
            session.default_metadata().competition_class.as_deref(),
            Some("Open")
        );
    }

    #[test]
    fn test_to_session_config_unrepresentable_durations_use_defaults() {
        let mut config = ConfigFile::default();
        config.recording.interval = 1e300;
        config.network.connection_timeout = f64::NAN;

        let session = config.to_session_config();
        assert_eq!(session.recorder().recording_interval, Duration::from_secs(1));
        assert_eq!(session.listener().connection_timeout, Duration::from_secs(5));
    }
}
