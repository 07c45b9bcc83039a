//! Typed configuration keys for `igcbridge config get/set`.
//!
//! Each [`ConfigKey`] maps a `section.key` name to a field of [`ConfigFile`]
//! and carries the specification its values must satisfy.

use std::str::FromStr;

use thiserror::Error;

use super::settings::ConfigFile;
use super::parser::{expand_tilde, positive_duration};
use super::writer::path_to_string;

/// Errors from key lookup or value validation.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigKeyError {
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    #[error("Invalid value for {key}: {reason}")]
    ValidationFailed { key: String, reason: String },
}

/// A supported configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    NetworkUdpPort,
    NetworkBufferSize,
    NetworkConnectionTimeout,
    RecordingDirectory,
    RecordingInterval,
    RecordingFilePrefix,
    PilotName,
    PilotGliderType,
    PilotGliderId,
    PilotCompetitionClass,
    LoggingFile,
}

impl FromStr for ConfigKey {
    type Err = ConfigKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "network.udp_port" => Ok(ConfigKey::NetworkUdpPort),
            "network.buffer_size" => Ok(ConfigKey::NetworkBufferSize),
            "network.connection_timeout" => Ok(ConfigKey::NetworkConnectionTimeout),
            "recording.directory" => Ok(ConfigKey::RecordingDirectory),
            "recording.interval" => Ok(ConfigKey::RecordingInterval),
            "recording.file_prefix" => Ok(ConfigKey::RecordingFilePrefix),
            "pilot.name" => Ok(ConfigKey::PilotName),
            "pilot.glider_type" => Ok(ConfigKey::PilotGliderType),
            "pilot.glider_id" => Ok(ConfigKey::PilotGliderId),
            "pilot.competition_class" => Ok(ConfigKey::PilotCompetitionClass),
            "logging.file" => Ok(ConfigKey::LoggingFile),
            _ => Err(ConfigKeyError::UnknownKey(s.to_string())),
        }
    }
}

impl ConfigKey {
    /// Get the canonical key name (e.g., "recording.interval").
    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::NetworkUdpPort => "network.udp_port",
            ConfigKey::NetworkBufferSize => "network.buffer_size",
            ConfigKey::NetworkConnectionTimeout => "network.connection_timeout",
            ConfigKey::RecordingDirectory => "recording.directory",
            ConfigKey::RecordingInterval => "recording.interval",
            ConfigKey::RecordingFilePrefix => "recording.file_prefix",
            ConfigKey::PilotName => "pilot.name",
            ConfigKey::PilotGliderType => "pilot.glider_type",
            ConfigKey::PilotGliderId => "pilot.glider_id",
            ConfigKey::PilotCompetitionClass => "pilot.competition_class",
            ConfigKey::LoggingFile => "logging.file",
        }
    }

    /// Get the section name (e.g., "recording").
    pub fn section(&self) -> &'static str {
        self.name().split('.').next().unwrap_or("")
    }

    /// Get the key name within the section (e.g., "interval").
    pub fn key_name(&self) -> &'static str {
        self.name().split('.').nth(1).unwrap_or(self.name())
    }

    /// Get the value from a config file as a string.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::NetworkUdpPort => config.network.udp_port.to_string(),
            ConfigKey::NetworkBufferSize => config.network.buffer_size.to_string(),
            ConfigKey::NetworkConnectionTimeout => config.network.connection_timeout.to_string(),
            ConfigKey::RecordingDirectory => path_to_string(&config.recording.directory),
            ConfigKey::RecordingInterval => config.recording.interval.to_string(),
            ConfigKey::RecordingFilePrefix => config.recording.file_prefix.clone(),
            ConfigKey::PilotName => config.pilot.name.clone(),
            ConfigKey::PilotGliderType => config.pilot.glider_type.clone(),
            ConfigKey::PilotGliderId => config.pilot.glider_id.clone(),
            ConfigKey::PilotCompetitionClass => {
                config.pilot.competition_class.clone().unwrap_or_default()
            }
            ConfigKey::LoggingFile => path_to_string(&config.logging.file),
        }
    }

    /// Set the value in a config file.
    ///
    /// Validates the value according to the key's specification before setting.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigKeyError> {
        let value = value.trim();
        self.validate(value)?;
        match self {
            ConfigKey::NetworkUdpPort => config.network.udp_port = self.parsed(value)?,
            ConfigKey::NetworkBufferSize => config.network.buffer_size = self.parsed(value)?,
            ConfigKey::NetworkConnectionTimeout => {
                config.network.connection_timeout = self.parsed(value)?
            }
            ConfigKey::RecordingDirectory => config.recording.directory = expand_tilde(value),
            ConfigKey::RecordingInterval => config.recording.interval = self.parsed(value)?,
            ConfigKey::RecordingFilePrefix => config.recording.file_prefix = value.to_string(),
            ConfigKey::PilotName => config.pilot.name = value.to_string(),
            ConfigKey::PilotGliderType => config.pilot.glider_type = value.to_string(),
            ConfigKey::PilotGliderId => config.pilot.glider_id = value.to_string(),
            ConfigKey::PilotCompetitionClass => {
                config.pilot.competition_class = (!value.is_empty()).then(|| value.to_string())
            }
            ConfigKey::LoggingFile => config.logging.file = expand_tilde(value),
        }
        Ok(())
    }

    /// Validate a value according to this key's specification.
    pub fn validate(&self, value: &str) -> Result<(), ConfigKeyError> {
        self.specification()
            .is_satisfied_by(value)
            .map_err(|reason| ConfigKeyError::ValidationFailed {
                key: self.name().to_string(),
                reason,
            })
    }

    fn parsed<T: FromStr>(&self, value: &str) -> Result<T, ConfigKeyError> {
        value
            .parse()
            .map_err(|_| ConfigKeyError::ValidationFailed {
                key: self.name().to_string(),
                reason: format!("cannot parse '{}'", value),
            })
    }

    /// Get the validation specification for this key.
    fn specification(&self) -> Box<dyn ValueSpecification> {
        match self {
            ConfigKey::NetworkUdpPort => Box::new(PortSpec),
            ConfigKey::NetworkBufferSize => Box::new(PositiveIntegerSpec),
            ConfigKey::NetworkConnectionTimeout => Box::new(PositiveSecondsSpec),
            ConfigKey::RecordingDirectory => Box::new(PathSpec),
            ConfigKey::RecordingInterval => Box::new(PositiveSecondsSpec),
            ConfigKey::RecordingFilePrefix => Box::new(FileNameSpec),
            ConfigKey::PilotName => Box::new(AnyStringSpec),
            ConfigKey::PilotGliderType => Box::new(AnyStringSpec),
            ConfigKey::PilotGliderId => Box::new(AnyStringSpec),
            ConfigKey::PilotCompetitionClass => Box::new(AnyStringSpec),
            ConfigKey::LoggingFile => Box::new(PathSpec),
        }
    }

    /// Get all supported configuration keys.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::NetworkUdpPort,
            ConfigKey::NetworkBufferSize,
            ConfigKey::NetworkConnectionTimeout,
            ConfigKey::RecordingDirectory,
            ConfigKey::RecordingInterval,
            ConfigKey::RecordingFilePrefix,
            ConfigKey::PilotName,
            ConfigKey::PilotGliderType,
            ConfigKey::PilotGliderId,
            ConfigKey::PilotCompetitionClass,
            ConfigKey::LoggingFile,
        ]
    }
}

// ============================================================================
// Value Specifications (Specification Pattern)
// ============================================================================

/// Trait for value validation specifications.
trait ValueSpecification {
    /// Returns Ok(()) if valid, Err(reason) if invalid.
    fn is_satisfied_by(&self, value: &str) -> Result<(), String>;
}

struct AnyStringSpec;

impl ValueSpecification for AnyStringSpec {
    fn is_satisfied_by(&self, _value: &str) -> Result<(), String> {
        Ok(())
    }
}

struct PortSpec;

impl ValueSpecification for PortSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        value
            .parse::<u16>()
            .map(|_| ())
            .map_err(|_| "must be a port number (0-65535)".to_string())
    }
}

/// Specification for integers greater than zero.
struct PositiveIntegerSpec;

impl ValueSpecification for PositiveIntegerSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        match value.parse::<u64>() {
            Ok(n) if n > 0 => Ok(()),
            _ => Err("must be a positive integer".to_string()),
        }
    }
}

/// Specification for a finite number of seconds greater than zero.
struct PositiveSecondsSpec;

impl ValueSpecification for PositiveSecondsSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        match value.parse::<f64>().ok().and_then(positive_duration) {
            Some(_) => Ok(()),
            None => Err("must be a positive number of seconds".to_string()),
        }
    }
}

/// Specification for path values (non-empty).
struct PathSpec;

impl ValueSpecification for PathSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        if value.trim().is_empty() {
            Err("must be a valid path".to_string())
        } else {
            Ok(())
        }
    }
}

/// Specification for a bare file name component.
struct FileNameSpec;

impl ValueSpecification for FileNameSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        if value.is_empty() || value.contains(&['/', '\\'][..]) {
            Err("must be a non-empty name without path separators".to_string())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_config_key_parsing() {
        assert_eq!(
            "recording.interval".parse::<ConfigKey>().unwrap(),
            ConfigKey::RecordingInterval
        );
        // Case insensitive
        assert_eq!(
            "PILOT.NAME".parse::<ConfigKey>().unwrap(),
            ConfigKey::PilotName
        );
        assert_eq!(
            "invalid.key".parse::<ConfigKey>(),
            Err(ConfigKeyError::UnknownKey("invalid.key".to_string()))
        );
    }

    #[test]
    fn test_all_keys_round_trip_names() {
        for key in ConfigKey::all() {
            assert_eq!(key.name().parse::<ConfigKey>().unwrap(), *key);
        }
    }

    #[test]
    fn test_key_name_parts() {
        assert_eq!(ConfigKey::NetworkUdpPort.section(), "network");
        assert_eq!(ConfigKey::NetworkUdpPort.key_name(), "udp_port");
        assert_eq!(ConfigKey::PilotCompetitionClass.section(), "pilot");
        assert_eq!(
            ConfigKey::PilotCompetitionClass.key_name(),
            "competition_class"
        );
    }

    #[test]
    fn test_get_value() {
        let config = ConfigFile::default();

        assert_eq!(ConfigKey::NetworkUdpPort.get(&config), "49002");
        assert_eq!(ConfigKey::RecordingInterval.get(&config), "1");
        assert_eq!(ConfigKey::PilotGliderType.get(&config), "Aerofly FS4");
        assert_eq!(ConfigKey::PilotCompetitionClass.get(&config), "");
    }

    #[test]
    fn test_set_value() {
        let mut config = ConfigFile::default();

        ConfigKey::NetworkUdpPort.set(&mut config, "49010").unwrap();
        assert_eq!(config.network.udp_port, 49010);

        ConfigKey::RecordingInterval.set(&mut config, "0.2").unwrap();
        assert_eq!(config.recording.interval, 0.2);

        ConfigKey::PilotCompetitionClass
            .set(&mut config, "Club")
            .unwrap();
        assert_eq!(config.pilot.competition_class.as_deref(), Some("Club"));

        ConfigKey::PilotCompetitionClass.set(&mut config, "").unwrap();
        assert!(config.pilot.competition_class.is_none());

        ConfigKey::RecordingDirectory
            .set(&mut config, "/tmp/igc")
            .unwrap();
        assert_eq!(config.recording.directory, PathBuf::from("/tmp/igc"));
    }

    #[test]
    fn test_set_invalid_value_fails() {
        let mut config = ConfigFile::default();

        assert!(ConfigKey::NetworkUdpPort.set(&mut config, "99999").is_err());
        assert!(ConfigKey::NetworkBufferSize.set(&mut config, "0").is_err());
        assert!(ConfigKey::RecordingInterval.set(&mut config, "-1").is_err());
        assert!(ConfigKey::RecordingInterval.set(&mut config, "inf").is_err());
        assert!(ConfigKey::RecordingInterval.set(&mut config, "1e300").is_err());
        assert!(ConfigKey::NetworkConnectionTimeout
            .set(&mut config, "1e20")
            .is_err());
        assert!(ConfigKey::RecordingFilePrefix
            .set(&mut config, "../up")
            .is_err());
        assert!(ConfigKey::LoggingFile.set(&mut config, " ").is_err());

        assert_eq!(config, ConfigFile::default());
    }
}
