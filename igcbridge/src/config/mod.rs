//! User configuration stored in `~/.igcbridge/config.ini`.
//!
//! - [`ConfigFile`] - all settings, grouped per INI section
//! - [`ConfigKey`] - typed `section.key` access used by the CLI
//!
//! # Example
//!
//! ```
//! use igcbridge::config::{ConfigFile, ConfigKey};
//!
//! let mut config = ConfigFile::default();
//! ConfigKey::RecordingInterval.set(&mut config, "0.5").unwrap();
//!
//! let session_config = config.to_session_config();
//! assert_eq!(session_config.listener().port, 49002);
//! ```

mod defaults;
mod file;
mod keys;
mod parser;
mod settings;
mod writer;

pub use file::{config_directory, config_file_path, ConfigFileError};
pub use keys::{ConfigKey, ConfigKeyError};
pub use parser::positive_duration;
pub use settings::{ConfigFile, LoggingSettings, NetworkSettings, PilotSettings, RecordingSettings};

pub use defaults::{
    default_recording_directory, DEFAULT_CONNECTION_TIMEOUT_SECS, DEFAULT_GLIDER_ID,
    DEFAULT_GLIDER_TYPE, DEFAULT_LOG_FILE_NAME, DEFAULT_PILOT_NAME,
    DEFAULT_RECORDING_INTERVAL_SECS, DEFAULT_RECORDING_PREFIX, DEFAULT_UDP_BUFFER_SIZE,
    DEFAULT_UDP_PORT,
};
