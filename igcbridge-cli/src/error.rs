//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use igcbridge::config::ConfigFileError;
use igcbridge::session::SessionError;
use igcbridge::telemetry::TelemetryError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to build the async runtime
    Runtime(std::io::Error),
    /// Session failed to start or a recording command failed
    Session(SessionError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::Session(SessionError::Telemetry(TelemetryError::SocketBindError {
            port,
            ..
        })) = self
        {
            eprintln!();
            eprintln!("Common issues:");
            eprintln!("  1. Another program (or igcbridge instance) is using UDP port {}", port);
            eprintln!("  2. Choose another port: igcbridge run --port <port>");
            eprintln!("     and set the same port in the simulator's broadcast settings");
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::Session(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Runtime(e) => Some(e),
            CliError::Session(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<SessionError> for CliError {
    fn from(e: SessionError) -> Self {
        CliError::Session(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = CliError::Config("bad value".to_string());
        assert_eq!(err.to_string(), "Configuration error: bad value");

        let err = CliError::from(SessionError::NotRunning);
        assert_eq!(err.to_string(), "Session not running");
    }

    #[test]
    fn test_config_file_error_conversion() {
        let err = CliError::from(ConfigFileError::WriteError("disk full".to_string()));
        assert!(matches!(err, CliError::Config(ref msg) if msg.contains("disk full")));
    }
}
