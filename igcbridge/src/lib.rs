//! igcbridge - IGC flight logs from flight simulator telemetry
//!
//! This library listens for the XGPS/XATT UDP telemetry that simulators such
//! as Aerofly FS4 broadcast and records it as IGC flight logs accepted by
//! soaring scoring tools.
//!
//! # High-Level API
//!
//! For most use cases, the [`session`] module provides a simplified facade:
//!
//! ```ignore
//! use igcbridge::config::ConfigFile;
//! use igcbridge::session::Session;
//!
//! let config = ConfigFile::load()?;
//! let session = Session::new(config.to_session_config());
//!
//! session.start().await?;
//! let path = session.start_recording(None).await?;
//! ```
//!
//! # Components
//!
//! - [`telemetry`] - UDP listener and line parser
//! - [`events`] - publish/subscribe bus connecting the components
//! - [`recorder`] - rate limiting, queueing and the recording lifecycle
//! - [`igc`] - IGC record encoding and the file writer

pub mod config;
pub mod events;
pub mod igc;
pub mod logging;
pub mod recorder;
pub mod session;
pub mod telemetry;

/// Version of the igcbridge library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
