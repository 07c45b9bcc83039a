//! High-level session facade.
//!
//! Encapsulates the wiring of listener, recorder and writer around one
//! shared event bus, following the Facade pattern.
//!
//! # Example
//!
//! ```ignore
//! use igcbridge::session::{Session, SessionConfig};
//!
//! let session = Session::new(SessionConfig::builder().udp_port(49002).build());
//! session.start().await?;
//!
//! let path = session.start_recording(None).await?;
//! // ... fly ...
//! let summary = session.stop_recording().await?;
//!
//! session.stop().await;
//! ```

mod config;
mod error;
mod facade;

pub use config::{SessionConfig, SessionConfigBuilder};
pub use error::SessionError;
pub use facade::{Session, SessionStatus, SettingsUpdate};
