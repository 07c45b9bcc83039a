//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (get, set, list, path, init)
//! - [`prompt`] - Line commands accepted while `run` is active
//! - [`run`] - Main command (listen and record)

pub mod config;
pub mod prompt;
pub mod run;
