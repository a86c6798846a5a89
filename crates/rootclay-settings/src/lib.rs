//! # RootClay Settings
//!
//! Loads connection and streaming settings from TOML or JSON and converts
//! them into the parameter types the controller consumes.

pub mod config;
pub mod error;

pub use config::{default_config_path, Config, ConnectionSettings, StreamingSettings};
pub use error::{Result, SettingsError};
