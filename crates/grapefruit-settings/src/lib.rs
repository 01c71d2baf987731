//! Grapefruit Settings Crate
//!
//! Handles application configuration and its persistence.

pub mod config;
pub mod error;

pub use config::{
    Config, ConnectionSettings, FileSettings, LinkSettings, MotionSettings, StreamingSettings,
};
pub use error::{SettingsError, SettingsResult};
